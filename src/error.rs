use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use tracing::error;

use crate::{guest::GuestError, logo::LogoError, pricing::PricingOverflow, store::StoreError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(FailureResponse {
            success: false,
            message: self.message,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct FailureResponse {
    success: bool,
    message: String,
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(entity) => AppError::not_found(format!("{entity} not found")),
            err @ (StoreError::DuplicateInvoiceNumber { .. } | StoreError::DuplicateEmail(_)) => {
                AppError::conflict(err.to_string())
            }
            err => {
                error!(error = %err, "record store failure");
                AppError::internal(err)
            }
        }
    }
}

impl From<LogoError> for AppError {
    fn from(value: LogoError) -> Self {
        AppError::bad_request(value.to_string())
    }
}

impl From<PricingOverflow> for AppError {
    fn from(value: PricingOverflow) -> Self {
        AppError::bad_request(value.to_string())
    }
}

impl From<GuestError> for AppError {
    fn from(value: GuestError) -> Self {
        match value {
            GuestError::SessionExpired => AppError::unauthorized(),
            err => AppError::internal(err),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}
