use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{
        session::{clear_guest_cookies, guest_cookies},
        SessionContext,
    },
    error::AppResult,
    state::AppState,
    views::ActionResult,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestResponse {
    pub session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ActionResult<LoginResponse>>> {
    let user = state
        .persistence
        .authenticate(&payload.email, &payload.password)
        .await?;

    let access_token = state.jwt.generate_token(user.id, &user.email)?;
    info!(user_id = %user.id, "user logged in");

    Ok(Json(ActionResult::ok(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in_seconds(),
    })))
}

pub async fn guest(
    State(state): State<AppState>,
) -> AppResult<(HeaderMap, Json<ActionResult<GuestResponse>>)> {
    let session_id = state.persistence.start_guest_session().await;
    let mut headers = HeaderMap::new();
    for cookie in guest_cookies(&session_id, state.config.session_cookie_secure)? {
        headers.append(SET_COOKIE, cookie);
    }

    Ok((headers, Json(ActionResult::ok(GuestResponse { session_id }))))
}

/// Guests lose every stored key; access tokens are stateless so logging out
/// an account only clears any leftover guest cookies.
pub async fn logout(
    State(state): State<AppState>,
    session: Option<SessionContext>,
) -> AppResult<(HeaderMap, Json<ActionResult<()>>)> {
    if let Some(SessionContext::Guest(id)) = &session {
        state.persistence.end_guest_session(id).await;
    }

    let mut headers = HeaderMap::new();
    for cookie in clear_guest_cookies(state.config.session_cookie_secure)? {
        headers.append(SET_COOKIE, cookie);
    }
    Ok((headers, Json(ActionResult::done("Logged out"))))
}

pub async fn me(
    State(state): State<AppState>,
    session: SessionContext,
) -> AppResult<Json<ActionResult<MeResponse>>> {
    let response = match session {
        SessionContext::Authenticated(user_id) => {
            let user = state.persistence.account(user_id).await?;
            MeResponse {
                mode: "authenticated",
                user_id: Some(user.id),
                email: Some(user.email),
                session_id: None,
            }
        }
        SessionContext::Guest(session_id) => MeResponse {
            mode: "guest",
            user_id: None,
            email: None,
            session_id: Some(session_id),
        },
    };
    Ok(Json(ActionResult::ok(response)))
}
