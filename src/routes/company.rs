use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    auth::SessionContext,
    error::AppResult,
    state::AppState,
    views::{ActionResult, CompanyData},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoUploadRequest {
    pub image: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LogoDeleteRequest {
    pub url: String,
}

#[derive(Serialize)]
pub struct LogoResponse {
    pub url: String,
}

pub async fn get_company(
    State(state): State<AppState>,
    session: SessionContext,
) -> AppResult<Json<ActionResult<CompanyData>>> {
    let company = state.persistence.get_company(&session).await?;
    Ok(Json(ActionResult::ok(company)))
}

pub async fn save_company(
    State(state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<Value>,
) -> AppResult<Json<ActionResult<CompanyData>>> {
    let company = state.persistence.save_company(&session, payload).await?;
    Ok(Json(
        ActionResult::ok(company).with_message("Company profile saved"),
    ))
}

pub async fn upload_logo(
    State(state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<LogoUploadRequest>,
) -> AppResult<Json<ActionResult<LogoResponse>>> {
    let url = state
        .persistence
        .upload_logo(&session, &payload.image, payload.file_name.as_deref())
        .await?;
    Ok(Json(ActionResult::ok(LogoResponse { url })))
}

pub async fn delete_logo(
    State(state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<LogoDeleteRequest>,
) -> AppResult<Json<ActionResult<()>>> {
    state.persistence.delete_logo(&session, &payload.url).await?;
    Ok(Json(ActionResult::done("Logo deleted")))
}
