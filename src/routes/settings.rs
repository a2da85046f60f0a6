use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{auth::SessionContext, error::AppResult, state::AppState, views::ActionResult};

#[derive(Deserialize)]
pub struct EmailUpdate {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdate {
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

pub async fn update_email(
    State(state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<EmailUpdate>,
) -> AppResult<Json<ActionResult<()>>> {
    state
        .persistence
        .update_email(&session, &payload.email)
        .await?;
    Ok(Json(ActionResult::done("Email updated successfully")))
}

pub async fn update_password(
    State(state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<PasswordUpdate>,
) -> AppResult<Json<ActionResult<()>>> {
    state
        .persistence
        .update_password(&session, &payload.new_password, &payload.confirm_password)
        .await?;
    Ok(Json(ActionResult::done("Password updated successfully")))
}
