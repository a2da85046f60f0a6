use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::{
    auth::SessionContext,
    error::AppResult,
    state::AppState,
    views::{ActionResult, CustomerDetail},
};

pub async fn list_customers(
    State(state): State<AppState>,
    session: SessionContext,
) -> AppResult<Json<ActionResult<Value>>> {
    let customers = state.persistence.list_customers(&session).await?;
    Ok(Json(ActionResult::ok(customers)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    session: SessionContext,
    Path(customer_id): Path<String>,
) -> AppResult<Json<ActionResult<CustomerDetail>>> {
    let detail = state
        .persistence
        .get_customer_with_invoices(&session, &customer_id)
        .await?;
    Ok(Json(ActionResult::ok(detail)))
}
