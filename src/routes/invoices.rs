use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    auth::SessionContext,
    error::{AppError, AppResult},
    persistence::ListOptions,
    state::AppState,
    views::{ActionResult, InvoiceData, InvoiceDetail, InvoiceStatus, InvoiceSummary},
};

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn list_invoices(
    State(state): State<AppState>,
    session: SessionContext,
    Query(options): Query<ListOptions>,
) -> AppResult<Json<ActionResult<Vec<InvoiceSummary>>>> {
    let invoices = state.persistence.list_invoices(&session, &options).await?;
    Ok(Json(ActionResult::ok(invoices)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    session: SessionContext,
    Path(invoice_id): Path<String>,
) -> AppResult<Json<ActionResult<InvoiceDetail>>> {
    let invoice = state.persistence.get_invoice(&session, &invoice_id).await?;
    Ok(Json(ActionResult::ok(invoice)))
}

pub async fn save_invoice(
    State(state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<InvoiceData>,
) -> AppResult<Json<ActionResult<InvoiceData>>> {
    let saved = state.persistence.save_invoice(&session, payload).await?;
    Ok(Json(
        ActionResult::ok(saved).with_message("Invoice saved successfully"),
    ))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    session: SessionContext,
    Path(invoice_id): Path<String>,
) -> AppResult<Json<ActionResult<()>>> {
    state
        .persistence
        .delete_invoice(&session, &invoice_id)
        .await?;
    Ok(Json(ActionResult::done("Invoice deleted successfully")))
}

pub async fn update_status(
    State(state): State<AppState>,
    session: SessionContext,
    Path(invoice_id): Path<String>,
    Json(payload): Json<StatusUpdate>,
) -> AppResult<Json<ActionResult<()>>> {
    let status: InvoiceStatus = payload
        .status
        .parse()
        .map_err(|_| AppError::bad_request("Invalid status"))?;
    state
        .persistence
        .update_invoice_status(&session, &invoice_id, status)
        .await?;
    Ok(Json(ActionResult::done(format!(
        "Invoice marked as {status}"
    ))))
}
