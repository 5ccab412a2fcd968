//! Invoice handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::invoices::{
    CreateInvoiceRequest, InvoiceResponse, ListInvoicesQuery, UpdateInvoiceRequest,
};
use crate::dtos::{ActorFields, MessageResponse};
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// POST /invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let actor = req.actor.actor()?;
    let view = state.service.create_invoice(req.to_input(), &actor).await?;
    Ok((StatusCode::CREATED, Json(view.into())))
}

/// GET /invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let views = state
        .service
        .list_invoices(&query.filter(), query.status)
        .await?;
    Ok(Json(views.into_iter().map(InvoiceResponse::from).collect()))
}

/// GET /invoices/:invoice_id
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let view = state.service.recompute(invoice_id).await?;
    Ok(Json(view.into()))
}

/// PUT /invoices/:invoice_id
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let actor = req.actor.actor()?;
    let view = state
        .service
        .update_invoice(invoice_id, req.to_changes(), &actor)
        .await?;
    Ok(Json(view.into()))
}

/// DELETE /invoices/:invoice_id?actor_user_id=...
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Query(actor): Query<ActorFields>,
) -> Result<Json<MessageResponse>, AppError> {
    let actor = actor.actor()?;
    state.service.delete_invoice(invoice_id, &actor).await?;
    Ok(Json(MessageResponse::new("invoice deleted")))
}
