//! Service line item handlers. Every mutation answers with the recomputed
//! invoice so clients never need to total lines themselves.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::invoices::{
    CreateLineItemRequest, InvoiceResponse, LineItemMutationResponse, UpdateLineItemRequest,
};
use crate::dtos::ActorFields;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// POST /invoices/:invoice_id/services
pub async fn add_line_item(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateLineItemRequest>,
) -> Result<(StatusCode, Json<LineItemMutationResponse>), AppError> {
    let actor = req.actor.actor()?;
    let (line, view) = state
        .service
        .add_line_item(invoice_id, req.to_input(), &actor)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(LineItemMutationResponse {
            service: line.into(),
            invoice: view.into(),
        }),
    ))
}

/// PUT /invoices/:invoice_id/services/:line_id
pub async fn update_line_item(
    State(state): State<AppState>,
    Path((invoice_id, line_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(req): ValidatedJson<UpdateLineItemRequest>,
) -> Result<Json<LineItemMutationResponse>, AppError> {
    let actor = req.actor.actor()?;
    let (line, view) = state
        .service
        .update_line_item(invoice_id, line_id, req.to_changes(), &actor)
        .await?;
    Ok(Json(LineItemMutationResponse {
        service: line.into(),
        invoice: view.into(),
    }))
}

/// DELETE /invoices/:invoice_id/services/:line_id?actor_user_id=...
pub async fn delete_line_item(
    State(state): State<AppState>,
    Path((invoice_id, line_id)): Path<(Uuid, Uuid)>,
    Query(actor): Query<ActorFields>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let actor = actor.actor()?;
    let view = state
        .service
        .delete_line_item(invoice_id, line_id, &actor)
        .await?;
    Ok(Json(view.into()))
}
