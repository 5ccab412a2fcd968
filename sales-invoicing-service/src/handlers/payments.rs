//! Payment handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::invoices::InvoiceResponse;
use crate::dtos::payments::{
    CreatePaymentRequest, PaymentMutationResponse, PaymentResponse, UpdatePaymentRequest,
};
use crate::dtos::ActorFields;
use crate::models::PaymentFilter;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// GET /payments
pub async fn list_payments(
    State(state): State<AppState>,
    Query(filter): Query<PaymentFilter>,
) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let payments = state.service.list_payments(&filter).await?;
    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

/// POST /invoices/:invoice_id/payments
pub async fn log_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentMutationResponse>), AppError> {
    let actor = req.actor.actor()?;
    let (payment, view) = state
        .service
        .log_payment(invoice_id, req.to_input(), &actor)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PaymentMutationResponse {
            payment: payment.into(),
            invoice: view.into(),
        }),
    ))
}

/// PUT /payments/:payment_id
pub async fn update_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdatePaymentRequest>,
) -> Result<Json<PaymentMutationResponse>, AppError> {
    let actor = req.actor.actor()?;
    let (payment, view) = state
        .service
        .update_payment(payment_id, req.to_changes(), &actor)
        .await?;
    Ok(Json(PaymentMutationResponse {
        payment: payment.into(),
        invoice: view.into(),
    }))
}

/// DELETE /payments/:payment_id?actor_user_id=...
pub async fn delete_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Query(actor): Query<ActorFields>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let actor = actor.actor()?;
    let view = state.service.delete_payment(payment_id, &actor).await?;
    Ok(Json(view.into()))
}
