//! Reference data seeding: catalog services and sales reps are owned by other
//! parts of the sales system and pushed here.

use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::catalog::{UpsertCatalogServiceRequest, UpsertSalesRepRequest};
use crate::models::{CatalogService, SalesRep};
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// PUT /catalog/services/:service_id
pub async fn upsert_catalog_service(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpsertCatalogServiceRequest>,
) -> Result<Json<CatalogService>, AppError> {
    let service = state
        .service
        .upsert_catalog_service(CatalogService {
            service_id,
            service_name: req.service_name,
            price_per_unit: req.price_per_unit,
        })
        .await?;
    Ok(Json(service))
}

/// PUT /sales-reps/:user_id
pub async fn upsert_sales_rep(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpsertSalesRepRequest>,
) -> Result<Json<SalesRep>, AppError> {
    let rep = state
        .service
        .upsert_sales_rep(SalesRep {
            user_id,
            email: req.email,
            commission_rate: req.commission_rate,
            receives_commission: req.receives_commission,
        })
        .await?;
    Ok(Json(rep))
}
