use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A catalog service sold on an invoice. `service_name` and `price_per_unit`
/// are captured from the catalog when the line is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ServiceLineItem {
    pub invoice_service_id: Uuid,
    pub invoice_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub price_per_unit: Decimal,
    pub quantity: i32,
    pub discount_percent: Decimal,
    pub total_price: Decimal,
    pub date_created: DateTime<Utc>,
}
