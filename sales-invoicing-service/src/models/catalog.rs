//! Reference data owned by other parts of the sales system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CatalogService {
    pub service_id: Uuid,
    pub service_name: String,
    pub price_per_unit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SalesRep {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub commission_rate: Decimal,
    pub receives_commission: bool,
}
