use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    /// Copied from the owning invoice when the payment is logged.
    pub account_id: Uuid,
    pub sales_rep_id: Uuid,
    pub total_paid: Decimal,
    pub payment_method: String,
    pub last_four_payment_method: Option<String>,
    pub date_paid: DateTime<Utc>,
    pub logged_by: Uuid,
}

/// Payment listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub invoice_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub sales_rep_id: Option<Uuid>,
}
