//! Invoice record and its derived lifecycle status.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::engine::EngineError;

/// Lifecycle status, always derived from payments and the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
    #[serde(rename = "Past Due")]
    PastDue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Partial => "Partial",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::PastDue => "Past Due",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for InvoiceStatus {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Pending" => Ok(InvoiceStatus::Pending),
            "Partial" => Ok(InvoiceStatus::Partial),
            "Paid" => Ok(InvoiceStatus::Paid),
            "Past Due" => Ok(InvoiceStatus::PastDue),
            _ => Err(EngineError::UnknownStatus(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub account_id: Uuid,
    pub sales_rep_id: Uuid,
    pub tax_rate: Decimal,
    pub discount_percent: Decimal,
    pub due_date: Option<NaiveDate>,
    #[sqlx(try_from = "String")]
    pub status: InvoiceStatus,
    pub final_total: Decimal,
    pub commission_amount: Decimal,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Filters for invoice listings. `None` matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub sales_rep_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.sales_rep_id.is_none_or(|id| id == invoice.sales_rep_id)
            && self.account_id.is_none_or(|id| id == invoice.account_id)
    }
}
