use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{checked, EngineError};
use crate::models::InvoiceStatus;

/// Payments reconciled against an invoice total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentSummary {
    pub total_paid: Decimal,
    pub remaining_due: Decimal,
    pub overpaid_amount: Decimal,
    pub status: InvoiceStatus,
}

impl PaymentSummary {
    pub fn reconcile(
        final_total: Decimal,
        payments: impl IntoIterator<Item = Decimal>,
        due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, EngineError> {
        let total_paid = payments.into_iter().try_fold(Decimal::ZERO, |sum, amount| {
            checked(sum.checked_add(amount), "total_paid")
        })?;

        let status = if total_paid.is_zero() {
            match due_date {
                Some(due) if due < today => InvoiceStatus::PastDue,
                _ => InvoiceStatus::Pending,
            }
        } else if total_paid < final_total {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Paid
        };

        let balance = checked(final_total.checked_sub(total_paid), "remaining_due")?;
        Ok(Self {
            total_paid,
            remaining_due: balance.max(Decimal::ZERO),
            overpaid_amount: (-balance).max(Decimal::ZERO),
            status,
        })
    }

    /// Whether pipeline stages gated on payment may be reached. An invoice
    /// with nothing to pay counts as settled.
    pub fn is_settled(&self, final_total: Decimal) -> bool {
        final_total <= Decimal::ZERO || self.total_paid >= final_total
    }
}
