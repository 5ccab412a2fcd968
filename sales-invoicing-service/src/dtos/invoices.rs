use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{nullable, round_money, ActorFields};
use crate::models::{InvoiceFilter, InvoiceStatus, ServiceLineItem};
use crate::services::{
    InvoiceChanges, InvoiceView, LineItemChanges, NewInvoice, NewLineItem,
};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub account_id: Uuid,
    pub sales_rep_id: Uuid,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_percent: Decimal,
    pub due_date: Option<NaiveDate>,
    #[serde(flatten)]
    #[validate(nested)]
    pub actor: ActorFields,
}

impl CreateInvoiceRequest {
    pub fn to_input(&self) -> NewInvoice {
        NewInvoice {
            account_id: self.account_id,
            sales_rep_id: self.sales_rep_id,
            tax_rate: self.tax_rate,
            discount_percent: self.discount_percent,
            due_date: self.due_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub tax_rate: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    /// `null` clears the due date; omitting it leaves the date unchanged.
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(flatten)]
    #[validate(nested)]
    pub actor: ActorFields,
}

impl UpdateInvoiceRequest {
    pub fn to_changes(&self) -> InvoiceChanges {
        InvoiceChanges {
            tax_rate: self.tax_rate,
            discount_percent: self.discount_percent,
            due_date: self.due_date,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub sales_rep_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
}

impl ListInvoicesQuery {
    pub fn filter(&self) -> InvoiceFilter {
        InvoiceFilter {
            sales_rep_id: self.sales_rep_id,
            account_id: self.account_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLineItemRequest {
    pub service_id: Uuid,
    pub quantity: i64,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(flatten)]
    #[validate(nested)]
    pub actor: ActorFields,
}

impl CreateLineItemRequest {
    pub fn to_input(&self) -> NewLineItem {
        NewLineItem {
            service_id: self.service_id,
            quantity: self.quantity,
            discount_percent: self.discount_percent,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLineItemRequest {
    pub quantity: Option<i64>,
    pub discount_percent: Option<Decimal>,
    #[serde(flatten)]
    #[validate(nested)]
    pub actor: ActorFields,
}

impl UpdateLineItemRequest {
    pub fn to_changes(&self) -> LineItemChanges {
        LineItemChanges {
            quantity: self.quantity,
            discount_percent: self.discount_percent,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct LineItemResponse {
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

impl From<ServiceLineItem> for LineItemResponse {
    fn from(line: ServiceLineItem) -> Self {
        Self {
            invoice_service_id: line.invoice_service_id,
            invoice_id: line.invoice_id,
            service_id: line.service_id,
            service_name: line.service_name,
            price_per_unit: round_money(line.price_per_unit),
            quantity: line.quantity,
            discount_percent: line.discount_percent,
            total_price: round_money(line.total_price),
            date_created: line.date_created,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    pub service_total: Decimal,
    pub service_discount_total: Decimal,
    pub subtotal_after_line_discounts: Decimal,
    pub invoice_discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub final_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PaymentSummaryResponse {
    pub total_paid: Decimal,
    pub remaining_due: Decimal,
    pub overpaid_amount: Decimal,
    pub status: InvoiceStatus,
}

#[derive(Debug, Serialize)]
pub struct CommissionResponse {
    pub commission_amount: Decimal,
    pub commission_percent_of_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub invoice_id: Uuid,
    pub account_id: Uuid,
    pub sales_rep_id: Uuid,
    pub tax_rate: Decimal,
    pub discount_percent: Decimal,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub final_total: Decimal,
    pub commission_amount: Decimal,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub services: Vec<LineItemResponse>,
    pub totals: TotalsResponse,
    pub payment_summary: PaymentSummaryResponse,
    pub commission: CommissionResponse,
}

impl From<InvoiceView> for InvoiceResponse {
    fn from(view: InvoiceView) -> Self {
        let InvoiceView {
            invoice,
            lines,
            totals,
            payment_summary,
            commission,
            ..
        } = view;

        Self {
            invoice_id: invoice.invoice_id,
            account_id: invoice.account_id,
            sales_rep_id: invoice.sales_rep_id,
            tax_rate: invoice.tax_rate,
            discount_percent: invoice.discount_percent,
            due_date: invoice.due_date,
            status: invoice.status,
            final_total: round_money(invoice.final_total),
            commission_amount: round_money(invoice.commission_amount),
            date_created: invoice.date_created,
            date_updated: invoice.date_updated,
            services: lines.into_iter().map(LineItemResponse::from).collect(),
            totals: TotalsResponse {
                service_total: round_money(totals.service_total),
                service_discount_total: round_money(totals.service_discount_total),
                subtotal_after_line_discounts: round_money(totals.subtotal_after_line_discounts),
                invoice_discount_amount: round_money(totals.invoice_discount_amount),
                taxable_amount: round_money(totals.taxable_amount),
                tax_amount: round_money(totals.tax_amount),
                final_total: round_money(totals.final_total),
            },
            payment_summary: PaymentSummaryResponse {
                total_paid: round_money(payment_summary.total_paid),
                remaining_due: round_money(payment_summary.remaining_due),
                overpaid_amount: round_money(payment_summary.overpaid_amount),
                status: payment_summary.status,
            },
            commission: CommissionResponse {
                commission_amount: round_money(commission.commission_amount),
                commission_percent_of_total: commission
                    .commission_percent_of_total
                    .round_dp(4),
            },
        }
    }
}

/// Returned by line item mutations: the line plus the recomputed invoice.
#[derive(Debug, Serialize)]
pub struct LineItemMutationResponse {
    pub service: LineItemResponse,
    pub invoice: InvoiceResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(body: serde_json::Value) -> UpdateInvoiceRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_due_date_null_clears_and_absent_keeps() {
        let actor = Uuid::new_v4();
        let cleared = update(json!({ "due_date": null, "actor_user_id": actor }));
        assert_eq!(cleared.to_changes().due_date, Some(None));

        let kept = update(json!({ "tax_rate": "0.1", "actor_user_id": actor }));
        assert_eq!(kept.to_changes().due_date, None);

        let set = update(json!({ "due_date": "2026-04-01", "actor_user_id": actor }));
        assert_eq!(
            set.to_changes().due_date,
            Some(NaiveDate::from_ymd_opt(2026, 4, 1))
        );
    }
}
