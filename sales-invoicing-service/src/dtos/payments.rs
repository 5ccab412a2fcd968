use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::invoices::InvoiceResponse;
use super::{round_money, ActorFields};
use crate::models::Payment;
use crate::services::{NewPayment, PaymentChanges};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub total_paid: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: String,
    #[validate(length(equal = 4))]
    pub last_four_payment_method: Option<String>,
    pub date_paid: Option<DateTime<Utc>>,
    #[serde(flatten)]
    #[validate(nested)]
    pub actor: ActorFields,
}

impl CreatePaymentRequest {
    pub fn to_input(&self) -> NewPayment {
        NewPayment {
            total_paid: self.total_paid,
            payment_method: self.payment_method.clone(),
            last_four_payment_method: self.last_four_payment_method.clone(),
            date_paid: self.date_paid,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePaymentRequest {
    pub total_paid: Option<Decimal>,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(equal = 4))]
    pub last_four_payment_method: Option<String>,
    pub date_paid: Option<DateTime<Utc>>,
    #[serde(flatten)]
    #[validate(nested)]
    pub actor: ActorFields,
}

impl UpdatePaymentRequest {
    pub fn to_changes(&self) -> PaymentChanges {
        PaymentChanges {
            total_paid: self.total_paid,
            payment_method: self.payment_method.clone(),
            last_four_payment_method: self.last_four_payment_method.clone(),
            date_paid: self.date_paid,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub account_id: Uuid,
    pub sales_rep_id: Uuid,
    pub total_paid: Decimal,
    pub payment_method: String,
    pub last_four_payment_method: Option<String>,
    pub date_paid: DateTime<Utc>,
    pub logged_by: Uuid,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.payment_id,
            invoice_id: payment.invoice_id,
            account_id: payment.account_id,
            sales_rep_id: payment.sales_rep_id,
            total_paid: round_money(payment.total_paid),
            payment_method: payment.payment_method,
            last_four_payment_method: payment.last_four_payment_method,
            date_paid: payment.date_paid,
            logged_by: payment.logged_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentMutationResponse {
    pub payment: PaymentResponse,
    pub invoice: InvoiceResponse,
}
