//! The record store seam. The service layer only ever talks to
//! `dyn RecordStore`; PostgreSQL and in-process implementations live beside it.

use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{
    CatalogService, Invoice, InvoiceFilter, Payment, PaymentFilter, PipelineHistoryEntry,
    PipelineState, SalesRep, ServiceLineItem,
};

/// A change to an invoice's line items or payments. It is written together
/// with the invoice row carrying the recomputed derived fields.
#[derive(Debug, Clone)]
pub enum InvoiceWrite {
    /// Only the invoice row changes (terms or derived fields).
    Invoice,
    InsertLineItem(ServiceLineItem),
    UpdateLineItem(ServiceLineItem),
    DeleteLineItem(Uuid),
    InsertPayment(Payment),
    UpdatePayment(Payment),
    DeletePayment(Uuid),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // Invoices
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError>;
    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError>;
    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError>;
    /// Applies `write` and stores `invoice` as one atomic unit.
    async fn commit_invoice_write(
        &self,
        invoice: &Invoice,
        write: &InvoiceWrite,
    ) -> Result<(), AppError>;
    /// Removes the invoice with its line items, pipeline state, history and
    /// followers. Returns false when nothing was deleted.
    async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError>;

    // Reference data
    async fn upsert_catalog_service(&self, service: &CatalogService) -> Result<(), AppError>;
    async fn get_catalog_service(&self, service_id: Uuid)
        -> Result<Option<CatalogService>, AppError>;
    async fn upsert_sales_rep(&self, rep: &SalesRep) -> Result<(), AppError>;
    async fn get_sales_rep(&self, user_id: Uuid) -> Result<Option<SalesRep>, AppError>;

    // Line items
    async fn list_line_items(&self, invoice_id: Uuid) -> Result<Vec<ServiceLineItem>, AppError>;

    // Payments
    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError>;
    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError>;

    // Pipeline
    async fn get_pipeline(&self, invoice_id: Uuid) -> Result<Option<PipelineState>, AppError>;
    async fn save_pipeline(&self, state: &PipelineState) -> Result<(), AppError>;
    /// Saves the state and appends its history entries as one atomic unit.
    async fn save_pipeline_transition(
        &self,
        state: &PipelineState,
        history: &[PipelineHistoryEntry],
    ) -> Result<(), AppError>;
    async fn append_history(&self, entry: &PipelineHistoryEntry) -> Result<(), AppError>;
    /// History for one invoice, newest first.
    async fn list_history(&self, invoice_id: Uuid)
        -> Result<Vec<PipelineHistoryEntry>, AppError>;
    /// Returns false when the user was already following.
    async fn add_follower(&self, invoice_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;
    async fn remove_follower(&self, invoice_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;
    async fn list_followers(&self, invoice_id: Uuid) -> Result<Vec<Uuid>, AppError>;
}
