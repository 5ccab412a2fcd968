//! In-process record store, used when no `DATABASE_URL` is configured and by
//! the integration tests.

use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    CatalogService, Invoice, InvoiceFilter, Payment, PaymentFilter, PipelineHistoryEntry,
    PipelineState, SalesRep, ServiceLineItem,
};
use crate::services::store::{InvoiceWrite, RecordStore};

#[derive(Default)]
struct Tables {
    invoices: Vec<Invoice>,
    catalog: HashMap<Uuid, CatalogService>,
    sales_reps: HashMap<Uuid, SalesRep>,
    lines: Vec<ServiceLineItem>,
    payments: Vec<Payment>,
    pipelines: HashMap<Uuid, PipelineState>,
    history: Vec<PipelineHistoryEntry>,
    followers: Vec<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace<T>(rows: &mut [T], row: T, same: impl Fn(&T) -> bool) -> bool {
    match rows.iter_mut().find(|r| same(r)) {
        Some(existing) => {
            *existing = row;
            true
        }
        None => false,
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.invoices.iter().any(|i| i.invoice_id == invoice.invoice_id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice {} already exists",
                invoice.invoice_id
            )));
        }
        tables.invoices.push(invoice.clone());
        Ok(())
    }

    async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .iter()
            .find(|i| i.invoice_id == invoice_id)
            .cloned())
    }

    async fn list_invoices(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let tables = self.tables.read().await;
        let mut invoices: Vec<Invoice> = tables
            .invoices
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        Ok(invoices)
    }

    async fn commit_invoice_write(
        &self,
        invoice: &Invoice,
        write: &InvoiceWrite,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let id = invoice.invoice_id;
        if !tables.invoices.iter().any(|i| i.invoice_id == id) {
            return Err(AppError::NotFound(anyhow::anyhow!("Invoice {} not found", id)));
        }

        match write {
            InvoiceWrite::Invoice => {}
            InvoiceWrite::InsertLineItem(line) => tables.lines.push(line.clone()),
            InvoiceWrite::UpdateLineItem(line) => {
                let line_id = line.invoice_service_id;
                replace(&mut tables.lines, line.clone(), |l| l.invoice_service_id == line_id);
            }
            InvoiceWrite::DeleteLineItem(line_id) => {
                tables.lines.retain(|l| l.invoice_service_id != *line_id)
            }
            InvoiceWrite::InsertPayment(payment) => tables.payments.push(payment.clone()),
            InvoiceWrite::UpdatePayment(payment) => {
                let payment_id = payment.payment_id;
                replace(&mut tables.payments, payment.clone(), |p| p.payment_id == payment_id);
            }
            InvoiceWrite::DeletePayment(payment_id) => {
                tables.payments.retain(|p| p.payment_id != *payment_id)
            }
        }
        replace(&mut tables.invoices, invoice.clone(), |i| i.invoice_id == id);
        Ok(())
    }

    async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.payments.iter().any(|p| p.invoice_id == invoice_id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice still has payments"
            )));
        }
        let before = tables.invoices.len();
        tables.invoices.retain(|i| i.invoice_id != invoice_id);
        if tables.invoices.len() == before {
            return Ok(false);
        }
        tables.lines.retain(|l| l.invoice_id != invoice_id);
        tables.pipelines.remove(&invoice_id);
        tables.history.retain(|h| h.invoice_id != invoice_id);
        tables.followers.retain(|(invoice, _)| *invoice != invoice_id);
        Ok(true)
    }

    async fn upsert_catalog_service(&self, service: &CatalogService) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.catalog.insert(service.service_id, service.clone());
        Ok(())
    }

    async fn get_catalog_service(
        &self,
        service_id: Uuid,
    ) -> Result<Option<CatalogService>, AppError> {
        Ok(self.tables.read().await.catalog.get(&service_id).cloned())
    }

    async fn upsert_sales_rep(&self, rep: &SalesRep) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.sales_reps.insert(rep.user_id, rep.clone());
        Ok(())
    }

    async fn get_sales_rep(&self, user_id: Uuid) -> Result<Option<SalesRep>, AppError> {
        Ok(self.tables.read().await.sales_reps.get(&user_id).cloned())
    }

    async fn list_line_items(&self, invoice_id: Uuid) -> Result<Vec<ServiceLineItem>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .lines
            .iter()
            .filter(|l| l.invoice_id == invoice_id)
            .cloned()
            .collect())
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .find(|p| p.payment_id == payment_id)
            .cloned())
    }

    async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        let tables = self.tables.read().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .iter()
            .filter(|p| filter.invoice_id.is_none_or(|id| id == p.invoice_id))
            .filter(|p| filter.account_id.is_none_or(|id| id == p.account_id))
            .filter(|p| filter.sales_rep_id.is_none_or(|id| id == p.sales_rep_id))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.date_paid.cmp(&a.date_paid));
        Ok(payments)
    }

    async fn get_pipeline(&self, invoice_id: Uuid) -> Result<Option<PipelineState>, AppError> {
        Ok(self.tables.read().await.pipelines.get(&invoice_id).cloned())
    }

    async fn save_pipeline(&self, state: &PipelineState) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.pipelines.insert(state.invoice_id, state.clone());
        Ok(())
    }

    async fn save_pipeline_transition(
        &self,
        state: &PipelineState,
        history: &[PipelineHistoryEntry],
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.pipelines.insert(state.invoice_id, state.clone());
        tables.history.extend_from_slice(history);
        Ok(())
    }

    async fn append_history(&self, entry: &PipelineHistoryEntry) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.history.push(entry.clone());
        Ok(())
    }

    async fn list_history(
        &self,
        invoice_id: Uuid,
    ) -> Result<Vec<PipelineHistoryEntry>, AppError> {
        let tables = self.tables.read().await;
        let mut history: Vec<PipelineHistoryEntry> = tables
            .history
            .iter()
            .rev()
            .filter(|h| h.invoice_id == invoice_id)
            .cloned()
            .collect();
        // Stable: entries written in the same instant keep newest-first order.
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history)
    }

    async fn add_follower(&self, invoice_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.followers.contains(&(invoice_id, user_id)) {
            return Ok(false);
        }
        tables.followers.push((invoice_id, user_id));
        Ok(true)
    }

    async fn remove_follower(&self, invoice_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.followers.len();
        tables.followers.retain(|f| *f != (invoice_id, user_id));
        Ok(tables.followers.len() < before)
    }

    async fn list_followers(&self, invoice_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .followers
            .iter()
            .filter(|(invoice, _)| *invoice == invoice_id)
            .map(|(_, user)| *user)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn invoice() -> Invoice {
        let now = Utc::now();
        Invoice {
            invoice_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            sales_rep_id: Uuid::new_v4(),
            tax_rate: Decimal::ZERO,
            discount_percent: Decimal::ZERO,
            due_date: None,
            status: InvoiceStatus::Pending,
            final_total: Decimal::ZERO,
            commission_amount: Decimal::ZERO,
            date_created: now,
            date_updated: now,
        }
    }

    fn payment(invoice: &Invoice) -> Payment {
        Payment {
            payment_id: Uuid::new_v4(),
            invoice_id: invoice.invoice_id,
            account_id: invoice.account_id,
            sales_rep_id: invoice.sales_rep_id,
            total_paid: Decimal::ONE_HUNDRED,
            payment_method: "card".into(),
            last_four_payment_method: Some("4242".into()),
            date_paid: Utc::now(),
            logged_by: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_delete_invoice_with_payments_conflicts() {
        let store = MemoryStore::new();
        let invoice = invoice();
        store.insert_invoice(&invoice).await.unwrap();
        let payment = payment(&invoice);
        store
            .commit_invoice_write(&invoice, &InvoiceWrite::InsertPayment(payment.clone()))
            .await
            .unwrap();

        let err = store.delete_invoice(invoice.invoice_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        store
            .commit_invoice_write(&invoice, &InvoiceWrite::DeletePayment(payment.payment_id))
            .await
            .unwrap();
        assert!(store.delete_invoice(invoice.invoice_id).await.unwrap());
        assert!(store.get_invoice(invoice.invoice_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_stores_invoice_with_change() {
        let store = MemoryStore::new();
        let mut invoice = invoice();
        store.insert_invoice(&invoice).await.unwrap();

        invoice.status = InvoiceStatus::Paid;
        invoice.final_total = Decimal::ONE_HUNDRED;
        let payment = payment(&invoice);
        store
            .commit_invoice_write(&invoice, &InvoiceWrite::InsertPayment(payment.clone()))
            .await
            .unwrap();

        let stored = store.get_invoice(invoice.invoice_id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(store.get_payment(payment.payment_id).await.unwrap(), Some(payment));
    }

    #[tokio::test]
    async fn test_write_for_missing_invoice_changes_nothing() {
        let store = MemoryStore::new();
        let orphan = invoice();
        let payment = payment(&orphan);

        let err = store
            .commit_invoice_write(&orphan, &InvoiceWrite::InsertPayment(payment.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.get_payment(payment.payment_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payment_filters_use_owner_fields() {
        let store = MemoryStore::new();
        let first = invoice();
        let second = invoice();
        store.insert_invoice(&first).await.unwrap();
        store.insert_invoice(&second).await.unwrap();
        for invoice in [&first, &second] {
            store
                .commit_invoice_write(invoice, &InvoiceWrite::InsertPayment(payment(invoice)))
                .await
                .unwrap();
        }

        let filter = PaymentFilter {
            account_id: Some(first.account_id),
            ..Default::default()
        };
        let payments = store.list_payments(&filter).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].invoice_id, first.invoice_id);

        let filter = PaymentFilter {
            sales_rep_id: Some(second.sales_rep_id),
            ..Default::default()
        };
        let payments = store.list_payments(&filter).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].invoice_id, second.invoice_id);
    }

    #[tokio::test]
    async fn test_pipeline_transition_saves_state_and_history() {
        use crate::models::{PipelineAction, PipelineHistoryEntry, PipelineStage};

        let store = MemoryStore::new();
        let invoice_id = Uuid::new_v4();
        let now = Utc::now();
        let state = PipelineState::initial(invoice_id, now);
        let entries = vec![
            PipelineHistoryEntry::new(
                invoice_id,
                Some(PipelineStage::OrderPlaced),
                PipelineAction::StatusChange,
                "Order placed",
                None,
                now,
            ),
            PipelineHistoryEntry::new(
                invoice_id,
                Some(PipelineStage::OrderPlaced),
                PipelineAction::Email,
                "Email sent",
                None,
                now,
            ),
        ];

        store.save_pipeline_transition(&state, &entries).await.unwrap();

        assert_eq!(store.get_pipeline(invoice_id).await.unwrap(), Some(state));
        assert_eq!(store.list_history(invoice_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_follow_is_idempotent() {
        let store = MemoryStore::new();
        let invoice_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        assert!(store.add_follower(invoice_id, user_id).await.unwrap());
        assert!(!store.add_follower(invoice_id, user_id).await.unwrap());
        assert_eq!(store.list_followers(invoice_id).await.unwrap(), vec![user_id]);
        assert!(store.remove_follower(invoice_id, user_id).await.unwrap());
        assert!(store.list_followers(invoice_id).await.unwrap().is_empty());
    }
}
