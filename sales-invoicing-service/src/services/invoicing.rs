//! Invoice orchestration: every mutation is applied to the invoice's loaded
//! records, evaluated, and only then persisted together with the recomputed
//! derived fields.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::engine::{
    Commission, EngineError, Fraction, InvoiceTotals, LineItemInput, PaymentFacts, PaymentSummary,
};
use crate::models::{
    Actor, CatalogService, Invoice, InvoiceFilter, InvoiceStatus, Payment, PaymentFilter,
    SalesRep, ServiceLineItem,
};
use crate::services::clock::Clock;
use crate::services::collaborators::{AuditEntry, AuditSink, Notification, Notifier};
use crate::services::metrics::{
    COLLABORATOR_FAILURES_TOTAL, INVOICE_STATUS_TRANSITIONS, PAYMENTS_LOGGED_TOTAL,
};
use crate::services::store::{InvoiceWrite, RecordStore};

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub account_id: Uuid,
    pub sales_rep_id: Uuid,
    pub tax_rate: Decimal,
    pub discount_percent: Decimal,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceChanges {
    pub tax_rate: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub service_id: Uuid,
    pub quantity: i64,
    pub discount_percent: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct LineItemChanges {
    pub quantity: Option<i64>,
    pub discount_percent: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub total_paid: Decimal,
    pub payment_method: String,
    pub last_four_payment_method: Option<String>,
    pub date_paid: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentChanges {
    pub total_paid: Option<Decimal>,
    pub payment_method: Option<String>,
    pub last_four_payment_method: Option<String>,
    pub date_paid: Option<DateTime<Utc>>,
}

/// An invoice together with everything derived from it.
#[derive(Debug, Clone)]
pub struct InvoiceView {
    pub invoice: Invoice,
    pub lines: Vec<ServiceLineItem>,
    pub totals: InvoiceTotals,
    pub payments: Vec<Payment>,
    pub payment_summary: PaymentSummary,
    pub commission: Commission,
}

/// The stored records an invoice's derived fields are computed from.
#[derive(Debug, Clone)]
struct InvoiceRecords {
    invoice: Invoice,
    lines: Vec<ServiceLineItem>,
    payments: Vec<Payment>,
}

impl InvoiceView {
    pub fn payment_facts(&self) -> PaymentFacts {
        PaymentFacts {
            settled: self.payment_summary.is_settled(self.totals.final_total),
            has_payments: !self.payments.is_empty(),
            latest_payment_at: self.payments.iter().map(|p| p.date_paid).max(),
        }
    }
}

#[derive(Clone)]
pub struct InvoicingService {
    pub(crate) store: Arc<dyn RecordStore>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    pub(crate) escalation_days: i64,
}

impl InvoicingService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        escalation_days: i64,
    ) -> Self {
        Self {
            store,
            audit,
            notifier,
            clock,
            escalation_days,
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) async fn load_invoice(&self, invoice_id: Uuid) -> Result<Invoice, AppError> {
        self.store
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id)))
    }

    pub(crate) async fn record_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(&entry).await {
            COLLABORATOR_FAILURES_TOTAL
                .with_label_values(&["audit"])
                .inc();
            warn!(
                error = %e,
                entity_type = %entry.entity_type,
                entity_id = %entry.entity_id,
                action = %entry.action,
                "Failed to record audit entry"
            );
        }
    }

    pub(crate) async fn send_notification(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            COLLABORATOR_FAILURES_TOTAL
                .with_label_values(&["notification"])
                .inc();
            warn!(
                error = %e,
                user_id = %notification.user_id,
                notif_type = %notification.notif_type,
                "Failed to send notification"
            );
        }
    }

    async fn load_records(&self, invoice_id: Uuid) -> Result<InvoiceRecords, AppError> {
        let invoice = self.load_invoice(invoice_id).await?;
        let lines = self.store.list_line_items(invoice_id).await?;
        let payments = self
            .store
            .list_payments(&PaymentFilter {
                invoice_id: Some(invoice_id),
                ..Default::default()
            })
            .await?;
        Ok(InvoiceRecords {
            invoice,
            lines,
            payments,
        })
    }

    /// Computes totals, payment status and commission for `records` and
    /// stamps the derived fields onto the invoice. Writes nothing.
    async fn evaluate(&self, records: InvoiceRecords) -> Result<InvoiceView, AppError> {
        let InvoiceRecords {
            mut invoice,
            mut lines,
            mut payments,
        } = records;
        lines.sort_by(|a, b| a.date_created.cmp(&b.date_created));
        payments.sort_by(|a, b| b.date_paid.cmp(&a.date_paid));

        let mut catalog: HashMap<Uuid, Option<CatalogService>> = HashMap::new();
        let mut inputs = Vec::with_capacity(lines.len());
        for line in &lines {
            if !catalog.contains_key(&line.service_id) {
                let service = self.store.get_catalog_service(line.service_id).await?;
                catalog.insert(line.service_id, service);
            }
            if matches!(catalog.get(&line.service_id), Some(None)) {
                debug!(
                    line_id = %line.invoice_service_id,
                    service_id = %line.service_id,
                    "Catalog service missing; line contributes nothing"
                );
                continue;
            }
            inputs.push(LineItemInput::new(
                line.price_per_unit,
                i64::from(line.quantity),
                line.discount_percent,
            )?);
        }

        let totals = InvoiceTotals::compute(
            &inputs,
            Fraction::new("discount_percent", invoice.discount_percent)?,
            Fraction::new("tax_rate", invoice.tax_rate)?,
        )?;

        let now = self.now();
        let payment_summary = PaymentSummary::reconcile(
            totals.final_total,
            payments.iter().map(|p| p.total_paid),
            invoice.due_date,
            now.date_naive(),
        )?;
        let commission = self
            .commission_for(invoice.sales_rep_id, totals.final_total)
            .await?;

        let changed = invoice.status != payment_summary.status
            || invoice.final_total != totals.final_total
            || invoice.commission_amount != commission.commission_amount;
        if changed {
            invoice.status = payment_summary.status;
            invoice.final_total = totals.final_total;
            invoice.commission_amount = commission.commission_amount;
            invoice.date_updated = now;
        }

        Ok(InvoiceView {
            invoice,
            lines,
            totals,
            payments,
            payment_summary,
            commission,
        })
    }

    /// Evaluates `records` and persists `write` together with the invoice
    /// row. Nothing is written when evaluation fails. Without a write the
    /// invoice row is stored only when its derived fields changed.
    async fn commit(
        &self,
        records: InvoiceRecords,
        write: Option<InvoiceWrite>,
    ) -> Result<InvoiceView, AppError> {
        let previous = records.invoice.clone();
        let view = self.evaluate(records).await?;

        match write {
            Some(write) => self.store.commit_invoice_write(&view.invoice, &write).await?,
            None if view.invoice != previous => {
                self.store
                    .commit_invoice_write(&view.invoice, &InvoiceWrite::Invoice)
                    .await?
            }
            None => {}
        }

        if previous.status != view.invoice.status {
            INVOICE_STATUS_TRANSITIONS
                .with_label_values(&[view.invoice.status.as_str()])
                .inc();
            info!(
                invoice_id = %view.invoice.invoice_id,
                from = %previous.status,
                to = %view.invoice.status,
                "Invoice status changed"
            );
        }
        Ok(view)
    }

    /// Rebuilds totals, payment status and commission from persisted state
    /// and writes the derived fields back when they changed.
    #[instrument(skip(self))]
    pub async fn recompute(&self, invoice_id: Uuid) -> Result<InvoiceView, AppError> {
        let records = self.load_records(invoice_id).await?;
        self.commit(records, None).await
    }

    async fn commission_for(
        &self,
        sales_rep_id: Uuid,
        final_total: Decimal,
    ) -> Result<Commission, AppError> {
        match self.store.get_sales_rep(sales_rep_id).await? {
            Some(rep) if rep.receives_commission => Ok(Commission::compute(
                final_total,
                Fraction::new("commission_rate", rep.commission_rate)?,
            )?),
            _ => Ok(Commission::default()),
        }
    }

    // -------------------------------------------------------------------------
    // Invoices
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn create_invoice(
        &self,
        input: NewInvoice,
        actor: &Actor,
    ) -> Result<InvoiceView, AppError> {
        let tax_rate = Fraction::new("tax_rate", input.tax_rate)?;
        let discount = Fraction::new("discount_percent", input.discount_percent)?;

        let now = self.now();
        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            account_id: input.account_id,
            sales_rep_id: input.sales_rep_id,
            tax_rate: tax_rate.value(),
            discount_percent: discount.value(),
            due_date: input.due_date,
            status: InvoiceStatus::Pending,
            final_total: Decimal::ZERO,
            commission_amount: Decimal::ZERO,
            date_created: now,
            date_updated: now,
        };
        let view = self
            .evaluate(InvoiceRecords {
                invoice,
                lines: Vec::new(),
                payments: Vec::new(),
            })
            .await?;
        self.store.insert_invoice(&view.invoice).await?;
        info!(invoice_id = %view.invoice.invoice_id, status = %view.invoice.status, "Invoice created");

        self.record_audit(
            AuditEntry::new("invoice", view.invoice.invoice_id, "create", actor)
                .after(&view.invoice)
                .for_invoice(view.invoice.invoice_id, view.invoice.account_id),
        )
        .await;
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        status: Option<InvoiceStatus>,
    ) -> Result<Vec<InvoiceView>, AppError> {
        let invoices = self.store.list_invoices(filter).await?;
        let mut views = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let view = self.recompute(invoice.invoice_id).await?;
            if status.is_none_or(|s| s == view.invoice.status) {
                views.push(view);
            }
        }
        Ok(views)
    }

    #[instrument(skip(self, changes, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        changes: InvoiceChanges,
        actor: &Actor,
    ) -> Result<InvoiceView, AppError> {
        let mut records = self.load_records(invoice_id).await?;
        let before = records.invoice.clone();

        let invoice = &mut records.invoice;
        if let Some(rate) = changes.tax_rate {
            invoice.tax_rate = Fraction::new("tax_rate", rate)?.value();
        }
        if let Some(discount) = changes.discount_percent {
            invoice.discount_percent = Fraction::new("discount_percent", discount)?.value();
        }
        if let Some(due_date) = changes.due_date {
            invoice.due_date = due_date;
        }
        invoice.date_updated = self.now();

        let view = self.commit(records, Some(InvoiceWrite::Invoice)).await?;
        self.record_audit(
            AuditEntry::new("invoice", invoice_id, "update", actor)
                .before(&before)
                .after(&view.invoice)
                .for_invoice(invoice_id, before.account_id),
        )
        .await;
        Ok(view)
    }

    #[instrument(skip(self, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid, actor: &Actor) -> Result<(), AppError> {
        let invoice = self.load_invoice(invoice_id).await?;
        let payments = self
            .store
            .list_payments(&PaymentFilter {
                invoice_id: Some(invoice_id),
                ..Default::default()
            })
            .await?;
        if !payments.is_empty() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice {} has {} payment(s); delete them first",
                invoice_id,
                payments.len()
            )));
        }

        self.store.delete_invoice(invoice_id).await?;
        info!(invoice_id = %invoice_id, "Invoice deleted");

        self.record_audit(
            AuditEntry::new("invoice", invoice_id, "delete", actor)
                .before(&invoice)
                .for_invoice(invoice_id, invoice.account_id),
        )
        .await;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Line items
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input, actor), fields(actor_user_id = %actor.user_id, service_id = %input.service_id))]
    pub async fn add_line_item(
        &self,
        invoice_id: Uuid,
        input: NewLineItem,
        actor: &Actor,
    ) -> Result<(ServiceLineItem, InvoiceView), AppError> {
        let mut records = self.load_records(invoice_id).await?;
        let service = self
            .store
            .get_catalog_service(input.service_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Service {} not found", input.service_id))
            })?;

        let line_input =
            LineItemInput::new(service.price_per_unit, input.quantity, input.discount_percent)?;
        let amounts = line_input.compute()?;

        let line = ServiceLineItem {
            invoice_service_id: Uuid::new_v4(),
            invoice_id,
            service_id: service.service_id,
            service_name: service.service_name,
            price_per_unit: line_input.price_per_unit,
            quantity: line_input.quantity.value(),
            discount_percent: line_input.discount.value(),
            total_price: amounts.total_price,
            date_created: self.now(),
        };
        records.lines.push(line.clone());

        let view = self
            .commit(records, Some(InvoiceWrite::InsertLineItem(line.clone())))
            .await?;
        self.record_audit(
            AuditEntry::new("invoice_service", line.invoice_service_id, "create", actor)
                .after(&line)
                .for_invoice(invoice_id, view.invoice.account_id),
        )
        .await;
        Ok((line, view))
    }

    fn line_position(records: &InvoiceRecords, line_id: Uuid) -> Result<usize, AppError> {
        records
            .lines
            .iter()
            .position(|line| line.invoice_service_id == line_id)
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "Line item {} not found on invoice {}",
                    line_id,
                    records.invoice.invoice_id
                ))
            })
    }

    #[instrument(skip(self, changes, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn update_line_item(
        &self,
        invoice_id: Uuid,
        line_id: Uuid,
        changes: LineItemChanges,
        actor: &Actor,
    ) -> Result<(ServiceLineItem, InvoiceView), AppError> {
        let mut records = self.load_records(invoice_id).await?;
        let index = Self::line_position(&records, line_id)?;
        let before = records.lines[index].clone();

        let line_input = LineItemInput::new(
            before.price_per_unit,
            changes.quantity.unwrap_or(i64::from(before.quantity)),
            changes.discount_percent.unwrap_or(before.discount_percent),
        )?;
        let line = ServiceLineItem {
            quantity: line_input.quantity.value(),
            discount_percent: line_input.discount.value(),
            total_price: line_input.compute()?.total_price,
            ..before.clone()
        };
        records.lines[index] = line.clone();

        let view = self
            .commit(records, Some(InvoiceWrite::UpdateLineItem(line.clone())))
            .await?;
        self.record_audit(
            AuditEntry::new("invoice_service", line_id, "update", actor)
                .before(&before)
                .after(&line)
                .for_invoice(invoice_id, view.invoice.account_id),
        )
        .await;
        Ok((line, view))
    }

    #[instrument(skip(self, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn delete_line_item(
        &self,
        invoice_id: Uuid,
        line_id: Uuid,
        actor: &Actor,
    ) -> Result<InvoiceView, AppError> {
        let mut records = self.load_records(invoice_id).await?;
        let index = Self::line_position(&records, line_id)?;
        let line = records.lines.remove(index);

        let view = self
            .commit(records, Some(InvoiceWrite::DeleteLineItem(line_id)))
            .await?;
        self.record_audit(
            AuditEntry::new("invoice_service", line_id, "delete", actor)
                .before(&line)
                .for_invoice(invoice_id, view.invoice.account_id),
        )
        .await;
        Ok(view)
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn log_payment(
        &self,
        invoice_id: Uuid,
        input: NewPayment,
        actor: &Actor,
    ) -> Result<(Payment, InvoiceView), AppError> {
        let mut records = self.load_records(invoice_id).await?;
        if input.total_paid <= Decimal::ZERO {
            return Err(EngineError::NonPositivePayment(input.total_paid).into());
        }

        let payment = Payment {
            payment_id: Uuid::new_v4(),
            invoice_id,
            account_id: records.invoice.account_id,
            sales_rep_id: records.invoice.sales_rep_id,
            total_paid: input.total_paid,
            payment_method: input.payment_method,
            last_four_payment_method: input.last_four_payment_method,
            date_paid: input.date_paid.unwrap_or_else(|| self.now()),
            logged_by: actor.user_id,
        };
        records.payments.push(payment.clone());

        let view = self
            .commit(records, Some(InvoiceWrite::InsertPayment(payment.clone())))
            .await?;
        PAYMENTS_LOGGED_TOTAL
            .with_label_values(&[payment.payment_method.as_str()])
            .inc();
        info!(payment_id = %payment.payment_id, invoice_id = %invoice_id, "Payment logged");

        self.record_audit(
            AuditEntry::new("payment", payment.payment_id, "create", actor)
                .after(&payment)
                .for_invoice(invoice_id, payment.account_id),
        )
        .await;
        Ok((payment, view))
    }

    /// Records for the invoice owning the payment, and the payment's position
    /// among them.
    async fn payment_records(&self, payment_id: Uuid) -> Result<(InvoiceRecords, usize), AppError> {
        let payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment {} not found", payment_id)))?;
        let records = self.load_records(payment.invoice_id).await?;
        let index = records
            .payments
            .iter()
            .position(|p| p.payment_id == payment_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment {} not found", payment_id)))?;
        Ok((records, index))
    }

    #[instrument(skip(self, changes, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn update_payment(
        &self,
        payment_id: Uuid,
        changes: PaymentChanges,
        actor: &Actor,
    ) -> Result<(Payment, InvoiceView), AppError> {
        let (mut records, index) = self.payment_records(payment_id).await?;
        let before = records.payments[index].clone();
        let mut payment = before.clone();

        if let Some(amount) = changes.total_paid {
            if amount <= Decimal::ZERO {
                return Err(EngineError::NonPositivePayment(amount).into());
            }
            payment.total_paid = amount;
        }
        if let Some(method) = changes.payment_method {
            payment.payment_method = method;
        }
        if changes.last_four_payment_method.is_some() {
            payment.last_four_payment_method = changes.last_four_payment_method;
        }
        if let Some(date_paid) = changes.date_paid {
            payment.date_paid = date_paid;
        }
        records.payments[index] = payment.clone();

        let view = self
            .commit(records, Some(InvoiceWrite::UpdatePayment(payment.clone())))
            .await?;
        self.record_audit(
            AuditEntry::new("payment", payment_id, "update", actor)
                .before(&before)
                .after(&payment)
                .for_invoice(payment.invoice_id, payment.account_id),
        )
        .await;
        Ok((payment, view))
    }

    #[instrument(skip(self, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn delete_payment(
        &self,
        payment_id: Uuid,
        actor: &Actor,
    ) -> Result<InvoiceView, AppError> {
        let (mut records, index) = self.payment_records(payment_id).await?;
        let payment = records.payments.remove(index);

        let view = self
            .commit(records, Some(InvoiceWrite::DeletePayment(payment_id)))
            .await?;
        self.record_audit(
            AuditEntry::new("payment", payment_id, "delete", actor)
                .before(&payment)
                .for_invoice(payment.invoice_id, payment.account_id),
        )
        .await;
        Ok(view)
    }

    pub async fn list_payments(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, AppError> {
        self.store.list_payments(filter).await
    }

    // -------------------------------------------------------------------------
    // Reference data
    // -------------------------------------------------------------------------

    #[instrument(skip(self, service), fields(service_id = %service.service_id))]
    pub async fn upsert_catalog_service(&self, service: CatalogService) -> Result<CatalogService, AppError> {
        if service.price_per_unit < Decimal::ZERO {
            return Err(EngineError::NegativePrice(service.price_per_unit).into());
        }
        self.store.upsert_catalog_service(&service).await?;
        Ok(service)
    }

    #[instrument(skip(self, rep), fields(user_id = %rep.user_id))]
    pub async fn upsert_sales_rep(&self, rep: SalesRep) -> Result<SalesRep, AppError> {
        Fraction::new("commission_rate", rep.commission_rate)?;
        self.store.upsert_sales_rep(&rep).await?;
        Ok(rep)
    }
}
