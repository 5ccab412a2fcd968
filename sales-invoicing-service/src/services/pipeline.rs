//! Pipeline operations on top of the invoice view: stage updates, notes,
//! followers, dashboards and the payment-issue escalation sweep.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::engine::pipeline::{
    apply_transition, effective_stage, escalation_due, suggested_timeline,
};
use crate::engine::{EngineError, TimelineEntry};
use crate::models::{
    Actor, Invoice, InvoiceFilter, InvoiceStatus, PipelineAction, PipelineHistoryEntry,
    PipelineStage, PipelineState,
};
use crate::services::collaborators::{AuditEntry, Notification};
use crate::services::invoicing::{InvoiceView, InvoicingService};
use crate::services::metrics::{PIPELINE_ESCALATIONS_TOTAL, PIPELINE_TRANSITIONS_TOTAL};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineFilter {
    pub stage: Option<PipelineStage>,
    pub sales_rep_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
}

impl PipelineFilter {
    fn invoices(&self) -> InvoiceFilter {
        InvoiceFilter {
            sales_rep_id: self.sales_rep_id,
            account_id: self.account_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineDetail {
    pub invoice: InvoiceView,
    pub pipeline: PipelineState,
    pub effective_stage: PipelineStage,
    pub escalation_due: bool,
    pub timeline: Vec<TimelineEntry>,
    pub is_following: bool,
    pub history: Vec<PipelineHistoryEntry>,
}

#[derive(Debug, Clone)]
pub struct PipelineListItem {
    pub invoice_id: Uuid,
    pub account_id: Uuid,
    pub sales_rep_id: Uuid,
    pub current_stage: PipelineStage,
    pub effective_stage: PipelineStage,
    pub updated_at: DateTime<Utc>,
    pub final_total: Decimal,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCount {
    pub stage: PipelineStage,
    pub invoice_count: usize,
    pub account_count: usize,
}

fn pipeline_link(invoice_id: Uuid) -> String {
    format!("/pipelines/invoice/{}", invoice_id)
}

impl InvoicingService {
    async fn stored_or_initial_pipeline(
        &self,
        invoice: &Invoice,
    ) -> Result<(PipelineState, bool), AppError> {
        Ok(match self.store.get_pipeline(invoice.invoice_id).await? {
            Some(state) => (state, true),
            None => (
                PipelineState::initial(invoice.invoice_id, invoice.date_created),
                false,
            ),
        })
    }

    /// Pipeline state for the invoice, created and persisted on first access.
    async fn ensure_pipeline(&self, invoice: &Invoice) -> Result<PipelineState, AppError> {
        let (state, stored) = self.stored_or_initial_pipeline(invoice).await?;
        if !stored {
            self.store.save_pipeline(&state).await?;
            info!(invoice_id = %invoice.invoice_id, "Pipeline created");
        }
        Ok(state)
    }

    fn history_entry(
        &self,
        invoice_id: Uuid,
        stage: Option<PipelineStage>,
        action: PipelineAction,
        note: impl Into<String>,
        actor_user_id: Option<Uuid>,
    ) -> PipelineHistoryEntry {
        PipelineHistoryEntry::new(invoice_id, stage, action, note, actor_user_id, self.now())
    }

    #[instrument(skip(self))]
    pub async fn pipeline_detail(
        &self,
        invoice_id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<PipelineDetail, AppError> {
        let view = self.recompute(invoice_id).await?;
        let pipeline = self.ensure_pipeline(&view.invoice).await?;
        let effective = effective_stage(pipeline.current_stage, &view.payment_facts());

        let is_following = match viewer {
            Some(user_id) => self
                .store
                .list_followers(invoice_id)
                .await?
                .contains(&user_id),
            None => false,
        };
        let history = self.store.list_history(invoice_id).await?;

        Ok(PipelineDetail {
            escalation_due: escalation_due(&pipeline, effective, self.now(), self.escalation_days),
            timeline: suggested_timeline(&pipeline),
            effective_stage: effective,
            invoice: view,
            pipeline,
            is_following,
            history,
        })
    }

    /// Manual stage update. Validation happens before anything is written.
    #[instrument(skip(self, note, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn update_pipeline_status(
        &self,
        invoice_id: Uuid,
        stage: &str,
        note: Option<String>,
        actor: &Actor,
    ) -> Result<(PipelineState, PipelineStage), AppError> {
        let target: PipelineStage = stage.parse()?;
        let view = self.recompute(invoice_id).await?;
        let invoice = &view.invoice;
        let facts = view.payment_facts();

        let (mut state, _) = self.stored_or_initial_pipeline(invoice).await?;
        let before = state.clone();
        let now = self.now();
        apply_transition(&mut state, target, &facts, now)?;

        let actor_id = Some(actor.user_id);
        let note = note
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| target.label().to_string());
        let email_note = format!("Email sent to contact: {} update.", target.label());
        let issue_note =
            "Payment issue email sent to contact. Please contact support to continue order.";
        let payment_issue = target == PipelineStage::PaymentNotReceived;

        let mut entries = vec![
            self.history_entry(invoice_id, Some(target), PipelineAction::StatusChange, note, actor_id),
            self.history_entry(
                invoice_id,
                Some(target),
                PipelineAction::Email,
                email_note.clone(),
                actor_id,
            ),
        ];
        if payment_issue {
            entries.push(self.history_entry(
                invoice_id,
                Some(target),
                PipelineAction::Email,
                issue_note,
                actor_id,
            ));
        }
        self.store.save_pipeline_transition(&state, &entries).await?;

        PIPELINE_TRANSITIONS_TOTAL
            .with_label_values(&[target.as_str()])
            .inc();
        info!(
            invoice_id = %invoice_id,
            from = %before.current_stage,
            to = %target,
            "Pipeline stage updated"
        );

        self.record_audit(
            AuditEntry::new("invoice_pipeline_email", invoice_id, "email", actor)
                .after(serde_json::json!({ "stage": target, "note": email_note }))
                .for_invoice(invoice_id, invoice.account_id),
        )
        .await;

        if payment_issue {
            self.record_audit(
                AuditEntry::new("invoice_pipeline_email", invoice_id, "payment_issue", actor)
                    .after(serde_json::json!({ "stage": target, "note": issue_note }))
                    .for_invoice(invoice_id, invoice.account_id),
            )
            .await;
            self.send_notification(Notification {
                user_id: invoice.sales_rep_id,
                notif_type: "pipeline_payment_issue".to_string(),
                title: "Payment issue email sent".to_string(),
                message: format!(
                    "Invoice #{} • Payment issue email sent to contact.",
                    invoice_id
                ),
                link: pipeline_link(invoice_id),
                account_id: invoice.account_id,
                invoice_id,
            })
            .await;
        }

        self.notify_followers(invoice, target, actor.user_id, payment_issue)
            .await?;

        self.send_notification(Notification {
            user_id: invoice.sales_rep_id,
            notif_type: "pipeline_email".to_string(),
            title: "Pipeline update email sent".to_string(),
            message: format!(
                "Invoice #{} • {} update sent to contact.",
                invoice_id,
                target.label()
            ),
            link: pipeline_link(invoice_id),
            account_id: invoice.account_id,
            invoice_id,
        })
        .await;

        self.record_audit(
            AuditEntry::new("invoice_pipeline", invoice_id, "update_status", actor)
                .before(&before)
                .after(&state)
                .for_invoice(invoice_id, invoice.account_id),
        )
        .await;

        let effective = effective_stage(state.current_stage, &facts);
        Ok((state, effective))
    }

    async fn notify_followers(
        &self,
        invoice: &Invoice,
        stage: PipelineStage,
        actor_user_id: Uuid,
        action_required: bool,
    ) -> Result<(), AppError> {
        let followers = self.store.list_followers(invoice.invoice_id).await?;
        let mut message = format!("Invoice #{} • {}", invoice.invoice_id, stage.label());
        if action_required {
            message.push_str(" • Action required");
        }

        for user_id in followers.into_iter().filter(|id| *id != actor_user_id) {
            self.send_notification(Notification {
                user_id,
                notif_type: "pipeline_update".to_string(),
                title: format!("Pipeline update: {}", stage.label()),
                message: message.clone(),
                link: pipeline_link(invoice.invoice_id),
                account_id: invoice.account_id,
                invoice_id: invoice.invoice_id,
            })
            .await;
        }
        Ok(())
    }

    #[instrument(skip(self, note, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn add_pipeline_note(
        &self,
        invoice_id: Uuid,
        stage: Option<&str>,
        note: Option<String>,
        actor: &Actor,
    ) -> Result<PipelineHistoryEntry, AppError> {
        let note = note
            .filter(|n| !n.trim().is_empty())
            .ok_or(EngineError::MissingNote)?;
        let stage = stage.map(str::parse::<PipelineStage>).transpose()?;
        let invoice = self.load_invoice(invoice_id).await?;
        let (state, stored) = self.stored_or_initial_pipeline(&invoice).await?;

        let entry = self.history_entry(
            invoice_id,
            stage,
            PipelineAction::Note,
            note.clone(),
            Some(actor.user_id),
        );
        if stored {
            self.store.append_history(&entry).await?;
        } else {
            self.store
                .save_pipeline_transition(&state, std::slice::from_ref(&entry))
                .await?;
        }

        self.record_audit(
            AuditEntry::new("invoice_pipeline", invoice_id, "note", actor)
                .after(serde_json::json!({ "stage": stage, "note": note }))
                .for_invoice(invoice_id, invoice.account_id),
        )
        .await;
        Ok(entry)
    }

    /// Returns false when the user already followed the pipeline.
    #[instrument(skip(self))]
    pub async fn follow_pipeline(&self, invoice_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        self.load_invoice(invoice_id).await?;
        self.store.add_follower(invoice_id, user_id).await
    }

    #[instrument(skip(self))]
    pub async fn unfollow_pipeline(
        &self,
        invoice_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        self.load_invoice(invoice_id).await?;
        self.store.remove_follower(invoice_id, user_id).await
    }

    /// Invoices with explicit and effective stage, newest first. Invoices
    /// never staged are reported with their initial state without persisting it.
    #[instrument(skip(self))]
    pub async fn pipeline_list(
        &self,
        filter: &PipelineFilter,
    ) -> Result<Vec<PipelineListItem>, AppError> {
        let invoices = self.store.list_invoices(&filter.invoices()).await?;
        let mut items = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            let view = self.recompute(invoice.invoice_id).await?;
            let (state, _) = self.stored_or_initial_pipeline(&view.invoice).await?;
            let effective = effective_stage(state.current_stage, &view.payment_facts());
            if filter.stage.is_some_and(|stage| stage != effective) {
                continue;
            }
            items.push(PipelineListItem {
                invoice_id: view.invoice.invoice_id,
                account_id: view.invoice.account_id,
                sales_rep_id: view.invoice.sales_rep_id,
                current_stage: state.current_stage,
                effective_stage: effective,
                updated_at: state.updated_at,
                final_total: view.invoice.final_total,
                due_date: view.invoice.due_date,
                status: view.invoice.status,
            });
        }
        Ok(items)
    }

    /// Invoice and distinct account counts per effective stage, in workflow
    /// order. Stages with no invoices are omitted.
    #[instrument(skip(self))]
    pub async fn pipeline_summary(
        &self,
        filter: &PipelineFilter,
    ) -> Result<Vec<StageCount>, AppError> {
        let unfiltered = PipelineFilter {
            stage: None,
            ..filter.clone()
        };
        let mut by_stage: BTreeMap<PipelineStage, (usize, HashSet<Uuid>)> = BTreeMap::new();
        for item in self.pipeline_list(&unfiltered).await? {
            let entry = by_stage.entry(item.effective_stage).or_default();
            entry.0 += 1;
            entry.1.insert(item.account_id);
        }

        Ok(by_stage
            .into_iter()
            .filter(|(stage, _)| filter.stage.is_none_or(|s| s == *stage))
            .map(|(stage, (invoice_count, accounts))| StageCount {
                stage,
                invoice_count,
                account_count: accounts.len(),
            })
            .collect())
    }

    /// Flags unpaid orders held past the escalation window. Each invoice is
    /// escalated at most once; the flag is not cleared automatically.
    #[instrument(skip(self, actor), fields(actor_user_id = %actor.user_id))]
    pub async fn sweep_escalations(&self, actor: &Actor) -> Result<Vec<Uuid>, AppError> {
        let now = self.now();
        let mut escalated = Vec::new();

        for invoice in self.store.list_invoices(&InvoiceFilter::default()).await? {
            let view = self.recompute(invoice.invoice_id).await?;
            let (mut state, _) = self.stored_or_initial_pipeline(&view.invoice).await?;
            let effective = effective_stage(state.current_stage, &view.payment_facts());

            if state.payment_issue_escalated_at.is_some()
                || !escalation_due(&state, effective, now, self.escalation_days)
            {
                continue;
            }

            state.payment_issue_escalated_at = Some(now);
            state.updated_at = now;
            let note = format!(
                "Payment not received {} days after the order was placed.",
                self.escalation_days
            );
            let entry = self.history_entry(
                invoice.invoice_id,
                Some(effective),
                PipelineAction::Escalation,
                note.clone(),
                Some(actor.user_id),
            );
            self.store
                .save_pipeline_transition(&state, std::slice::from_ref(&entry))
                .await?;

            PIPELINE_ESCALATIONS_TOTAL
                .with_label_values(&["sweep"])
                .inc();
            info!(invoice_id = %invoice.invoice_id, "Payment issue escalated");

            self.send_notification(Notification {
                user_id: view.invoice.sales_rep_id,
                notif_type: "pipeline_escalation".to_string(),
                title: "Payment issue escalated".to_string(),
                message: format!("Invoice #{} • {}", invoice.invoice_id, note),
                link: pipeline_link(invoice.invoice_id),
                account_id: view.invoice.account_id,
                invoice_id: invoice.invoice_id,
            })
            .await;

            self.record_audit(
                AuditEntry::new("invoice_pipeline", invoice.invoice_id, "escalation", actor)
                    .after(&state)
                    .for_invoice(invoice.invoice_id, view.invoice.account_id),
            )
            .await;

            escalated.push(invoice.invoice_id);
        }

        Ok(escalated)
    }
}
