use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{round_money, ActorFields};
use crate::engine::TimelineEntry;
use crate::models::{InvoiceStatus, PipelineHistoryEntry, PipelineStage, PipelineState};
use crate::services::{PipelineDetail, PipelineListItem, StageCount};

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStageRequest {
    /// Parsed by the pipeline engine so unknown stages get a domain error.
    pub stage: String,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub actor: ActorFields,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddNoteRequest {
    pub stage: Option<String>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub actor: ActorFields,
}

#[derive(Debug, Deserialize)]
pub struct FollowRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PipelineDetailQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SweepRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub actor: ActorFields,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct PipelineStateResponse {
    #[serde(flatten)]
    pub pipeline: PipelineState,
    pub effective_stage: PipelineStage,
}

#[derive(Debug, Serialize)]
pub struct PipelineInvoiceSummary {
    pub invoice_id: Uuid,
    pub account_id: Uuid,
    pub sales_rep_id: Uuid,
    pub final_total: Decimal,
    pub remaining_due: Decimal,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
}

#[derive(Debug, Serialize)]
pub struct PipelineDetailResponse {
    pub invoice: PipelineInvoiceSummary,
    pub pipeline: PipelineState,
    pub effective_stage: PipelineStage,
    pub escalation_due: bool,
    pub suggested_timeline: Vec<TimelineEntry>,
    pub is_following: bool,
    pub history: Vec<PipelineHistoryEntry>,
}

impl From<PipelineDetail> for PipelineDetailResponse {
    fn from(detail: PipelineDetail) -> Self {
        let invoice = &detail.invoice.invoice;
        Self {
            invoice: PipelineInvoiceSummary {
                invoice_id: invoice.invoice_id,
                account_id: invoice.account_id,
                sales_rep_id: invoice.sales_rep_id,
                final_total: round_money(invoice.final_total),
                remaining_due: round_money(detail.invoice.payment_summary.remaining_due),
                due_date: invoice.due_date,
                status: invoice.status,
            },
            pipeline: detail.pipeline,
            effective_stage: detail.effective_stage,
            escalation_due: detail.escalation_due,
            suggested_timeline: detail.timeline,
            is_following: detail.is_following,
            history: detail.history,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PipelineListItemResponse {
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

impl From<PipelineListItem> for PipelineListItemResponse {
    fn from(item: PipelineListItem) -> Self {
        Self {
            invoice_id: item.invoice_id,
            account_id: item.account_id,
            sales_rep_id: item.sales_rep_id,
            current_stage: item.current_stage,
            effective_stage: item.effective_stage,
            updated_at: item.updated_at,
            final_total: round_money(item.final_total),
            due_date: item.due_date,
            status: item.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StageCountResponse {
    pub stage: PipelineStage,
    pub label: &'static str,
    pub invoice_count: usize,
    pub account_count: usize,
}

impl From<StageCount> for StageCountResponse {
    fn from(count: StageCount) -> Self {
        Self {
            stage: count.stage,
            label: count.stage.label(),
            invoice_count: count.invoice_count,
            account_count: count.account_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub escalated: Vec<Uuid>,
}
