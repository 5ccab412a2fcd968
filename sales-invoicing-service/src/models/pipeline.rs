//! Sales pipeline records: the per-invoice stage state, its append-only
//! history, and the stage vocabulary itself.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::engine::EngineError;

/// Pipeline stages in workflow order. The two payment stages are alternative
/// branches and share a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ContactCustomer,
    OrderPlaced,
    PaymentNotReceived,
    PaymentReceived,
    OrderPackaged,
    OrderShipped,
    OrderDelivered,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 7] = [
        PipelineStage::ContactCustomer,
        PipelineStage::OrderPlaced,
        PipelineStage::PaymentNotReceived,
        PipelineStage::PaymentReceived,
        PipelineStage::OrderPackaged,
        PipelineStage::OrderShipped,
        PipelineStage::OrderDelivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::ContactCustomer => "contact_customer",
            PipelineStage::OrderPlaced => "order_placed",
            PipelineStage::PaymentNotReceived => "payment_not_received",
            PipelineStage::PaymentReceived => "payment_received",
            PipelineStage::OrderPackaged => "order_packaged",
            PipelineStage::OrderShipped => "order_shipped",
            PipelineStage::OrderDelivered => "order_delivered",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineStage::ContactCustomer => "Contact customer",
            PipelineStage::OrderPlaced => "Order placed",
            PipelineStage::PaymentNotReceived => "Payment not received",
            PipelineStage::PaymentReceived => "Payment received",
            PipelineStage::OrderPackaged => "Order packaged",
            PipelineStage::OrderShipped => "Order shipped",
            PipelineStage::OrderDelivered => "Order delivered",
        }
    }

    /// Position in the workflow; both payment branches sit at rank 2.
    pub fn rank(&self) -> u8 {
        match self {
            PipelineStage::ContactCustomer => 0,
            PipelineStage::OrderPlaced => 1,
            PipelineStage::PaymentNotReceived | PipelineStage::PaymentReceived => 2,
            PipelineStage::OrderPackaged => 3,
            PipelineStage::OrderShipped => 4,
            PipelineStage::OrderDelivered => 5,
        }
    }

    /// Days after the order date at which the stage is expected.
    pub fn day_offset(&self) -> i64 {
        match self {
            PipelineStage::ContactCustomer | PipelineStage::OrderPlaced => 0,
            PipelineStage::PaymentNotReceived | PipelineStage::PaymentReceived => 1,
            PipelineStage::OrderPackaged => 2,
            PipelineStage::OrderShipped => 3,
            PipelineStage::OrderDelivered => 4,
        }
    }

    /// Whether reaching this stage requires the invoice to be paid in full.
    pub fn requires_payment(&self) -> bool {
        matches!(
            self,
            PipelineStage::PaymentReceived
                | PipelineStage::OrderPackaged
                | PipelineStage::OrderShipped
                | PipelineStage::OrderDelivered
        )
    }

    /// Stages a manual update may move to from `self`.
    pub fn allowed_moves(&self) -> &'static [PipelineStage] {
        use PipelineStage::*;
        match self {
            ContactCustomer => &[ContactCustomer, OrderPlaced],
            OrderPlaced => &[OrderPlaced, PaymentNotReceived, PaymentReceived],
            PaymentNotReceived => &[PaymentNotReceived, PaymentReceived],
            PaymentReceived => &[PaymentReceived, OrderPackaged],
            OrderPackaged => &[OrderPackaged, OrderShipped],
            OrderShipped => &[OrderShipped, OrderDelivered],
            OrderDelivered => &[OrderDelivered],
        }
    }

    /// Earlier stages on the fulfilled path (the unpaid branch is skipped
    /// unless it is the target itself).
    pub fn main_line_predecessors(&self) -> Vec<PipelineStage> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| *s != PipelineStage::PaymentNotReceived && s.rank() < self.rank())
            .collect()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| EngineError::UnknownStage(s.to_string()))
    }
}

impl TryFrom<String> for PipelineStage {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Per-invoice pipeline state. Stage timestamps are stamped the first time a
/// stage is reached and never cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PipelineState {
    pub invoice_id: Uuid,
    #[sqlx(try_from = "String")]
    pub current_stage: PipelineStage,
    pub start_date: Option<NaiveDate>,
    pub contacted_at: Option<DateTime<Utc>>,
    pub order_placed_at: Option<DateTime<Utc>>,
    pub payment_not_received_at: Option<DateTime<Utc>>,
    pub payment_received_at: Option<DateTime<Utc>>,
    pub order_packaged_at: Option<DateTime<Utc>>,
    pub order_shipped_at: Option<DateTime<Utc>>,
    pub order_delivered_at: Option<DateTime<Utc>>,
    pub payment_issue_notified_at: Option<DateTime<Utc>>,
    pub payment_issue_escalated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineState {
    /// Initial state for an invoice that has never been staged: the order is
    /// considered placed when the invoice was created.
    pub fn initial(invoice_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            invoice_id,
            current_stage: PipelineStage::OrderPlaced,
            start_date: Some(created_at.date_naive()),
            contacted_at: Some(created_at),
            order_placed_at: Some(created_at),
            payment_not_received_at: None,
            payment_received_at: None,
            order_packaged_at: None,
            order_shipped_at: None,
            order_delivered_at: None,
            payment_issue_notified_at: None,
            payment_issue_escalated_at: None,
            updated_at: created_at,
        }
    }

    pub fn reached_at(&self, stage: PipelineStage) -> Option<DateTime<Utc>> {
        match stage {
            PipelineStage::ContactCustomer => self.contacted_at,
            PipelineStage::OrderPlaced => self.order_placed_at,
            PipelineStage::PaymentNotReceived => self.payment_not_received_at,
            PipelineStage::PaymentReceived => self.payment_received_at,
            PipelineStage::OrderPackaged => self.order_packaged_at,
            PipelineStage::OrderShipped => self.order_shipped_at,
            PipelineStage::OrderDelivered => self.order_delivered_at,
        }
    }

    pub(crate) fn reached_at_mut(&mut self, stage: PipelineStage) -> &mut Option<DateTime<Utc>> {
        match stage {
            PipelineStage::ContactCustomer => &mut self.contacted_at,
            PipelineStage::OrderPlaced => &mut self.order_placed_at,
            PipelineStage::PaymentNotReceived => &mut self.payment_not_received_at,
            PipelineStage::PaymentReceived => &mut self.payment_received_at,
            PipelineStage::OrderPackaged => &mut self.order_packaged_at,
            PipelineStage::OrderShipped => &mut self.order_shipped_at,
            PipelineStage::OrderDelivered => &mut self.order_delivered_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineAction {
    StatusChange,
    Note,
    Email,
    Escalation,
}

impl PipelineAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineAction::StatusChange => "status_change",
            PipelineAction::Note => "note",
            PipelineAction::Email => "email",
            PipelineAction::Escalation => "escalation",
        }
    }
}

impl TryFrom<String> for PipelineAction {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "status_change" => Ok(PipelineAction::StatusChange),
            "note" => Ok(PipelineAction::Note),
            "email" => Ok(PipelineAction::Email),
            "escalation" => Ok(PipelineAction::Escalation),
            _ => Err(EngineError::UnknownAction(value)),
        }
    }
}

/// Append-only pipeline history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineHistoryEntry {
    pub history_id: Uuid,
    pub invoice_id: Uuid,
    pub stage: Option<PipelineStage>,
    pub action: PipelineAction,
    pub note: Option<String>,
    pub actor_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl PipelineHistoryEntry {
    pub fn new(
        invoice_id: Uuid,
        stage: Option<PipelineStage>,
        action: PipelineAction,
        note: impl Into<String>,
        actor_user_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            history_id: Uuid::new_v4(),
            invoice_id,
            stage,
            action,
            note: Some(note.into()),
            actor_user_id,
            created_at,
        }
    }
}
