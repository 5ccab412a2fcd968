//! Pipeline stage derivation: effective stage, manual transitions, the
//! suggested timeline and the escalation rule.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::EngineError;
use crate::models::{PipelineStage, PipelineState};

/// What the payments on an invoice say, as far as the pipeline cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaymentFacts {
    pub settled: bool,
    pub has_payments: bool,
    pub latest_payment_at: Option<DateTime<Utc>>,
}

/// The stage to display: the explicit stage corrected by payment facts.
///
/// A settled invoice never shows an unpaid stage, and an unsettled one never
/// shows a paid stage. Once any payment exists the result is past
/// `order_placed`.
pub fn effective_stage(explicit: PipelineStage, facts: &PaymentFacts) -> PipelineStage {
    if facts.settled {
        if explicit.rank() <= PipelineStage::PaymentReceived.rank() {
            PipelineStage::PaymentReceived
        } else {
            explicit
        }
    } else if facts.has_payments || explicit.rank() > PipelineStage::OrderPlaced.rank() {
        PipelineStage::PaymentNotReceived
    } else {
        explicit
    }
}

pub fn check_transition(
    current: PipelineStage,
    target: PipelineStage,
    facts: &PaymentFacts,
) -> Result<(), EngineError> {
    if target.requires_payment() && !facts.settled {
        return Err(EngineError::NotPaidInFull(target));
    }
    if !current.allowed_moves().contains(&target) {
        return Err(EngineError::InvalidTransition {
            from: current,
            to: target,
        });
    }
    Ok(())
}

/// Moves the explicit stage to `target`, stamping first-reach timestamps.
pub fn apply_transition(
    state: &mut PipelineState,
    target: PipelineStage,
    facts: &PaymentFacts,
    now: DateTime<Utc>,
) -> Result<(), EngineError> {
    check_transition(state.current_stage, target, facts)?;

    if target.requires_payment() && state.payment_received_at.is_none() {
        state.payment_received_at = facts.latest_payment_at;
    }

    state.current_stage = target;
    state.reached_at_mut(target).get_or_insert(now);
    for prior in target.main_line_predecessors() {
        state.reached_at_mut(prior).get_or_insert(now);
    }

    if target == PipelineStage::PaymentNotReceived {
        state.payment_issue_notified_at.get_or_insert(now);
    }
    state.updated_at = now;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub stage: PipelineStage,
    pub label: &'static str,
    pub suggested_date: Option<NaiveDate>,
    pub reached_at: Option<DateTime<Utc>>,
}

/// Suggested dates are the order date plus each stage's day offset. Once
/// payment is in, fulfilment stages are re-anchored on the payment date.
pub fn suggested_timeline(state: &PipelineState) -> Vec<TimelineEntry> {
    let anchor = state
        .order_placed_at
        .map(|at| at.date_naive())
        .or(state.start_date);
    let payment_date = state.payment_received_at.map(|at| at.date_naive());

    PipelineStage::ALL
        .iter()
        .map(|&stage| {
            let suggested_date = match (stage, payment_date) {
                (PipelineStage::OrderPackaged, Some(paid)) => Some(paid + Duration::days(1)),
                (PipelineStage::OrderShipped, Some(paid)) => Some(paid + Duration::days(2)),
                (PipelineStage::OrderDelivered, Some(paid)) => Some(paid + Duration::days(3)),
                _ => anchor.map(|start| start + Duration::days(stage.day_offset())),
            };
            TimelineEntry {
                stage,
                label: stage.label(),
                suggested_date,
                reached_at: state.reached_at(stage),
            }
        })
        .collect()
}

/// An unpaid order held longer than `escalation_days` since it was placed.
pub fn escalation_due(
    state: &PipelineState,
    effective: PipelineStage,
    now: DateTime<Utc>,
    escalation_days: i64,
) -> bool {
    effective == PipelineStage::PaymentNotReceived
        && state
            .order_placed_at
            .is_some_and(|placed| now - placed > Duration::days(escalation_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
    }

    fn paid() -> PaymentFacts {
        PaymentFacts {
            settled: true,
            has_payments: true,
            latest_payment_at: Some(at(3)),
        }
    }

    fn partial() -> PaymentFacts {
        PaymentFacts {
            settled: false,
            has_payments: true,
            latest_payment_at: Some(at(2)),
        }
    }

    fn state() -> PipelineState {
        PipelineState::initial(Uuid::new_v4(), at(1))
    }

    #[test]
    fn test_paid_order_shows_payment_received() {
        assert_eq!(
            effective_stage(PipelineStage::OrderPlaced, &paid()),
            PipelineStage::PaymentReceived
        );
        assert_eq!(
            effective_stage(PipelineStage::PaymentNotReceived, &paid()),
            PipelineStage::PaymentReceived
        );
        assert_eq!(
            effective_stage(PipelineStage::OrderShipped, &paid()),
            PipelineStage::OrderShipped
        );
    }

    #[test]
    fn test_unpaid_never_shows_fulfilment() {
        let unpaid = PaymentFacts::default();
        assert_eq!(
            effective_stage(PipelineStage::OrderPlaced, &unpaid),
            PipelineStage::OrderPlaced
        );
        assert_eq!(
            effective_stage(PipelineStage::ContactCustomer, &unpaid),
            PipelineStage::ContactCustomer
        );
        assert_eq!(
            effective_stage(PipelineStage::OrderPackaged, &unpaid),
            PipelineStage::PaymentNotReceived
        );
    }

    #[test]
    fn test_any_payment_moves_past_order_placed() {
        for stage in PipelineStage::ALL {
            for facts in [paid(), partial()] {
                assert!(effective_stage(stage, &facts).rank() > PipelineStage::OrderPlaced.rank());
            }
        }
    }

    #[test]
    fn test_skipping_a_step_rejected() {
        let mut state = state();
        let err = apply_transition(&mut state, PipelineStage::OrderShipped, &paid(), at(4));
        assert!(matches!(err, Err(EngineError::InvalidTransition { .. })));
        assert_eq!(state.current_stage, PipelineStage::OrderPlaced);
    }

    #[test]
    fn test_payment_gate_checked_first() {
        let mut state = state();
        assert_eq!(
            apply_transition(&mut state, PipelineStage::PaymentReceived, &partial(), at(4)),
            Err(EngineError::NotPaidInFull(PipelineStage::PaymentReceived))
        );
    }

    #[test]
    fn test_payment_received_stamped_from_latest_payment() {
        let mut state = state();
        apply_transition(&mut state, PipelineStage::PaymentReceived, &paid(), at(5)).unwrap();
        assert_eq!(state.current_stage, PipelineStage::PaymentReceived);
        assert_eq!(state.payment_received_at, Some(at(3)));
        assert_eq!(state.updated_at, at(5));
    }

    #[test]
    fn test_reached_timestamps_are_never_overwritten() {
        let mut state = state();
        apply_transition(&mut state, PipelineStage::PaymentNotReceived, &partial(), at(2)).unwrap();
        apply_transition(&mut state, PipelineStage::PaymentNotReceived, &partial(), at(6)).unwrap();
        assert_eq!(state.payment_not_received_at, Some(at(2)));
        assert_eq!(state.payment_issue_notified_at, Some(at(2)));
        assert_eq!(state.order_placed_at, Some(at(1)));
    }

    #[test]
    fn test_predecessors_backfilled() {
        let mut state = state();
        state.contacted_at = None;
        state.current_stage = PipelineStage::ContactCustomer;
        apply_transition(&mut state, PipelineStage::OrderPlaced, &partial(), at(4)).unwrap();
        assert_eq!(state.contacted_at, Some(at(4)));
        assert_eq!(state.order_placed_at, Some(at(1)));
    }

    #[test]
    fn test_timeline_from_order_date() {
        let timeline = suggested_timeline(&state());
        let dates: Vec<_> = timeline
            .iter()
            .map(|e| e.suggested_date.unwrap().format("%d").to_string())
            .collect();
        assert_eq!(dates, ["01", "01", "02", "02", "03", "04", "05"]);
        assert_eq!(timeline[1].reached_at, Some(at(1)));
        assert_eq!(timeline[4].reached_at, None);
    }

    #[test]
    fn test_timeline_reanchored_on_payment() {
        let mut state = state();
        state.payment_received_at = Some(at(10));
        let timeline = suggested_timeline(&state);
        let packaged = &timeline[4];
        assert_eq!(packaged.stage, PipelineStage::OrderPackaged);
        assert_eq!(packaged.suggested_date, Some(at(11).date_naive()));
        assert_eq!(timeline[6].suggested_date, Some(at(13).date_naive()));
        assert_eq!(timeline[3].suggested_date, Some(at(2).date_naive()));
    }

    #[test]
    fn test_escalation_after_hold_period() {
        let state = state();
        let unpaid = PipelineStage::PaymentNotReceived;
        assert!(!escalation_due(&state, unpaid, at(3), 2));
        assert!(escalation_due(&state, unpaid, at(3) + Duration::hours(1), 2));
        assert!(!escalation_due(
            &state,
            PipelineStage::PaymentReceived,
            at(10),
            2
        ));
    }
}
