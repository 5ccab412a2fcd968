//! Pure financial and pipeline computations. Nothing here touches the
//! record store; callers fetch the inputs immediately before use.

pub mod commission;
pub mod line_item;
pub mod pipeline;
pub mod reconciler;
pub mod totals;

use rust_decimal::Decimal;
use service_core::error::AppError;
use thiserror::Error;

use crate::models::PipelineStage;

pub use commission::Commission;
pub use line_item::{LineAmounts, LineItemInput};
pub use pipeline::{PaymentFacts, TimelineEntry};
pub use reconciler::PaymentSummary;
pub use totals::InvoiceTotals;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{field} must be a fraction between 0 and 1, got {value}")]
    FractionOutOfRange { field: &'static str, value: Decimal },

    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),

    #[error("price_per_unit must not be negative, got {0}")]
    NegativePrice(Decimal),

    #[error("total_paid must be greater than zero, got {0}")]
    NonPositivePayment(Decimal),

    #[error("{0} exceeds the supported amount range")]
    AmountOverflow(&'static str),

    #[error("unknown pipeline stage '{0}'")]
    UnknownStage(String),

    #[error("unknown invoice status '{0}'")]
    UnknownStatus(String),

    #[error("unknown pipeline action '{0}'")]
    UnknownAction(String),

    #[error("actor_user_id is required")]
    MissingActor,

    #[error("note is required")]
    MissingNote,

    #[error("complete the previous step before moving to {}", .to.label())]
    InvalidTransition {
        from: PipelineStage,
        to: PipelineStage,
    },

    #[error("invoice is not paid in full; log payment before moving to {}", .0.label())]
    NotPaidInFull(PipelineStage),
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError::BadRequest(anyhow::Error::new(err))
    }
}

/// Lifts a checked decimal operation into the engine's error type.
pub(crate) fn checked(value: Option<Decimal>, what: &'static str) -> Result<Decimal, EngineError> {
    value.ok_or(EngineError::AmountOverflow(what))
}

/// A rate or discount expressed as a fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fraction(Decimal);

impl Fraction {
    pub const ZERO: Fraction = Fraction(Decimal::ZERO);

    pub fn new(field: &'static str, value: Decimal) -> Result<Self, EngineError> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(EngineError::FractionOutOfRange { field, value });
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

/// A strictly positive unit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, EngineError> {
        match i32::try_from(value) {
            Ok(v) if v > 0 => Ok(Self(v)),
            _ => Err(EngineError::InvalidQuantity(value)),
        }
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fraction_bounds_are_inclusive() {
        assert!(Fraction::new("tax_rate", dec!(0)).is_ok());
        assert!(Fraction::new("tax_rate", dec!(1)).is_ok());
        assert_eq!(
            Fraction::new("tax_rate", dec!(-0.01)),
            Err(EngineError::FractionOutOfRange {
                field: "tax_rate",
                value: dec!(-0.01)
            })
        );
        assert!(Fraction::new("discount_percent", dec!(1.5)).is_err());
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert_eq!(Quantity::new(0), Err(EngineError::InvalidQuantity(0)));
        assert_eq!(Quantity::new(-3), Err(EngineError::InvalidQuantity(-3)));
        assert_eq!(Quantity::new(2).unwrap().value(), 2);
        assert!(Quantity::new(i64::from(i32::MAX) + 1).is_err());
    }

    #[test]
    fn test_engine_error_maps_to_bad_request() {
        let err: AppError = EngineError::MissingActor.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_overflow_is_a_bad_request() {
        let err = checked(Decimal::MAX.checked_add(Decimal::ONE), "total_paid").unwrap_err();
        assert_eq!(err, EngineError::AmountOverflow("total_paid"));
        let err: AppError = err.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_transition_message_uses_label() {
        let err = EngineError::InvalidTransition {
            from: PipelineStage::OrderPlaced,
            to: PipelineStage::OrderShipped,
        };
        assert_eq!(
            err.to_string(),
            "complete the previous step before moving to Order shipped"
        );
    }
}
