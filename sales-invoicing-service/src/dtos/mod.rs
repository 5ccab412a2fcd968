//! Request and response bodies. Money leaves the service rounded to cents;
//! everything inside stays at full precision.

pub mod catalog;
pub mod invoices;
pub mod payments;
pub mod pipelines;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::Actor;

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field
/// (`None`, via `#[serde(default)]`).
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Who is performing a mutation. Accepted in bodies and, for deletes, in the
/// query string.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ActorFields {
    pub actor_user_id: Option<Uuid>,
    #[validate(email)]
    pub actor_email: Option<String>,
}

impl ActorFields {
    pub fn actor(&self) -> Result<Actor, AppError> {
        Ok(Actor::new(self.actor_user_id, self.actor_email.clone())?)
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(18.465)), dec!(18.47));
        assert_eq!(round_money(dec!(-18.465)), dec!(-18.47));
        assert_eq!(round_money(dec!(184.68)), dec!(184.68));
        assert_eq!(round_money(dec!(0.004)), dec!(0));
    }

    #[test]
    fn test_actor_fields_require_user() {
        let fields = ActorFields::default();
        assert!(fields.actor().is_err());
    }
}
