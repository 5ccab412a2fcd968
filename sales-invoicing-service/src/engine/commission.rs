use rust_decimal::Decimal;

use super::{checked, EngineError, Fraction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Commission {
    pub commission_amount: Decimal,
    /// Share of the final total; zero when the total is zero.
    pub commission_percent_of_total: Decimal,
}

impl Commission {
    pub fn compute(final_total: Decimal, rate: Fraction) -> Result<Self, EngineError> {
        let commission_amount = checked(final_total.checked_mul(rate.value()), "commission_amount")?;
        let commission_percent_of_total = if final_total.is_zero() {
            Decimal::ZERO
        } else {
            checked(
                commission_amount.checked_div(final_total),
                "commission_percent_of_total",
            )?
        };
        Ok(Self {
            commission_amount,
            commission_percent_of_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_commission_on_final_total() {
        let rate = Fraction::new("commission_rate", dec!(0.1)).unwrap();
        let commission = Commission::compute(dec!(184.68), rate).unwrap();
        assert_eq!(commission.commission_amount, dec!(18.468));
        assert_eq!(commission.commission_percent_of_total, dec!(0.1));
    }

    #[test]
    fn test_zero_total_has_zero_share() {
        let rate = Fraction::new("commission_rate", dec!(0.25)).unwrap();
        assert_eq!(Commission::compute(Decimal::ZERO, rate), Ok(Commission::default()));
    }
}
