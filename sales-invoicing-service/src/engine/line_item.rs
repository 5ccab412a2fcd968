use rust_decimal::Decimal;

use super::{checked, EngineError, Fraction, Quantity};

/// Validated inputs for one service line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineItemInput {
    pub price_per_unit: Decimal,
    pub quantity: Quantity,
    pub discount: Fraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    /// `price_per_unit * quantity`, before any discount.
    pub gross: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
}

impl LineItemInput {
    pub fn new(
        price_per_unit: Decimal,
        quantity: i64,
        discount_percent: Decimal,
    ) -> Result<Self, EngineError> {
        if price_per_unit < Decimal::ZERO {
            return Err(EngineError::NegativePrice(price_per_unit));
        }
        Ok(Self {
            price_per_unit,
            quantity: Quantity::new(quantity)?,
            discount: Fraction::new("discount_percent", discount_percent)?,
        })
    }

    pub fn compute(&self) -> Result<LineAmounts, EngineError> {
        let gross = checked(
            self.price_per_unit
                .checked_mul(Decimal::from(self.quantity.value())),
            "line gross",
        )?;
        let discount_amount = checked(gross.checked_mul(self.discount.value()), "line discount")?;
        Ok(LineAmounts {
            gross,
            discount_amount,
            total_price: checked(gross.checked_sub(discount_amount), "total_price")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_discounted_line() {
        let amounts = LineItemInput::new(dec!(100), 2, dec!(0.1))
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(amounts.gross, dec!(200));
        assert_eq!(amounts.discount_amount, dec!(20));
        assert_eq!(amounts.total_price, dec!(180));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert_eq!(
            LineItemInput::new(dec!(100), 0, dec!(0)),
            Err(EngineError::InvalidQuantity(0))
        );
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(matches!(
            LineItemInput::new(dec!(-1), 1, dec!(0)),
            Err(EngineError::NegativePrice(_))
        ));
    }

    #[test]
    fn test_gross_overflow_is_reported() {
        let line = LineItemInput::new(Decimal::MAX, 2, dec!(0)).unwrap();
        assert_eq!(line.compute(), Err(EngineError::AmountOverflow("line gross")));
    }

    #[test]
    fn test_full_discount_yields_zero() {
        let amounts = LineItemInput::new(dec!(49.99), 3, dec!(1))
            .unwrap()
            .compute()
            .unwrap();
        assert_eq!(amounts.total_price, Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn total_price_matches_closed_form(
            cents in 0i64..10_000_000,
            quantity in 1i64..1_000,
            basis_points in 0i64..=10_000,
        ) {
            let price = Decimal::new(cents, 2);
            let discount = Decimal::new(basis_points, 4);
            let amounts = LineItemInput::new(price, quantity, discount).unwrap().compute().unwrap();
            let expected = price * Decimal::from(quantity) * (Decimal::ONE - discount);
            prop_assert_eq!(amounts.total_price, expected);
            prop_assert!(amounts.total_price >= Decimal::ZERO);
        }
    }
}
