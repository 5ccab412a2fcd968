use rust_decimal::Decimal;

use super::{checked, EngineError, Fraction, LineItemInput};

/// Invoice-level aggregation. Every intermediate amount is kept at full
/// precision; rounding happens only when presenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvoiceTotals {
    pub service_total: Decimal,
    pub service_discount_total: Decimal,
    pub subtotal_after_line_discounts: Decimal,
    pub invoice_discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub final_total: Decimal,
}

impl InvoiceTotals {
    /// Tax applies after both discount layers; the invoice discount applies
    /// to the subtotal left after line discounts.
    pub fn compute<'a>(
        lines: impl IntoIterator<Item = &'a LineItemInput>,
        invoice_discount: Fraction,
        tax_rate: Fraction,
    ) -> Result<Self, EngineError> {
        let (service_total, service_discount_total) = lines.into_iter().try_fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(gross, discount), line| {
                let line = line.compute()?;
                Ok::<_, EngineError>((
                    checked(gross.checked_add(line.gross), "service_total")?,
                    checked(
                        discount.checked_add(line.discount_amount),
                        "service_discount_total",
                    )?,
                ))
            },
        )?;

        let subtotal_after_line_discounts = checked(
            service_total.checked_sub(service_discount_total),
            "subtotal_after_line_discounts",
        )?;
        let invoice_discount_amount = checked(
            subtotal_after_line_discounts.checked_mul(invoice_discount.value()),
            "invoice_discount_amount",
        )?;
        let taxable_amount = checked(
            subtotal_after_line_discounts.checked_sub(invoice_discount_amount),
            "taxable_amount",
        )?;
        let tax_amount = checked(taxable_amount.checked_mul(tax_rate.value()), "tax_amount")?;

        Ok(Self {
            service_total,
            service_discount_total,
            subtotal_after_line_discounts,
            invoice_discount_amount,
            taxable_amount,
            tax_amount,
            final_total: checked(taxable_amount.checked_add(tax_amount), "final_total")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn fraction(value: Decimal) -> Fraction {
        Fraction::new("test", value).unwrap()
    }

    #[test]
    fn test_single_line_with_both_discounts_and_tax() {
        let line = LineItemInput::new(dec!(100), 2, dec!(0.1)).unwrap();
        let totals = InvoiceTotals::compute([&line], fraction(dec!(0.05)), fraction(dec!(0.08))).unwrap();

        assert_eq!(totals.service_total, dec!(200));
        assert_eq!(totals.service_discount_total, dec!(20));
        assert_eq!(totals.subtotal_after_line_discounts, dec!(180));
        assert_eq!(totals.invoice_discount_amount, dec!(9));
        assert_eq!(totals.taxable_amount, dec!(171));
        assert_eq!(totals.tax_amount, dec!(13.68));
        assert_eq!(totals.final_total, dec!(184.68));
    }

    #[test]
    fn test_no_lines_is_zero() {
        let lines: Vec<LineItemInput> = Vec::new();
        let totals = InvoiceTotals::compute(&lines, fraction(dec!(0.5)), fraction(dec!(0.2))).unwrap();
        assert_eq!(totals, InvoiceTotals::default());
    }

    #[test]
    fn test_no_intermediate_rounding() {
        let line = LineItemInput::new(dec!(0.333), 3, dec!(0)).unwrap();
        let totals = InvoiceTotals::compute([&line], Fraction::ZERO, fraction(dec!(0.075))).unwrap();
        assert_eq!(totals.tax_amount, dec!(0.0749250));
        assert_eq!(totals.final_total, dec!(1.0739250));
    }

    #[test]
    fn test_sum_overflow_is_reported() {
        let line = LineItemInput::new(dec!(40000000000000000000000000000), 1, dec!(0)).unwrap();
        assert_eq!(
            InvoiceTotals::compute([&line, &line], Fraction::ZERO, Fraction::ZERO),
            Err(EngineError::AmountOverflow("service_total"))
        );
    }

    #[test]
    fn test_tax_overflow_is_reported() {
        let line = LineItemInput::new(Decimal::MAX, 1, dec!(0)).unwrap();
        assert_eq!(
            InvoiceTotals::compute([&line], Fraction::ZERO, fraction(dec!(0.5))),
            Err(EngineError::AmountOverflow("final_total"))
        );
    }

    fn line_strategy() -> impl Strategy<Value = LineItemInput> {
        (0i64..1_000_000, 1i64..50, 0i64..=100).prop_map(|(cents, qty, pct)| {
            LineItemInput::new(Decimal::new(cents, 2), qty, Decimal::new(pct, 2)).unwrap()
        })
    }

    proptest! {
        #[test]
        fn final_total_ignores_line_order(
            mut lines in prop::collection::vec(line_strategy(), 0..8),
            discount in 0i64..=100,
            tax in 0i64..=100,
        ) {
            let discount = fraction(Decimal::new(discount, 2));
            let tax = fraction(Decimal::new(tax, 2));
            let forward = InvoiceTotals::compute(&lines, discount, tax).unwrap();
            lines.reverse();
            let reversed = InvoiceTotals::compute(&lines, discount, tax).unwrap();
            prop_assert_eq!(forward.final_total, reversed.final_total);
        }

        #[test]
        fn final_total_non_increasing_in_invoice_discount(
            lines in prop::collection::vec(line_strategy(), 1..5),
            low in 0i64..=100,
            bump in 0i64..=100,
            tax in 0i64..=100,
        ) {
            let high = (low + bump).min(100);
            let tax = fraction(Decimal::new(tax, 2));
            let cheaper = InvoiceTotals::compute(&lines, fraction(Decimal::new(high, 2)), tax).unwrap();
            let dearer = InvoiceTotals::compute(&lines, fraction(Decimal::new(low, 2)), tax).unwrap();
            prop_assert!(cheaper.final_total <= dearer.final_total);
        }

        #[test]
        fn final_total_non_increasing_in_line_discount(
            cents in 0i64..1_000_000,
            qty in 1i64..50,
            low in 0i64..=100,
            bump in 0i64..=100,
        ) {
            let high = (low + bump).min(100);
            let price = Decimal::new(cents, 2);
            let a = LineItemInput::new(price, qty, Decimal::new(low, 2)).unwrap();
            let b = LineItemInput::new(price, qty, Decimal::new(high, 2)).unwrap();
            let tax = fraction(dec!(0.08));
            let dearer = InvoiceTotals::compute([&a], Fraction::ZERO, tax).unwrap();
            let cheaper = InvoiceTotals::compute([&b], Fraction::ZERO, tax).unwrap();
            prop_assert!(cheaper.final_total <= dearer.final_total);
        }
    }
}
