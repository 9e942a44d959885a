//! # Order Pricing
//!
//! Turns raw order lines into priced lines and order-level totals.
//!
//! ## Per-Line Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  gross      = unit_price × quantity                                     │
//! │  net        = gross − discount          (discount is an amount)         │
//! │  tax        = net × (tax_rate ÷ 100)                                    │
//! │  line_total = net + tax                                                 │
//! │                                                                         │
//! │  Example: 100 × 1, discount 10, tax 10%                                 │
//! │    gross 100 → net 90 → tax 9 → line_total 99.00000000                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Order Totals
//! `subtotal = Σ gross`, `tax_amount = Σ tax`, `total = Σ line_total`.
//! The total here is *before* any discount code.
//!
//! Inputs are not range-checked: negative prices or quantities are the
//! calling layer's concern. A figure too large for [`Money`] fails the whole
//! order with [`CoreError::InvalidAmount`](crate::error::CoreError::InvalidAmount).

use crate::error::CoreResult;
use crate::money::Money;
use crate::types::{OrderLineInput, PosOrderLine};

/// Order-level figures before any discount code.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTotals {
    pub lines: Vec<PosOrderLine>,
    /// Σ gross.
    pub subtotal: Money,
    /// Σ per-line discount.
    pub line_discount: Money,
    /// Σ per-line tax.
    pub tax_amount: Money,
    /// Σ line total.
    pub total: Money,
}

/// Prices one line.
pub fn price_line(line: &OrderLineInput) -> CoreResult<PosOrderLine> {
    let gross = line.unit_price.checked_mul(line.quantity)?;
    let net = gross.checked_sub(line.discount)?;
    let tax = net.percent_of(line.tax_rate)?;

    Ok(PosOrderLine {
        product_id: line.product_id.clone(),
        product_name: line.product_name.clone(),
        unit_price: line.unit_price,
        quantity: line.quantity,
        discount: line.discount,
        tax_rate: line.tax_rate,
        gross_amount: gross,
        tax_amount: tax,
        line_total: net.checked_add(tax)?,
    })
}

/// Prices every line and sums the order.
///
/// ## Example
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::pricing::price_order;
/// use tally_core::types::OrderLineInput;
///
/// let line = OrderLineInput::new("p1", "Widget", Money::from_int(100), Money::from_int(1))
///     .with_discount(Money::from_int(10))
///     .with_tax_rate(Money::from_int(10));
///
/// let totals = price_order(&[line]).unwrap();
/// assert_eq!(totals.total.to_string(), "99.00000000");
/// ```
pub fn price_order(lines: &[OrderLineInput]) -> CoreResult<OrderTotals> {
    let lines = lines.iter().map(price_line).collect::<CoreResult<Vec<_>>>()?;

    Ok(OrderTotals {
        subtotal: Money::checked_sum(lines.iter().map(|l| l.gross_amount))?,
        line_discount: Money::checked_sum(lines.iter().map(|l| l.discount))?,
        tax_amount: Money::checked_sum(lines.iter().map(|l| l.tax_amount))?,
        total: Money::checked_sum(lines.iter().map(|l| l.line_total))?,
        lines,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::money::MoneyError;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    fn line(price: &str, qty: &str, discount: &str, tax: &str) -> OrderLineInput {
        OrderLineInput::new("p", "Product", m(price), m(qty))
            .with_discount(m(discount))
            .with_tax_rate(m(tax))
    }

    #[test]
    fn test_discount_is_an_amount_not_a_rate() {
        let priced = price_line(&line("100", "1", "10", "10")).unwrap();
        assert_eq!(priced.gross_amount, m("100"));
        assert_eq!(priced.tax_amount, m("9"));
        assert_eq!(priced.line_total.to_string(), "99.00000000");
    }

    #[test]
    fn test_multi_line_totals() {
        let totals = price_order(&[
            line("2.99", "3", "0", "8.25"),
            line("10", "2", "5", "0"),
        ])
        .unwrap();

        // 8.97 + 20
        assert_eq!(totals.subtotal, m("28.97"));
        assert_eq!(totals.line_discount, m("5"));
        // 8.97 × 0.0825 = 0.740025
        assert_eq!(totals.tax_amount, m("0.740025"));
        assert_eq!(totals.total, m("24.710025"));
        assert_eq!(totals.lines.len(), 2);
    }

    #[test]
    fn test_fractional_quantity() {
        let priced = price_line(&line("4.20", "0.375", "0", "0")).unwrap();
        assert_eq!(priced.line_total, m("1.575"));
    }

    #[test]
    fn test_no_lines_means_zero() {
        let totals = price_order(&[]).unwrap();
        assert!(totals.subtotal.is_zero());
        assert!(totals.tax_amount.is_zero());
        assert!(totals.total.is_zero());
    }

    #[test]
    fn test_totals_identity() {
        let totals =
            price_order(&[line("19.99", "2", "1.50", "7"), line("5", "1", "0", "20")]).unwrap();
        let rebuilt = totals
            .subtotal
            .checked_sub(totals.line_discount)
            .and_then(|net| net.checked_add(totals.tax_amount))
            .unwrap();
        assert_eq!(rebuilt, totals.total);
    }

    #[test]
    fn test_line_out_of_range_is_rejected() {
        let huge = line("100000000000000000000", "100000000000000000000", "0", "0");
        let err = price_order(&[huge]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount(MoneyError::Overflow)));
        assert_eq!(err.to_string(), "Invalid amount: Amount exceeds the supported range");
    }

    #[test]
    fn test_totals_out_of_range_are_rejected() {
        // Each line fits on its own; their sum does not
        let big = line("500000000000000000000", "1", "0", "0");
        let err = price_order(&[big.clone(), big]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount(MoneyError::Overflow)));
    }
}
