//! Monetary helpers built on decimal arithmetic.
//!
//! All amounts are `rust_decimal::Decimal` in the currency's standard unit
//! (dollars, not cents). Totals are computed exactly; rounding only happens
//! when an amount is formatted for display.

use rust_decimal::{Decimal, RoundingStrategy};

/// Tax fraction applied to the cart subtotal (5%).
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Format an amount as a two-decimal dollar string (e.g. `$262.50`).
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-${:.2}", rounded.abs())
    } else {
        format!("${:.2}", rounded.abs())
    }
}

/// Format a fraction as a whole or fractional percentage (e.g. `0.05` → `5%`).
#[must_use]
pub fn format_percent(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_default_tax_rate_is_five_percent() {
        assert_eq!(DEFAULT_TAX_RATE, Decimal::new(5, 2));
    }

    #[test]
    fn test_format_money_pads_and_rounds() {
        assert_eq!(format_money(Decimal::new(2625, 1)), "$262.50");
        assert_eq!(format_money(Decimal::ZERO), "$0.00");
        assert_eq!(format_money(Decimal::new(10_005, 3)), "$10.01");
        assert_eq!(format_money(Decimal::new(-150, 2)), "-$1.50");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(DEFAULT_TAX_RATE), "5%");
        assert_eq!(format_percent(Decimal::new(75, 3)), "7.5%");
        assert_eq!(format_percent(Decimal::ZERO), "0%");
    }
}
