//! Money calculation utilities using rust_decimal for precision
//!
//! Amounts are stored as `f64`; all arithmetic happens on `Decimal` and is
//! rounded to 2 decimal places (half away from zero) on the way out.

use rust_decimal::prelude::*;

const DECIMAL_PLACES: u32 = 2;

/// Convert f64 to Decimal for calculations
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Σ price × qty
pub fn line_total(lines: &[(f64, i64)]) -> Decimal {
    lines
        .iter()
        .map(|&(price, qty)| to_decimal(price) * Decimal::from(qty))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total_avoids_float_drift() {
        let lines = [(0.1, 1), (0.2, 1), (1.15, 3)];
        assert_eq!(to_f64(line_total(&lines)), 3.75);
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(to_f64(Decimal::new(1005, 3)), 1.01);
        assert_eq!(to_f64(Decimal::new(-1005, 3)), -1.01);
    }

    #[test]
    fn test_empty_total_is_zero() {
        assert_eq!(line_total(&[]), Decimal::ZERO);
    }
}
