//! Money helpers.
//!
//! Prices are stored as `NUMERIC(10,2)` rupee amounts and carried as
//! [`Decimal`]. Payment gateways want integer minor units (paise).

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// The single currency the shop trades in.
pub const CURRENCY: &str = "INR";

/// Errors converting an amount to minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("amount cannot be negative")]
    Negative,
    #[error("amount is too large")]
    Overflow,
}

/// Convert a major-unit amount to integer minor units.
///
/// Rounds half away from zero at two decimal places, so `499.995` becomes
/// `50000`.
///
/// # Errors
///
/// Returns [`MoneyError::Negative`] for amounts below zero and
/// [`MoneyError::Overflow`] when the result does not fit an `i64`.
///
/// # Example
///
/// ```
/// use loomshop_core::to_minor_units;
/// use rust_decimal::Decimal;
///
/// assert_eq!(to_minor_units(Decimal::new(129_950, 2)).unwrap(), 129_950);
/// ```
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative);
    }
    let scaled = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(MoneyError::Overflow)?
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    scaled.to_i64().ok_or(MoneyError::Overflow)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_whole_and_fractional_amounts() {
        assert_eq!(to_minor_units(Decimal::from(1000)).unwrap(), 100_000);
        assert_eq!(to_minor_units(Decimal::from_str("12.34").unwrap()).unwrap(), 1234);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        assert_eq!(to_minor_units(Decimal::from_str("0.005").unwrap()).unwrap(), 1);
        assert_eq!(to_minor_units(Decimal::from_str("0.004").unwrap()).unwrap(), 0);
        assert_eq!(
            to_minor_units(Decimal::from_str("499.995").unwrap()).unwrap(),
            50_000
        );
    }

    #[test]
    fn test_negative_rejected() {
        assert_eq!(
            to_minor_units(Decimal::from_str("-1.00").unwrap()),
            Err(MoneyError::Negative)
        );
    }

    #[test]
    fn test_overflow_rejected() {
        assert_eq!(to_minor_units(Decimal::MAX), Err(MoneyError::Overflow));
    }
}
