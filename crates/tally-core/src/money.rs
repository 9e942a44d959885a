//! # Money Module
//!
//! Provides the `Money` type: an exact decimal with a fixed scale of eight
//! fractional digits.
//!
//! ## Why Fixed-Scale Decimals?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    100 × 0.9 × 1.1 = 98.99999999999999  ❌ WRONG!                       │
//! │                                                                         │
//! │  OUR SOLUTION: Decimal, truncated to 8 digits after every operation     │
//! │    (100 − 10) × 1.10 = 99.00000000      ✅ exact                        │
//! │                                                                         │
//! │  Every amount is rendered zero-padded: "99.00000000"                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same type carries quantities, percentage rates and loyalty points,
//! so every figure that takes part in a total follows identical rounding.
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::parse("100").unwrap();
//! let discount = Money::parse("10").unwrap();
//! let rate = Money::parse("10").unwrap();
//!
//! let net = price.checked_sub(discount).unwrap();
//! let total = net.checked_add(net.percent_of(rate).unwrap()).unwrap();
//! assert_eq!(total.to_string(), "99.00000000");
//! ```
//!
//! ## Range
//! Eight fractional digits leave room for a magnitude just under
//! `7.9 × 10^20`. Arithmetic is checked: a result outside that range is
//! [`MoneyError::Overflow`], never a panic or a silently rescaled value.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::{DECIMAL_SCALE, DISPLAY_SCALE};

/// A line quantity. Quantities may be fractional (weighed goods).
pub type Quantity = Money;

/// A percentage or conversion rate (`"10"` means 10%).
pub type Rate = Money;

/// A loyalty points amount.
pub type Points = Money;

/// Failure to read a decimal amount from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Amount is empty")]
    Empty,

    #[error("'{0}' is not a valid decimal amount")]
    Invalid(String),

    #[error("Amount exceeds the supported range")]
    Overflow,

    #[error("Division by zero")]
    DivisionByZero,
}

// =============================================================================
// Money Type
// =============================================================================

/// An exact decimal value held at [`DECIMAL_SCALE`] fractional digits.
///
/// ## Design Decisions
/// - **Truncation, not rounding**: every operation truncates toward zero,
///   like BCMath with a fixed scale. Totals are reproducible digit for digit.
/// - **Always normalized**: the inner decimal always has scale 8, so
///   `Display` yields `"100.00000000"` and never `"100"`.
/// - **Serialized as a string**: JSON payloads never carry binary floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Zero, at full scale.
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, DECIMAL_SCALE));

    /// Reads a decimal amount such as `"100"`, `"12.5"` or `"-3.25"`.
    ///
    /// Surrounding whitespace is ignored. Digits beyond the eighth
    /// fractional place are truncated.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::parse("12.5").unwrap().to_string(), "12.50000000");
    /// assert!(Money::parse("abc").is_err());
    /// assert!(Money::parse("  ").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Money, MoneyError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MoneyError::Empty);
        }

        let value =
            Decimal::from_str(trimmed).map_err(|_| MoneyError::Invalid(trimmed.to_string()))?;
        Money::from_decimal(value)
    }

    /// Wraps a decimal, truncating it to the fixed scale.
    ///
    /// Fails with [`MoneyError::Overflow`] when the value has too many
    /// integer digits to carry eight fractional ones.
    pub fn from_decimal(value: Decimal) -> Result<Money, MoneyError> {
        let normalized = normalize(value);
        if normalized.scale() != DECIMAL_SCALE {
            return Err(MoneyError::Overflow);
        }
        Ok(Money(normalized))
    }

    /// Creates a whole-number amount.
    pub fn from_int(value: i64) -> Money {
        // Any i64 fits
        Money(normalize(Decimal::from(value)))
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Money {
        Money::ZERO
    }

    /// Returns the underlying decimal (always at scale 8).
    #[inline]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_positive()
    }

    /// Strictly less than zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    /// `self + other`, truncated to scale.
    pub fn checked_add(self, other: Money) -> Result<Money, MoneyError> {
        let sum = self.0.checked_add(other.0).ok_or(MoneyError::Overflow)?;
        Money::from_decimal(sum)
    }

    /// `self - other`, truncated to scale.
    pub fn checked_sub(self, other: Money) -> Result<Money, MoneyError> {
        let difference = self.0.checked_sub(other.0).ok_or(MoneyError::Overflow)?;
        Money::from_decimal(difference)
    }

    /// `self × other`, truncated to scale.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Money, MoneyError};
    ///
    /// let huge = Money::parse("100000000000000000000").unwrap();
    /// assert_eq!(huge.checked_mul(huge), Err(MoneyError::Overflow));
    /// ```
    pub fn checked_mul(self, other: Money) -> Result<Money, MoneyError> {
        let product = self.0.checked_mul(other.0).ok_or(MoneyError::Overflow)?;
        Money::from_decimal(product)
    }

    /// `self ÷ other`, truncated to scale.
    pub fn checked_div(self, other: Money) -> Result<Money, MoneyError> {
        if other.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        let quotient = self.0.checked_div(other.0).ok_or(MoneyError::Overflow)?;
        Money::from_decimal(quotient)
    }

    /// Adds up `values`, failing on the first sum out of range.
    pub fn checked_sum<I>(values: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        values
            .into_iter()
            .try_fold(Money::ZERO, |total, value| total.checked_add(value))
    }

    /// Three-way numeric comparison.
    pub fn compare(&self, other: &Money) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// `self × (rate ÷ 100)`.
    ///
    /// The rate is scaled first and the product truncated after, the same
    /// order in which tax and percentage discounts are specified.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let net = Money::from_int(90);
    /// let tax = net.percent_of(Money::from_int(10)).unwrap();
    /// assert_eq!(tax.to_string(), "9.00000000");
    /// ```
    pub fn percent_of(self, rate: Rate) -> Result<Money, MoneyError> {
        self.checked_mul(rate.checked_div(Money::from_int(100))?)
    }

    /// The smaller of two amounts.
    pub fn min(self, other: Money) -> Money {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    /// The larger of two amounts.
    pub fn max(self, other: Money) -> Money {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    /// Renders at two fractional digits, rounding half away from zero.
    ///
    /// For receipts and API responses. Stored values keep all eight digits.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::parse("10.005").unwrap().to_display(), "10.01");
    /// assert_eq!(Money::parse("99").unwrap().to_display(), "99.00");
    /// ```
    pub fn to_display(&self) -> String {
        let mut rounded = self
            .0
            .round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        if rounded.is_zero() {
            rounded = Decimal::ZERO;
        }
        rounded.rescale(DISPLAY_SCALE);
        rounded.to_string()
    }
}

/// Truncates toward zero at the fixed scale, pads to exactly that scale and
/// drops the sign of zero.
fn normalize(value: Decimal) -> Decimal {
    let mut truncated = value.round_dp_with_strategy(DECIMAL_SCALE, RoundingStrategy::ToZero);
    if truncated.is_zero() {
        truncated = Decimal::ZERO;
    }
    truncated.rescale(DECIMAL_SCALE);
    truncated
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Money::from_int(value)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        // The range is symmetric
        Money(normalize(-self.0))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Ok(Money::from_int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Ok(Money(normalize(Decimal::from(v))))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn test_parse_pads_to_eight_digits() {
        assert_eq!(m("100").to_string(), "100.00000000");
        assert_eq!(m("0.1").to_string(), "0.10000000");
        assert_eq!(m(" -5.5 ").to_string(), "-5.50000000");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Money::parse(""), Err(MoneyError::Empty));
        assert_eq!(
            Money::parse("12,50"),
            Err(MoneyError::Invalid("12,50".to_string()))
        );
    }

    #[test]
    fn test_excess_digits_are_truncated() {
        assert_eq!(m("1.123456789").to_string(), "1.12345678");
        assert_eq!(m("-1.123456789").to_string(), "-1.12345678");
    }

    #[test]
    fn test_arithmetic() {
        let a = m("10");
        let b = m("2.5");

        assert_eq!(a.checked_add(b).unwrap().to_string(), "12.50000000");
        assert_eq!(a.checked_sub(b).unwrap().to_string(), "7.50000000");
        assert_eq!(a.checked_mul(b).unwrap().to_string(), "25.00000000");
        assert_eq!(a.checked_div(b).unwrap().to_string(), "4.00000000");
        assert_eq!((-b).to_string(), "-2.50000000");
    }

    #[test]
    fn test_division_truncates() {
        assert_eq!(m("10").checked_div(m("3")).unwrap().to_string(), "3.33333333");
        assert_eq!(m("2").checked_div(m("3")).unwrap().to_string(), "0.66666666");
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        assert_eq!(
            m("1").checked_div(Money::zero()),
            Err(MoneyError::DivisionByZero)
        );
    }

    #[test]
    fn test_results_out_of_range_are_errors() {
        let big = m("100000000000000000000");

        assert_eq!(big.checked_mul(big), Err(MoneyError::Overflow));
        assert_eq!(big.percent_of(big), Err(MoneyError::Overflow));

        // 10^21 is a valid Decimal but has no room for eight fractional digits
        let half = m("500000000000000000000");
        assert_eq!(half.checked_add(half), Err(MoneyError::Overflow));
        assert_eq!((-half).checked_sub(half), Err(MoneyError::Overflow));
        assert_eq!(
            Money::checked_sum([half, half, m("1")]),
            Err(MoneyError::Overflow)
        );

        // Just inside the range
        assert_eq!(
            big.checked_add(big).unwrap().to_string(),
            "200000000000000000000.00000000"
        );
    }

    #[test]
    fn test_parse_rejects_amounts_out_of_range() {
        assert_eq!(
            Money::parse("1000000000000000000000"),
            Err(MoneyError::Overflow)
        );
        assert!(serde_json::from_str::<Money>("\"-1000000000000000000000\"").is_err());
    }

    #[test]
    fn test_no_float_drift() {
        // 0.1 + 0.2 is exactly 0.3 here
        assert_eq!(m("0.1").checked_add(m("0.2")).unwrap(), m("0.3"));

        // (100 - 10) × 1.10 is exactly 99
        let net = m("100").checked_sub(m("10")).unwrap();
        let total = net.checked_add(net.percent_of(m("10")).unwrap()).unwrap();
        assert_eq!(total.to_string(), "99.00000000");
    }

    #[test]
    fn test_compare_and_min() {
        assert_eq!(m("1").compare(&m("1.00000000")), Ordering::Equal);
        assert_eq!(m("1").compare(&m("2")), Ordering::Less);
        assert_eq!(m("200").min(m("50")), m("50"));
        assert_eq!(m("200").max(m("50")), m("200"));
    }

    #[test]
    fn test_zero_and_sign_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        assert!(m("0.00000001").is_positive());
        assert!(m("-0.00000001").is_negative());

        // Truncating a tiny negative value yields a plain zero
        assert_eq!(m("-0.000000001").to_string(), "0.00000000");
    }

    #[test]
    fn test_display_scale() {
        assert_eq!(m("10.005").to_display(), "10.01");
        assert_eq!(m("10.004").to_display(), "10.00");
        assert_eq!(m("-2.5").to_display(), "-2.50");
    }

    #[test]
    fn test_sum() {
        let total = Money::checked_sum([m("60"), m("40"), m("0.5")]).unwrap();
        assert_eq!(total.to_string(), "100.50000000");
        assert_eq!(Money::checked_sum(Vec::new()), Ok(Money::zero()));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&m("12.5")).unwrap();
        assert_eq!(json, "\"12.50000000\"");

        let from_str: Money = serde_json::from_str("\"99\"").unwrap();
        assert_eq!(from_str, m("99"));

        let from_int: Money = serde_json::from_str("42").unwrap();
        assert_eq!(from_int, m("42"));
    }
}
