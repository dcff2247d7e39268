//! # Quantity Module
//!
//! Ingredient amounts (stock on hand, alert thresholds, recipe usage) as a
//! fixed-point integer of thousandths of the ingredient's unit.
//!
//! ```text
//! 10 kg of beef      → Quantity(10_000)
//! 0.2 kg per burger  → Quantity(200)
//! 3 burgers          → 200 × 3 = 600  → 10_000 - 600 = 9_400 (9.4 kg)
//! ```
//!
//! The ledger deducts with `quantity_milli = quantity_milli - ?` in SQL, so
//! the stored representation must be an exact integer.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use crate::error::ValidationError;

/// An ingredient amount in thousandths of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Quantity(i64);

impl Quantity {
    /// Number of decimal places represented by one unit.
    pub const SCALE: u32 = 3;

    /// Creates a quantity from thousandths of a unit.
    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    /// Creates a quantity from whole units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * 1000)
    }

    /// Returns the raw thousandths.
    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Scales a per-portion amount by the number of portions sold.
    pub fn times(&self, portions: i64) -> Result<Self, ValidationError> {
        self.0
            .checked_mul(portions)
            .map(Quantity)
            .ok_or_else(quantity_out_of_range)
    }

    pub fn checked_add(self, rhs: Quantity) -> Result<Self, ValidationError> {
        self.0
            .checked_add(rhs.0)
            .map(Quantity)
            .ok_or_else(quantity_out_of_range)
    }

    /// Converts an exact decimal amount; more than three places is rejected.
    pub fn from_decimal(value: Decimal) -> Result<Self, ValidationError> {
        let scaled = value
            .checked_mul(Decimal::from(1000))
            .ok_or_else(quantity_out_of_range)?;

        if !scaled.fract().is_zero() {
            return Err(ValidationError::InvalidFormat {
                field: "quantity".to_string(),
                reason: "at most 3 decimal places".to_string(),
            });
        }

        scaled.to_i64().map(Quantity).ok_or_else(quantity_out_of_range)
    }

    /// Parses decimal text ("0.2", "10", "-1.5").
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let value = Decimal::from_str(text.trim()).map_err(|e| ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_decimal(value)
    }

    /// Returns the exact decimal value.
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, Self::SCALE)
    }
}

fn quantity_out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "quantity".to_string(),
        min: i64::MIN,
        max: i64::MAX,
    }
}

/// Renders without trailing zeros: `9.4`, `10`, `-0.25`.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal().normalize())
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Quantity(self.0 + other.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Quantity(self.0 - other.0)
    }
}

impl Neg for Quantity {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Quantity(-self.0)
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(Quantity::parse("0.2").unwrap().milli(), 200);
        assert_eq!(Quantity::parse("10").unwrap(), Quantity::from_units(10));
        assert_eq!(Quantity::parse("-1.25").unwrap().milli(), -1250);
        assert_eq!(Quantity::from_milli(9400).to_string(), "9.4");
        assert_eq!(Quantity::from_units(10).to_string(), "10");
    }

    #[test]
    fn test_rejects_excess_precision() {
        assert!(Quantity::parse("0.0005").is_err());
        assert!(Quantity::parse("abc").is_err());
    }

    #[test]
    fn test_burger_deduction_arithmetic() {
        let stock = Quantity::parse("10").unwrap();
        let per_burger = Quantity::parse("0.2").unwrap();
        let remaining = stock - per_burger.times(3).unwrap();
        assert_eq!(remaining, Quantity::parse("9.4").unwrap());
        assert!(!remaining.is_negative());
    }

    #[test]
    fn test_negative_is_representable() {
        let remaining = Quantity::from_units(1) - Quantity::from_milli(1500);
        assert!(remaining.is_negative());
        assert_eq!(remaining.to_string(), "-0.5");
        assert_eq!(-remaining, Quantity::from_milli(500));
    }

    #[test]
    fn test_checked_arithmetic() {
        let per_portion = Quantity::from_milli(i64::MAX / 2);
        assert!(matches!(
            per_portion.times(3),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(per_portion.checked_add(per_portion).is_ok());
        assert!(Quantity::from_milli(i64::MAX)
            .checked_add(Quantity::from_milli(1))
            .is_err());
    }
}
