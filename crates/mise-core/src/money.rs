//! # Money
//!
//! Menu prices, line subtotals and order totals as whole cents.
//!
//! An order total must equal the sum of its line subtotals to the cent, so
//! nothing here touches floating point. Storage, SQL `SUM()` and arithmetic
//! all run on `i64` cents; decimal text like `"10.50"` is converted exactly
//! at the edges through [`rust_decimal`].
//!
//! ```rust
//! use mise_core::money::Money;
//!
//! let line = Money::parse("10.00").unwrap().multiply_quantity(2).unwrap();
//! assert_eq!(line.to_string(), "20.00");
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use crate::error::ValidationError;

/// An amount in cents. Signed, since a difference of two amounts may be
/// negative even though stored prices never are.
///
/// ```text
/// MenuItem.price ──► OrderItem.unit_price (snapshot) ──► OrderItem.subtotal
///                                                              │
///                                   Order.total = Σ subtotal ◄─┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Decimal places in one cent.
    pub const SCALE: u32 = 2;

    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Unit price times a line quantity. Fails instead of wrapping when the
    /// product leaves the `i64` cent range.
    pub fn multiply_quantity(&self, quantity: i64) -> Result<Self, ValidationError> {
        self.0
            .checked_mul(quantity)
            .map(Money)
            .ok_or_else(|| out_of_range("subtotal"))
    }

    pub fn checked_add(self, rhs: Money) -> Result<Self, ValidationError> {
        self.0
            .checked_add(rhs.0)
            .map(Money)
            .ok_or_else(|| out_of_range("total"))
    }

    /// Accepts up to two decimal places; `10.505` is rejected rather than
    /// rounded.
    pub fn from_decimal(value: Decimal) -> Result<Self, ValidationError> {
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| out_of_range("price"))?;
        if !cents.fract().is_zero() {
            return Err(ValidationError::InvalidFormat {
                field: "price".to_string(),
                reason: "at most 2 decimal places".to_string(),
            });
        }
        cents
            .to_i64()
            .map(Money)
            .ok_or_else(|| out_of_range("price"))
    }

    /// Parses decimal text such as `"10.50"` or `" 12 "`.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        Decimal::from_str(text.trim())
            .map_err(|e| ValidationError::InvalidFormat {
                field: "price".to_string(),
                reason: e.to_string(),
            })
            .and_then(Self::from_decimal)
    }

    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, Self::SCALE)
    }
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: i64::MIN,
        max: i64::MAX,
    }
}

/// Always two decimal places: `25.50`, `-3.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_decimal(), f)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
