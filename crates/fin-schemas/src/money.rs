//! Exact-decimal money type.
//!
//! # Motivation
//!
//! All monetary amounts in this system are exact decimals. Using raw
//! [`Decimal`] (or worse, floats) for money is error-prone: it allows
//! accidental arithmetic with unrelated numbers and leaves the rounding rule
//! up to every call site.
//!
//! `Money` wraps a [`Decimal`] so that:
//! - Construction is explicit (no `From<f64>`; floats never touch money).
//! - Every value is normalized to the canonical scale with a single rounding
//!   rule: round-half-up ([`RoundingStrategy::MidpointAwayFromZero`]) at
//!   [`Money::SCALE`] fractional digits.
//! - Arithmetic stays closed over `Money`.
//!
//! # Arithmetic
//!
//! - `Add`, `Sub`, `Neg`, `AddAssign`, `SubAssign` are implemented for
//!   `Money op Money`.
//! - `checked_add` / `checked_sub` are the overflow-detecting alternatives.
//!   Overflow in a balance computation is a critical error, not a routine
//!   saturation, so callers must handle `None` explicitly.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An exact monetary amount, normalized to [`Money::SCALE`] fractional
/// digits with round-half-up.
///
/// Serializes as a decimal string (never a float), so values survive any
/// JSON round trip losslessly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Canonical fractional scale for stored amounts.
    pub const SCALE: u32 = 6;

    /// Zero monetary amount.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Construct from a raw decimal, applying the canonical rounding rule.
    #[inline]
    pub fn new(raw: Decimal) -> Self {
        Money(raw.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Construct from a whole number of currency units.
    #[inline]
    pub fn from_major(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Extract the underlying decimal when crossing a layer boundary.
    #[inline]
    pub fn raw(self) -> Decimal {
        self.0
    }

    /// Overflow-detecting addition.
    #[inline]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Overflow-detecting subtraction.
    #[inline]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Absolute value.
    #[inline]
    pub fn abs(self) -> Money {
        Money(self.0.abs())
    }

    /// `true` if strictly greater than zero.
    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// `true` if strictly less than zero.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// `true` if zero or greater.
    #[inline]
    pub fn is_non_negative(self) -> bool {
        self.0 >= Decimal::ZERO
    }
}

impl Add for Money {
    type Output = Money;
    #[inline]
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;
    #[inline]
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;
    #[inline]
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Money::new)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
