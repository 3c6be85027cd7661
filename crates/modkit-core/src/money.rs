//! # Money Module
//!
//! Integer cents for every price, modifier and deposit in the storefront.
//!
//! ## Where Cents Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product.base_price_cents ──┐                                          │
//! │  Variant.price_modifier ────┴──► display price ──► cart line snapshot  │
//! │                                                                         │
//! │  Product.presale_deposit_price_cents ──┐                               │
//! │  Variant.presale_deposit_modifier ─────┴──► deposit amount             │
//! │                                                                         │
//! │  Order.total_cents ──► refund amount sent to the payment processor     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Modifiers may be negative (a cheaper colourway), so the type is signed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

/// A monetary value in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use modkit_core::money::Money;
    ///
    /// let deposit = Money::from_cents(25000);
    /// assert_eq!(deposit.cents(), 25000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Applies an optional variant modifier to a base amount.
    ///
    /// ## Example
    /// ```rust
    /// use modkit_core::money::Money;
    ///
    /// let base = Money::from_cents(25000);
    /// assert_eq!(base.with_modifier(Some(5000)).cents(), 30000);
    /// assert_eq!(base.with_modifier(None).cents(), 25000);
    /// ```
    #[inline]
    pub fn with_modifier(self, modifier_cents: Option<i64>) -> Self {
        Money(self.0 + modifier_cents.unwrap_or(0))
    }

    /// Multiplies a unit price by a line quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Debug-friendly rendering. The storefront formats prices for locale itself.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
