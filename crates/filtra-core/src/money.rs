//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A 10% discount on $119.99 must come out the same on the checkout       │
//! │  preview and on payment capture, byte for byte. Float drift breaks      │
//! │  that guarantee; integer cents cannot.                                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    11999 cents × 1000 bps = 1199.9 → 1200 cents, every time            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All settlement math in this workspace happens in `Money` (USD cents).
//! Display currencies are derived in [`crate::currency`] and never flow back
//! into settlement amounts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest base-currency unit (cents, USD).
///
/// ## Design Decisions
/// - **i64 (signed)**: intermediate results (subtotal − discount) may dip
///   below zero before being floored
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support for snapshot persistence
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole dollars.
    #[inline]
    pub const fn from_dollars(dollars: i64) -> Self {
        Money(dollars * 100)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is strictly positive.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Returns the larger of two amounts.
    #[inline]
    pub fn max(self, other: Money) -> Money {
        Money(self.0.max(other.0))
    }

    /// Clamps a (possibly negative) intermediate result to zero.
    ///
    /// A cart-wide discount plus a gift card may exceed what the order owes;
    /// chargeable totals never go below zero.
    #[inline]
    pub const fn floor_zero(self) -> Money {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Applies a basis-point fraction with half-up rounding.
    ///
    /// ## Rounding
    /// Uses `(cents × bps + 5000) / 10000` in i128 so large carts cannot
    /// overflow and 0.5 cents always rounds away from zero toward the
    /// customer-visible convention used on receipts.
    ///
    /// ## Example
    /// ```rust
    /// use filtra_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(12_000); // $120.00
    /// assert_eq!(subtotal.percent_bps(1_000).cents(), 1_200); // 10%
    ///
    /// let odd = Money::from_cents(1_000); // $10.00
    /// assert_eq!(odd.percent_bps(825).cents(), 83); // 8.25% → $0.83
    /// ```
    pub fn percent_bps(&self, bps: u32) -> Money {
        let cents = (self.0 as i128 * bps as i128 + 5_000) / 10_000;
        Money(cents as i64)
    }

    /// Multiplies money by a line quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// For debugging and log output; receipt formatting lives with the callers.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
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

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
