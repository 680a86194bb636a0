//! # Money Module
//!
//! Integer currency amounts for the checkout screen.
//!
//! ## Why Integers?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Money Flow Through the Screen                        │
//! │                                                                         │
//! │  Product.price ──► CartLine.unit_price ──► CartLine.line_total          │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │                                        CartLedger.subtotal (untaxed)    │
//! │                                                                         │
//! │  Server TOTAL_AMT ──► Money::with_tax(10%) ──► confirmation amount      │
//! │                                                                         │
//! │  Yen has no minor unit, so every value is a whole number of yen.        │
//! │  Floats never touch an amount: 105 × 1.1 is computed as                 │
//! │  (105 × 11000 + 5000) / 10000 = 116.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so the 10% consumption tax is 1000 bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Money
// =============================================================================

/// An amount of yen.
///
/// Serialized as a bare integer so it matches the `PRICE` and `TOTAL_AMT`
/// columns of the transaction service.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole yen.
    ///
    /// ## Example
    /// ```rust
    /// use pos_core::money::Money;
    ///
    /// let price = Money::from_yen(150);
    /// assert_eq!(price.yen(), 150);
    /// ```
    #[inline]
    pub const fn from_yen(yen: i64) -> Self {
        Money(yen)
    }

    /// Returns the value in yen.
    #[inline]
    pub const fn yen(&self) -> i64 {
        self.0
    }

    /// Zero yen.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity, saturating at the `i64` bounds.
    ///
    /// ## Example
    /// ```rust
    /// use pos_core::money::Money;
    ///
    /// let line_total = Money::from_yen(150).multiply_quantity(3);
    /// assert_eq!(line_total.yen(), 450);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0.saturating_mul(qty as i64))
    }

    /// Returns the tax-inclusive amount, `round(self × (1 + rate))`.
    ///
    /// Rounds half away from zero, so `105 × 1.1 = 115.5` becomes 116 and a
    /// refund of `-105` becomes -116. The arithmetic is done in basis points
    /// on `i128` so there is no float error; a result outside `i64`
    /// saturates.
    ///
    /// ## Example
    /// ```rust
    /// use pos_core::money::{Money, TaxRate};
    ///
    /// let ten_percent = TaxRate::from_bps(1000);
    /// assert_eq!(Money::from_yen(100).with_tax(ten_percent).yen(), 110);
    /// assert_eq!(Money::from_yen(105).with_tax(ten_percent).yen(), 116);
    /// assert_eq!(Money::from_yen(0).with_tax(ten_percent).yen(), 0);
    /// ```
    pub fn with_tax(&self, rate: TaxRate) -> Money {
        let scaled = self.0 as i128 * (BPS_SCALE + rate.bps() as i128);
        let half = BPS_SCALE / 2;
        let rounded = if scaled >= 0 {
            (scaled + half) / BPS_SCALE
        } else {
            (scaled - half) / BPS_SCALE
        };
        Money(rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    /// Returns just the tax portion of [`Money::with_tax`].
    pub fn tax_amount(&self, rate: TaxRate) -> Money {
        self.with_tax(rate) - *self
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-¥{}", self.0.unsigned_abs())
        } else {
            write!(f, "¥{}", self.0)
        }
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, qty: u32) -> Money {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
