//! Fixed-point money arithmetic
//!
//! Prices and derived amounts are stored as scaled integers: a value `P` at
//! scale `D` represents `P / D` in quote currency. Different symbols carry
//! different scales (cents for equities, 8-decimal for crypto), so sums
//! across symbols must first be normalized to a common unit. That unit is
//! cents (scale 100) everywhere in this codebase.
//!
//! All intermediate products are widened to i128; the checked variants
//! return `None` instead of wrapping when a result would not fit in i64.

use crate::core::errors::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cents per quote-currency unit. Aggregate P&L and notional limits are
/// always expressed at this scale.
pub const CENTS_PER_UNIT: i64 = 100;

/// Integer price divisor. A stored price `P` represents `P / divisor` in
/// quote currency. All price fields of a record share one scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceScale(i64);

impl PriceScale {
    /// Equity convention: prices in cents.
    pub const CENTS: PriceScale = PriceScale(100);

    /// Crypto convention: 8 decimal places.
    pub const CRYPTO_8: PriceScale = PriceScale(100_000_000);

    /// Create a scale from an arbitrary positive divisor.
    pub fn new(divisor: i64) -> CoreResult<Self> {
        if divisor <= 0 {
            return Err(CoreError::InvalidInput(format!(
                "price scale divisor must be positive, got {divisor}"
            )));
        }
        Ok(Self(divisor))
    }

    #[inline(always)]
    pub const fn divisor(&self) -> i64 {
        self.0
    }
}

impl Default for PriceScale {
    fn default() -> Self {
        Self::CENTS
    }
}

impl fmt::Display for PriceScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1/{}", self.0)
    }
}

/// `a * b / divisor` with an i128 intermediate. Wraps only if the final
/// result exceeds i64, which the checked variant guards against.
#[inline(always)]
pub fn mul_div(a: i64, b: i64, divisor: i64) -> i64 {
    debug_assert!(divisor > 0);
    ((a as i128 * b as i128) / divisor as i128) as i64
}

/// Checked `a * b / divisor`. Returns `None` when the result does not fit.
#[inline(always)]
pub fn checked_mul_div(a: i64, b: i64, divisor: i64) -> Option<i64> {
    if divisor <= 0 {
        return None;
    }
    let wide = (a as i128 * b as i128) / divisor as i128;
    i64::try_from(wide).ok()
}

/// Normalize a scaled amount to cents: `amount * 100 / scale`.
#[inline(always)]
pub fn to_cents(amount: i64, scale: PriceScale) -> i64 {
    mul_div(amount, CENTS_PER_UNIT, scale.divisor())
}

/// Checked cents normalization.
#[inline(always)]
pub fn checked_to_cents(amount: i64, scale: PriceScale) -> Option<i64> {
    checked_mul_div(amount, CENTS_PER_UNIT, scale.divisor())
}

/// Notional value of `quantity` units at `price`: `price * qty / scale`,
/// in whole quote-currency units.
#[inline(always)]
pub fn notional(price: i64, quantity: i64, scale: PriceScale) -> i64 {
    mul_div(price, quantity, scale.divisor())
}

/// Notional value in cents. Single i128 pass so the intermediate
/// `price * qty * 100` cannot wrap.
#[inline(always)]
pub fn notional_cents(price: i64, quantity: i64, scale: PriceScale) -> i64 {
    ((price as i128 * quantity as i128 * CENTS_PER_UNIT as i128) / scale.divisor() as i128) as i64
}

/// Mid price from a two-sided quote, integer division.
#[inline(always)]
pub fn mid_price(bid: i64, ask: i64) -> i64 {
    (bid + ask) / 2
}

/// Decimal-string rendering at the scale's implied precision, as venues
/// expect on the wire: scale 100 renders two fractional digits, scale 1e8
/// renders eight.
pub fn format_decimal(amount: i64, scale: PriceScale) -> String {
    let divisor = scale.divisor();
    let digits = {
        let mut digits = 0;
        let mut d = divisor;
        while d > 1 {
            d /= 10;
            digits += 1;
        }
        digits
    };
    if digits == 0 {
        return amount.to_string();
    }
    let sign = if amount < 0 { "-" } else { "" };
    let magnitude = amount.unsigned_abs();
    let whole = magnitude / divisor as u64;
    let frac = magnitude % divisor as u64;
    format!("{sign}{whole}.{frac:0digits$}", digits = digits)
}
