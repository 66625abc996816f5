//! Exact fixed-point token amounts
//!
//! Prices are compared in integer base units (wei for 18-decimal currencies).
//! Decimal strings coming from the URL or from user input are scaled into base
//! units without ever passing through floating point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{StorefrontError, StorefrontResult};

/// Decimals used by the native currency and by price-range filters
pub const NATIVE_DECIMALS: u32 = 18;

/// Largest supported decimals value; 10^38 still fits in a u128
const MAX_DECIMALS: u32 = 38;

/// Amount in integer base units of a currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Amount(u128);

impl Amount {
    /// Zero base units
    pub const ZERO: Self = Self(0);

    /// Wrap a raw base-unit value
    #[must_use]
    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    /// Raw base units
    #[must_use]
    pub const fn as_base_units(&self) -> u128 {
        self.0
    }

    /// Parse an integer base-unit string such as a wei amount from the read API
    pub fn from_raw(raw: &str) -> StorefrontResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(raw, "expected an unsigned integer"));
        }
        trimmed
            .parse::<u128>()
            .map(Self)
            .map_err(|e| invalid(raw, &e.to_string()))
    }

    /// Parse a decimal string (e.g. `"1.25"`) scaled by `decimals`
    ///
    /// Rejects negative numbers, exponents, and more fractional digits than
    /// the currency supports.
    pub fn parse_units(value: &str, decimals: u32) -> StorefrontResult<Self> {
        if decimals > MAX_DECIMALS {
            return Err(invalid(value, "unsupported decimals"));
        }
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(invalid(value, "empty amount"));
        }

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid(value, "no digits"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid(value, "expected digits and at most one decimal point"));
        }
        if fraction.len() > decimals as usize {
            return Err(invalid(value, "too many fractional digits"));
        }

        let scale = 10u128.pow(decimals);
        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .map_err(|e| invalid(value, &e.to_string()))?
        };
        let padded = format!("{fraction:0<width$}", width = decimals as usize);
        let fraction_units = if padded.is_empty() {
            0
        } else {
            padded
                .parse::<u128>()
                .map_err(|e| invalid(value, &e.to_string()))?
        };

        whole_units
            .checked_mul(scale)
            .and_then(|w| w.checked_add(fraction_units))
            .map(Self)
            .ok_or_else(|| invalid(value, "amount overflows"))
    }

    /// Render as a decimal string with trailing zeros trimmed
    #[must_use]
    pub fn format_units(&self, decimals: u32) -> String {
        if decimals == 0 {
            return self.0.to_string();
        }
        let scale = 10u128.pow(decimals.min(MAX_DECIMALS));
        let whole = self.0 / scale;
        let fraction = self.0 % scale;
        if fraction == 0 {
            return whole.to_string();
        }
        let digits = format!("{fraction:0>width$}", width = decimals as usize);
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_raw(s)
    }
}

fn invalid(value: &str, reason: &str) -> StorefrontError {
    StorefrontError::InvalidAmount {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Convert a fractional fee (e.g. `0.025`) into basis points
#[must_use]
pub fn fee_to_bps(fee: f64) -> u32 {
    if !fee.is_finite() || fee <= 0.0 {
        return 0;
    }
    // fees are fractions of one; the scaled value stays far below u32::MAX
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bps = (fee * 10_000.0).round() as u32;
    bps
}
