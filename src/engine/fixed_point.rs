//! Q128 fixed-point helpers and tick-to-price conversion.

use crate::domain::Decimal;
use primitive_types::{U256, U512};
use rust_decimal::{Decimal as RustDecimal, MathematicalOps};
use thiserror::Error;

/// Number of fractional bits in Uniswap V3 fee-growth counters.
pub const Q128_RESOLUTION: usize = 128;

/// rust_decimal's largest supported scale.
const MAX_DECIMAL_SCALE: u32 = 28;

/// rust_decimal mantissas are 96 bits wide.
const MAX_MANTISSA_BITS: usize = 96;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixedPointError {
    #[error("invalid unsigned integer: {0}")]
    InvalidInteger(String),
    #[error("value does not fit in a decimal: {0}")]
    Overflow(String),
}

/// Parse a base-10 unsigned integer string (as served by the subgraph) into a U256.
pub fn parse_u256(s: &str) -> Result<U256, FixedPointError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(FixedPointError::InvalidInteger(s.to_string()));
    }
    U256::from_dec_str(s).map_err(|_| FixedPointError::InvalidInteger(s.to_string()))
}

/// Multiply a Q128 value by an integer and drop the 128 fractional bits.
///
/// The product is formed in 512 bits, so the result is exactly `floor(x * y / 2^128)`.
pub fn mul_shift_q128(x_q128: U256, y: U256) -> U512 {
    x_q128.full_mul(y) >> Q128_RESOLUTION
}

/// Scale a raw integer token amount by `10^-decimals`.
pub fn raw_to_token_amount(raw: U512, decimals: u8) -> Result<Decimal, FixedPointError> {
    let mut raw = raw;
    let mut scale = u32::from(decimals);
    if scale > MAX_DECIMAL_SCALE {
        let excess = scale - MAX_DECIMAL_SCALE;
        raw /= U512::exp10(excess as usize);
        scale = MAX_DECIMAL_SCALE;
    }

    if raw.bits() > MAX_MANTISSA_BITS {
        return Err(FixedPointError::Overflow(raw.to_string()));
    }
    let mantissa = raw.low_u128() as i128;

    RustDecimal::try_from_i128_with_scale(mantissa, scale)
        .map(Decimal::new)
        .map_err(|_| FixedPointError::Overflow(raw.to_string()))
}

/// Price of token0 denominated in token1 at `tick`: `1.0001^tick * 10^(decimals0 - decimals1)`.
///
/// Returns None when the result leaves rust_decimal's range.
pub fn tick_to_price(tick: i32, decimals0: u8, decimals1: u8) -> Option<Decimal> {
    let base = RustDecimal::new(10001, 4);
    let raw = base.checked_powi(i64::from(tick))?;

    let diff = i64::from(decimals0) - i64::from(decimals1);
    let adjustment = RustDecimal::TEN.checked_powi(diff)?;

    raw.checked_mul(adjustment).map(Decimal::new)
}
