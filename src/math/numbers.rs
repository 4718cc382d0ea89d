// src/math/numbers.rs

use crate::math::rounding::mul_div_const;
use crate::types::{Bps, Factor};

/// Fixed-point scale for factors = 10^18.
pub const PRECISION: i128 = 1_000_000_000_000_000_000;

pub const USD_DECIMALS: u8 = 18;

pub const BASIS_POINTS_DIVISOR: i128 = 10_000;

/// Leverage is expressed in basis points (10x = 100_000).
pub const LEVERAGE_PRECISION: i128 = BASIS_POINTS_DIVISOR;

/// Scale used for the floating-point leg of impact math.
pub const FLOAT_PRECISION_DECIMALS: u32 = 30;

/// Remaining position sizes below 1 USD are dust.
pub const DUST_USD: i128 = PRECISION;

/// 10^decimals, saturating.
pub fn pow10(decimals: u32) -> i128 {
    10_i128.checked_pow(decimals).unwrap_or(i128::MAX)
}

/// `n * 10^decimals`, saturating.
pub fn expand_decimals(n: i128, decimals: u8) -> i128 {
    n.saturating_mul(pow10(decimals as u32))
}

/// `value * factor / PRECISION`.
pub fn apply_factor(value: i128, factor: Factor) -> i128 {
    mul_div_const(value, factor, PRECISION)
}

/// `numerator / denominator` in basis points.
///
/// With `round_up` a nonzero remainder moves the result one step away from
/// zero. A zero denominator yields 0.
pub fn get_basis_points(numerator: i128, denominator: i128, round_up: bool) -> Bps {
    if denominator == 0 {
        return 0;
    }
    let scaled = numerator.saturating_mul(BASIS_POINTS_DIVISOR);
    let q = scaled / denominator;
    if round_up && scaled % denominator != 0 {
        if (scaled < 0) ^ (denominator < 0) {
            q - 1
        } else {
            q + 1
        }
    } else {
        q
    }
}

/// Basis points as a `PRECISION` factor.
pub fn basis_points_to_float(bps: Bps) -> Factor {
    mul_div_const(bps, PRECISION, BASIS_POINTS_DIVISOR)
}

/// Rescale `value` from `from_decimals` to `to_decimals`, truncating.
pub fn adjust_for_decimals(value: i128, from_decimals: u8, to_decimals: u8) -> i128 {
    if to_decimals >= from_decimals {
        expand_decimals(value, to_decimals - from_decimals)
    } else {
        value / pow10((from_decimals - to_decimals) as u32)
    }
}
