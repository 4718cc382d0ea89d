use primitive_types::U256;

use crate::error::{Error, Result};

/// |x| as U256.
pub(crate) fn u256_abs(x: i128) -> U256 {
    U256::from(x.unsigned_abs())
}

/// Signed magnitude back to i128, saturating at `i128::MAX` magnitude.
pub(crate) fn i128_from_u256_saturating(mag: U256, negative: bool) -> i128 {
    let max = U256::from(i128::MAX as u128);
    let v = if mag > max {
        i128::MAX
    } else {
        mag.low_u128() as i128
    };
    if negative { -v } else { v }
}

/// `a * b / denom`, truncating toward zero.
///
/// The product is carried in 256 bits so only the final quotient can
/// saturate.
pub fn mul_div(a: i128, b: i128, denom: i128) -> Result<i128> {
    if denom == 0 {
        return Err(Error::DivisionByZero);
    }
    let negative = (a < 0) ^ (b < 0) ^ (denom < 0);
    let q = u256_abs(a) * u256_abs(b) / u256_abs(denom);
    Ok(i128_from_u256_saturating(q, negative && !q.is_zero()))
}

/// Same as [`mul_div`] for a denominator that is known to be positive.
pub(crate) fn mul_div_const(a: i128, b: i128, denom: i128) -> i128 {
    debug_assert!(denom > 0);
    let negative = (a < 0) ^ (b < 0);
    let q = u256_abs(a) * u256_abs(b) / U256::from(denom as u128);
    i128_from_u256_saturating(q, negative && !q.is_zero())
}

/// `a * b / denom` with the magnitude rounded up, keeping the sign.
pub(crate) fn mul_div_round_up_magnitude(a: i128, b: i128, denom: i128) -> Result<i128> {
    if denom == 0 {
        return Err(Error::DivisionByZero);
    }
    let negative = (a < 0) ^ (b < 0) ^ (denom < 0);
    let n = u256_abs(a) * u256_abs(b);
    let d = u256_abs(denom);
    let (mut q, r) = n.div_mod(d);
    if !r.is_zero() {
        q += U256::one();
    }
    Ok(i128_from_u256_saturating(q, negative && !q.is_zero()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_truncates_toward_zero() {
        assert_eq!(mul_div(7, 1, 2).unwrap(), 3);
        assert_eq!(mul_div(-7, 1, 2).unwrap(), -3);
        assert_eq!(mul_div(7, -1, 2).unwrap(), -3);
        assert_eq!(mul_div(-7, -1, 2).unwrap(), 3);
    }

    #[test]
    fn mul_div_survives_wide_products() {
        // 1e30 * 1e30 / 1e30 overflows i128 in the middle but not at the end.
        let e30 = 10_i128.pow(30);
        assert_eq!(mul_div(e30, e30, e30).unwrap(), e30);
    }

    #[test]
    fn mul_div_saturates_instead_of_wrapping() {
        assert_eq!(mul_div(i128::MAX, 4, 2).unwrap(), i128::MAX);
        assert_eq!(mul_div(i128::MAX, -4, 2).unwrap(), -i128::MAX);
    }

    #[test]
    fn mul_div_rejects_zero_denominator() {
        assert!(matches!(mul_div(1, 1, 0), Err(Error::DivisionByZero)));
    }

    #[test]
    fn round_up_magnitude_keeps_sign() {
        assert_eq!(mul_div_round_up_magnitude(10, 1, 3).unwrap(), 4);
        assert_eq!(mul_div_round_up_magnitude(-10, 1, 3).unwrap(), -4);
        assert_eq!(mul_div_round_up_magnitude(9, 1, 3).unwrap(), 3);
        assert!(mul_div_round_up_magnitude(1, 1, 0).is_err());
    }
}
