// src/services/price_impact.rs

use primitive_types::U256;

use crate::error::{Error, Result};
use crate::math::conversion::{convert_to_token_amount, convert_to_usd, get_mid_price};
use crate::math::numbers::{FLOAT_PRECISION_DECIMALS, PRECISION, USD_DECIMALS, apply_factor, pow10};
use crate::math::rounding::{i128_from_u256_saturating, mul_div_round_up_magnitude};
use crate::services::liquidity::{TokenPoolType, get_token_pool_type};
use crate::services::open_interest::OpenInterestParams;
use crate::state::{ImpactFactors, MarketInfo};
use crate::types::{TokenAmount, TokenData, Usd};

/// Signed price impact of moving from `params.current` to `params.next`.
///
/// A negative next side is rejected, or reported as zero impact with
/// `fallback_to_zero`.
pub fn get_price_impact_usd(
    params: &OpenInterestParams,
    factors: &ImpactFactors,
    fallback_to_zero: bool,
) -> Result<Usd> {
    let OpenInterestParams { current, next } = *params;

    if next.long_usd < 0 || next.short_usd < 0 {
        if fallback_to_zero {
            return Ok(0);
        }
        return Err(Error::NegativePoolAmount {
            next_long_usd: next.long_usd,
            next_short_usd: next.short_usd,
        });
    }

    let current_diff = (current.long_usd - current.short_usd).abs();
    let next_diff = (next.long_usd - next.short_usd).abs();

    let is_same_side_rebalance =
        (current.long_usd < current.short_usd) == (next.long_usd < next.short_usd);

    let impact = if is_same_side_rebalance {
        // Shrinking imbalance is rewarded, growing is penalized.
        let has_positive_impact = next_diff < current_diff;
        let factor = if has_positive_impact {
            factors.positive_factor
        } else {
            factors.negative_factor
        };
        let current_impact = apply_impact_factor(current_diff, factor, factors.exponent_factor);
        let next_impact = apply_impact_factor(next_diff, factor, factors.exponent_factor);
        let delta = (current_impact - next_impact).abs();
        if has_positive_impact { delta } else { -delta }
    } else {
        // Crossing zero: the closed part is rewarded, the reopened part penalized.
        let positive = apply_impact_factor(current_diff, factors.positive_factor, factors.exponent_factor);
        let negative = apply_impact_factor(next_diff, factors.negative_factor, factors.exponent_factor);
        let delta = (positive - negative).abs();
        if positive > negative { delta } else { -delta }
    };

    Ok(impact)
}

/// `factor * diff^exponent`, with the power taken in floating point.
///
/// The power is expanded digit by digit to `FLOAT_PRECISION_DECIMALS` and
/// rounded to nearest before the factor is applied in integer math.
pub fn apply_impact_factor(diff: Usd, factor: i128, exponent_factor: i128) -> Usd {
    if diff == 0 {
        return 0;
    }

    let powered = fixed_to_f64(diff).powf(fixed_to_f64(exponent_factor));

    let negative_factor = factor < 0;
    let scaled = f64_to_fixed_u256(powered, FLOAT_PRECISION_DECIMALS)
        .saturating_mul(U256::from(factor.unsigned_abs()))
        / U256::from(PRECISION as u128);

    // Back from the float scale to USD decimals.
    let shift = U256::from(pow10(FLOAT_PRECISION_DECIMALS - USD_DECIMALS as u32) as u128);
    let usd = scaled / shift;
    i128_from_u256_saturating(usd, negative_factor && !usd.is_zero())
}

/// `PRECISION`-scaled integer to f64, integer and fractional parts
/// converted separately so whole values stay exact.
fn fixed_to_f64(v: i128) -> f64 {
    let int = (v / PRECISION) as f64;
    let frac = (v % PRECISION) as f64 / PRECISION as f64;
    int + frac
}

/// Non-negative float to a `decimals`-scaled U256, rounded to nearest and
/// saturating at `U256::MAX`.
fn f64_to_fixed_u256(v: f64, decimals: u32) -> U256 {
    if v.is_nan() || v <= 0.0 {
        return U256::zero();
    }
    if v.is_infinite() {
        return U256::MAX;
    }

    let int = v.trunc();
    let mut frac = v - int;
    let mut out = f64_int_to_u256(int);
    let ten = U256::from(10u8);
    for _ in 0..decimals {
        out = out.saturating_mul(ten);
        if frac != 0.0 {
            frac *= 10.0;
            let digit = frac.trunc();
            out = out.saturating_add(U256::from(digit as u8));
            frac -= digit;
        }
    }
    if frac >= 0.5 {
        out = out.saturating_add(U256::one());
    }
    out
}

/// Whole non-negative float to U256.
fn f64_int_to_u256(v: f64) -> U256 {
    if v < u128::MAX as f64 {
        return U256::from(v as u128);
    }
    // v = mantissa * 2^exp with a 53-bit mantissa.
    let bits = v.to_bits();
    let exp = ((bits >> 52) & 0x7ff) as i32 - 1075;
    let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);
    if exp + 53 > 256 {
        return U256::MAX;
    }
    U256::from(mantissa) << (exp as usize)
}

/// Impact of changing position open interest by `size_delta_usd`.
///
/// When the market carries virtual inventory the more conservative of the
/// per-market and the virtual-inventory impact is used.
pub fn get_price_impact_for_position(
    market: &MarketInfo,
    size_delta_usd: Usd,
    is_long: bool,
    fallback_to_zero: bool,
) -> Result<Usd> {
    let params = OpenInterestParams::for_delta(
        market.open_interest.long_interest_usd,
        market.open_interest.short_interest_usd,
        size_delta_usd,
        is_long,
    );
    let impact = get_price_impact_usd(&params, &market.position_impact, fallback_to_zero)?;

    let virtual_inventory = market.virtual_inventory.virtual_inventory_for_positions;
    if virtual_inventory == 0 {
        return Ok(impact);
    }

    let params = OpenInterestParams::for_virtual_inventory(virtual_inventory, size_delta_usd, is_long);
    let virtual_impact = get_price_impact_usd(&params, &market.position_impact, fallback_to_zero)?;

    Ok(impact.min(virtual_impact))
}

/// Position impact with positive values bounded by the impact pool and by
/// `max_position_impact.positive` of the size.
pub fn get_capped_position_impact_usd(
    market: &MarketInfo,
    size_delta_usd: Usd,
    is_long: bool,
    fallback_to_zero: bool,
) -> Result<Usd> {
    let impact = get_price_impact_for_position(market, size_delta_usd, is_long, fallback_to_zero)?;
    if impact < 0 {
        return Ok(impact);
    }

    let index = &market.index_token;
    let max_by_pool = convert_to_usd(
        market.impact_pool.position_impact_pool_amount,
        index.decimals,
        index.prices.min_price,
    );
    let max_by_factor = apply_factor(size_delta_usd.abs(), market.max_position_impact.positive);

    Ok(impact.min(max_by_pool).min(max_by_factor))
}

/// Clamp a negative position impact to `max_position_impact.negative` of the
/// size.
///
/// Returns the clamped impact and the clipped-off USD.
pub fn cap_negative_position_impact(market: &MarketInfo, size_delta_usd: Usd, impact: Usd) -> (Usd, Usd) {
    if impact >= 0 {
        return (impact, 0);
    }
    let floor = -apply_factor(size_delta_usd.abs(), market.max_position_impact.negative);
    if impact < floor {
        (floor, floor - impact)
    } else {
        (impact, 0)
    }
}

/// Pool USD of both collaterals at mid price, before and after the deltas.
fn next_pool_params(
    long_token: &TokenData,
    short_token: &TokenData,
    long_amount: TokenAmount,
    short_amount: TokenAmount,
    long_delta_usd: Usd,
    short_delta_usd: Usd,
) -> OpenInterestParams {
    let long_usd = convert_to_usd(long_amount, long_token.decimals, get_mid_price(&long_token.prices));
    let short_usd = convert_to_usd(short_amount, short_token.decimals, get_mid_price(&short_token.prices));
    OpenInterestParams::for_pool_deltas(long_usd, short_usd, long_delta_usd, short_delta_usd)
}

/// Impact of moving `usd_delta_a` of `token_a` and `usd_delta_b` of
/// `token_b` through the market's pools.
///
/// With both virtual pools set, the smaller of the per-market and the
/// virtual-pool impact is used, whatever its sign.
pub fn get_price_impact_for_swap(
    market: &MarketInfo,
    token_a: &TokenData,
    token_b: &TokenData,
    usd_delta_a: Usd,
    usd_delta_b: Usd,
    fallback_to_zero: bool,
) -> Result<Usd> {
    let pool_a = get_token_pool_type(market, &token_a.address);
    let pool_b = get_token_pool_type(market, &token_b.address);

    let invalid = || Error::InvalidSwapTokens {
        market: market.market_token_address(),
        token_a: token_a.address,
        token_b: token_b.address,
    };
    let (Some(pool_a), Some(pool_b)) = (pool_a, pool_b) else {
        return Err(invalid());
    };
    if pool_a == pool_b && !market.is_same_collaterals() {
        return Err(invalid());
    }

    let ((long_token, long_delta), (short_token, short_delta)) = if pool_a == TokenPoolType::Long {
        ((token_a, usd_delta_a), (token_b, usd_delta_b))
    } else {
        ((token_b, usd_delta_b), (token_a, usd_delta_a))
    };

    let params = next_pool_params(
        long_token,
        short_token,
        market.pool.long_pool_amount,
        market.pool.short_pool_amount,
        long_delta,
        short_delta,
    );
    let impact = get_price_impact_usd(&params, &market.swap_impact, fallback_to_zero)?;

    let virtual_long = market.virtual_inventory.virtual_pool_amount_for_long_token;
    let virtual_short = market.virtual_inventory.virtual_pool_amount_for_short_token;
    if virtual_long <= 0 || virtual_short <= 0 {
        return Ok(impact);
    }

    let params = next_pool_params(
        long_token,
        short_token,
        virtual_long,
        virtual_short,
        long_delta,
        short_delta,
    );
    let virtual_impact = get_price_impact_usd(&params, &market.swap_impact, fallback_to_zero)?;
    Ok(impact.min(virtual_impact))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapImpactWithCap {
    /// Signed token amount moved to (+) or from (-) the swap impact pool.
    pub impact_delta_amount: TokenAmount,
    /// Positive impact the side's impact pool could not pay, in USD.
    pub capped_diff_usd: Usd,
}

/// Convert a swap impact into `token` units.
///
/// Positive impact rounds down and is capped by the side's swap impact pool;
/// negative impact rounds its magnitude up.
pub fn apply_swap_impact_with_cap(
    market: &MarketInfo,
    token: &TokenData,
    impact_usd: Usd,
) -> Result<SwapImpactWithCap> {
    let pool = get_token_pool_type(market, &token.address).ok_or(Error::NotMarketCollateral {
        market: market.market_token_address(),
        token: token.address,
    })?;

    if impact_usd > 0 {
        let price = token.prices.max_price;
        let mut amount =
            convert_to_token_amount(impact_usd, token.decimals, price).ok_or(Error::MissingPrice(token.address))?;
        let max_amount = if pool.is_long() {
            market.impact_pool.swap_impact_pool_amount_long
        } else {
            market.impact_pool.swap_impact_pool_amount_short
        };
        let mut capped_diff_usd = 0;
        if amount > max_amount {
            capped_diff_usd = convert_to_usd(amount - max_amount, token.decimals, price);
            amount = max_amount;
        }
        return Ok(SwapImpactWithCap {
            impact_delta_amount: amount,
            capped_diff_usd,
        });
    }

    let price = token.prices.min_price;
    if price <= 0 {
        return Err(Error::MissingPrice(token.address));
    }
    let amount = mul_div_round_up_magnitude(impact_usd, pow10(token.decimals as u32), price)?;
    Ok(SwapImpactWithCap {
        impact_delta_amount: amount,
        capped_diff_usd: 0,
    })
}
