// src/services/pricing.rs

use crate::error::{Error, Result};
use crate::math::conversion::{convert_to_token_amount, get_should_use_max_price};
use crate::math::numbers::{BASIS_POINTS_DIVISOR, get_basis_points, pow10};
use crate::math::rounding::{mul_div_const, mul_div_round_up_magnitude};
use crate::services::price_impact::{cap_negative_position_impact, get_capped_position_impact_usd};
use crate::state::{MarketInfo, OrderType, TriggerThresholdType};
use crate::types::{Bps, Price, TokenAmount, TokenData, Usd};

/// Worst price an order accepts, and the impact it implies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcceptablePriceInfo {
    pub acceptable_price: Price,
    /// Signed distance from the index price; negative is worse for the
    /// trader.
    pub acceptable_price_delta_bps: Bps,
    pub price_impact_delta_usd: Usd,
    pub price_impact_delta_amount: TokenAmount,
    /// Negative impact clipped off by `max_position_impact.negative` on
    /// decrease.
    pub price_impact_diff_usd: Usd,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcceptablePriceByImpact {
    pub acceptable_price: Price,
    pub acceptable_price_delta_bps: Bps,
    pub price_delta: Price,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PriceImpactByAcceptablePrice {
    pub price_impact_delta_usd: Usd,
    pub price_delta: Price,
    pub acceptable_price_delta_bps: Bps,
}

/// Index price shifted so that executing `size_delta_usd` at it realizes
/// `price_impact_delta_usd`.
pub fn get_acceptable_price_by_price_impact(
    is_increase: bool,
    is_long: bool,
    index_price: Price,
    size_delta_usd: Usd,
    price_impact_delta_usd: Usd,
) -> AcceptablePriceByImpact {
    if size_delta_usd <= 0 || index_price == 0 {
        return AcceptablePriceByImpact {
            acceptable_price: index_price,
            ..Default::default()
        };
    }

    let flip = get_should_use_max_price(is_increase, is_long);
    let adjustment = if flip { -price_impact_delta_usd } else { price_impact_delta_usd };
    let acceptable_price = mul_div_const(index_price, size_delta_usd + adjustment, size_delta_usd);

    let price_delta = (index_price - acceptable_price) * if flip { 1 } else { -1 };

    AcceptablePriceByImpact {
        acceptable_price,
        acceptable_price_delta_bps: get_basis_points(price_delta, index_price, false),
        price_delta,
    }
}

/// Inverse of [`get_acceptable_price_by_price_impact`].
pub fn get_price_impact_by_acceptable_price(
    size_delta_usd: Usd,
    acceptable_price: Price,
    index_price: Price,
    is_long: bool,
    is_increase: bool,
) -> PriceImpactByAcceptablePrice {
    let flip = if is_increase { !is_long } else { is_long };
    let price_delta = (index_price - acceptable_price) * if flip { -1 } else { 1 };

    let price_impact_delta_usd = if acceptable_price != 0 {
        mul_div_const(size_delta_usd, price_delta, acceptable_price)
    } else {
        0
    };

    PriceImpactByAcceptablePrice {
        price_impact_delta_usd,
        price_delta,
        acceptable_price_delta_bps: get_basis_points(price_delta, index_price, false),
    }
}

/// Impact in index tokens: positive at max price rounded down, negative at
/// min price with magnitude rounded up.
fn price_impact_amount(index_token: &TokenData, impact_usd: Usd) -> Result<TokenAmount> {
    if impact_usd > 0 {
        return convert_to_token_amount(impact_usd, index_token.decimals, index_token.prices.max_price)
            .ok_or(Error::MissingPrice(index_token.address));
    }
    let price = index_token.prices.min_price;
    if price <= 0 {
        return Err(Error::MissingPrice(index_token.address));
    }
    mul_div_round_up_magnitude(impact_usd, pow10(index_token.decimals as u32), price)
}

/// Acceptable price of a market order, or of a limit/trigger order when
/// `max_negative_price_impact_bps` is given.
///
/// Decrease impact falls back to zero on an impossible open interest and its
/// negative side is clamped, reporting the clipped USD.
pub fn get_acceptable_price_info(
    market: &MarketInfo,
    is_increase: bool,
    is_long: bool,
    index_price: Price,
    size_delta_usd: Usd,
    max_negative_price_impact_bps: Option<Bps>,
) -> Result<AcceptablePriceInfo> {
    let mut info = AcceptablePriceInfo::default();
    if size_delta_usd <= 0 || index_price == 0 {
        return Ok(info);
    }

    if let Some(bps) = max_negative_price_impact_bps.filter(|b| *b > 0) {
        let flip = get_should_use_max_price(is_increase, is_long);
        let price_delta = mul_div_const(index_price, bps, BASIS_POINTS_DIVISOR);
        let price_delta = if flip { -price_delta } else { price_delta };

        info.acceptable_price = index_price - price_delta;
        info.acceptable_price_delta_bps = -bps;

        let impact = get_price_impact_by_acceptable_price(
            size_delta_usd,
            info.acceptable_price,
            index_price,
            is_long,
            is_increase,
        );
        info.price_impact_delta_usd = impact.price_impact_delta_usd;
        info.price_impact_delta_amount = price_impact_amount(&market.index_token, impact.price_impact_delta_usd)?;
        return Ok(info);
    }

    let signed_size = if is_increase { size_delta_usd } else { -size_delta_usd };
    let impact = get_capped_position_impact_usd(market, signed_size, is_long, !is_increase)?;

    let (impact, diff) = if is_increase {
        (impact, 0)
    } else {
        cap_negative_position_impact(market, size_delta_usd, impact)
    };
    info.price_impact_delta_usd = impact;
    info.price_impact_diff_usd = diff;
    info.price_impact_delta_amount = price_impact_amount(&market.index_token, impact)?;

    let by_impact = get_acceptable_price_by_price_impact(is_increase, is_long, index_price, size_delta_usd, impact);
    info.acceptable_price = by_impact.acceptable_price;
    info.acceptable_price_delta_bps = by_impact.acceptable_price_delta_bps;
    Ok(info)
}

/// Slippage allowance for a limit or trigger order: the current negative
/// impact in bps plus `buffer_bps`.
pub fn get_default_acceptable_price_impact_bps(
    is_increase: bool,
    is_long: bool,
    index_price: Price,
    size_delta_usd: Usd,
    price_impact_delta_usd: Usd,
    buffer_bps: Bps,
) -> Bps {
    if price_impact_delta_usd > 0 {
        return buffer_bps;
    }
    let base = get_acceptable_price_by_price_impact(
        is_increase,
        is_long,
        index_price,
        size_delta_usd,
        price_impact_delta_usd,
    );
    if base.acceptable_price_delta_bps < 0 {
        base.acceptable_price_delta_bps.abs() + buffer_bps
    } else {
        buffer_bps
    }
}

/// Direction the index price must cross for a trigger order to fire.
///
/// Limit increases buy the dip (long) or sell the rally (short); take-profit
/// fires in the position's favor, stop-loss against it.
pub fn get_trigger_threshold_type(order_type: OrderType, is_long: bool) -> Result<TriggerThresholdType> {
    use TriggerThresholdType::{Above, Below};
    match order_type {
        OrderType::LimitIncrease | OrderType::StopLossDecrease => Ok(if is_long { Below } else { Above }),
        OrderType::LimitDecrease => Ok(if is_long { Above } else { Below }),
        other => Err(Error::InvalidTriggerOrderType(other)),
    }
}
