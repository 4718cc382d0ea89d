// src/trade/increase.rs

use crate::error::Result;
use crate::math::conversion::{convert_to_usd, get_is_equivalent_tokens, get_mark_price, to_token_amount};
use crate::math::numbers::{BASIS_POINTS_DIVISOR, apply_factor, pow10};
use crate::math::position::get_leverage;
use crate::math::rounding::{mul_div_const, mul_div_round_up_magnitude};
use crate::services::fees::get_position_fee;
use crate::services::price_impact::get_price_impact_for_position;
use crate::services::pricing::{get_acceptable_price_info, get_default_acceptable_price_impact_bps, get_trigger_threshold_type};
use crate::state::{MarketInfo, OrderType, PositionInfo, TriggerThresholdType};
use crate::trade::routing::FindSwapPath;
use crate::trade::swap::{SwapPathStats, get_swap_amounts_by_from_value, get_swap_amounts_by_to_value};
use crate::types::{Bps, Factor, Price, ReferralInfo, TokenAmount, TokenData, Usd};

/// How the two inputs of an increase order relate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncreaseStrategy {
    /// Pay `initial_collateral_amount`; size is collateral after fees times
    /// `leverage`.
    LeverageByCollateral { leverage: Bps },
    /// Open `index_token_amount`; collateral is size over `leverage` plus
    /// fees.
    LeverageBySize { leverage: Bps },
    /// Both amounts are given and leverage follows from them.
    Independent,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IncreasePositionPrices {
    pub index_price: Price,
    pub initial_collateral_price: Price,
    pub collateral_price: Price,
    pub trigger_price: Option<Price>,
}

/// Execution prices of an increase: the trigger price for limit orders
/// (also for collateral equivalent to the index token), otherwise the mark
/// price and collateral min prices.
pub fn get_increase_position_prices(
    index_token: &TokenData,
    initial_collateral_token: &TokenData,
    collateral_token: &TokenData,
    is_long: bool,
    trigger_price: Option<Price>,
    limit_order_type: Option<OrderType>,
) -> IncreasePositionPrices {
    match trigger_price.filter(|p| *p > 0 && limit_order_type.is_some()) {
        Some(trigger) => {
            let price_of = |token: &TokenData| {
                if get_is_equivalent_tokens(index_token, token) {
                    trigger
                } else {
                    token.prices.min_price
                }
            };
            IncreasePositionPrices {
                index_price: trigger,
                initial_collateral_price: price_of(initial_collateral_token),
                collateral_price: price_of(collateral_token),
                trigger_price: Some(trigger),
            }
        }
        None => IncreasePositionPrices {
            index_price: get_mark_price(&index_token.prices, true, is_long),
            initial_collateral_price: initial_collateral_token.prices.min_price,
            collateral_price: collateral_token.prices.min_price,
            trigger_price,
        },
    }
}

/// Everything an increase order carries. Every figure starts at zero and
/// stays there when a price is missing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IncreasePositionAmounts {
    pub initial_collateral_amount: TokenAmount,
    pub initial_collateral_usd: Usd,
    pub collateral_delta_amount: TokenAmount,
    pub collateral_delta_usd: Usd,
    pub swap_path_stats: Option<SwapPathStats>,

    pub index_token_amount: TokenAmount,
    pub size_delta_usd: Usd,
    pub size_delta_in_tokens: TokenAmount,
    /// `None` when the collateral left after fees cannot back the size.
    pub estimated_leverage: Option<Bps>,

    pub index_price: Price,
    pub initial_collateral_price: Price,
    pub collateral_price: Price,
    pub trigger_price: Option<Price>,
    pub acceptable_price: Price,
    pub acceptable_price_delta_bps: Bps,
    pub recommended_acceptable_price_delta_bps: Bps,

    pub position_fee_usd: Usd,
    pub fee_discount_usd: Usd,
    pub ui_fee_usd: Usd,
    pub swap_ui_fee_usd: Usd,
    pub borrowing_fee_usd: Usd,
    pub funding_fee_usd: Usd,
    pub position_price_impact_delta_usd: Usd,

    pub limit_order_type: Option<OrderType>,
    pub trigger_threshold_type: Option<TriggerThresholdType>,
}

#[derive(Clone, Copy)]
pub struct IncreasePositionParams<'a> {
    pub market: &'a MarketInfo,
    pub initial_collateral_token: &'a TokenData,
    pub collateral_token: &'a TokenData,
    pub is_long: bool,
    pub initial_collateral_amount: TokenAmount,
    pub index_token_amount: TokenAmount,
    pub strategy: IncreaseStrategy,
    /// Existing position; its pending fees are settled by the increase.
    pub position: Option<&'a PositionInfo>,
    pub trigger_price: Option<Price>,
    /// Set for limit increases.
    pub limit_order_type: Option<OrderType>,
    pub fixed_acceptable_price_impact_bps: Option<Bps>,
    pub acceptable_price_impact_buffer_bps: Bps,
    pub find_swap_path: &'a dyn FindSwapPath,
    pub referral: Option<&'a ReferralInfo>,
    pub ui_fee_factor: Factor,
}

pub fn get_increase_position_amounts(p: &IncreasePositionParams<'_>) -> Result<IncreasePositionAmounts> {
    let market = p.market;
    let index_token = &market.index_token;

    let prices = get_increase_position_prices(
        index_token,
        p.initial_collateral_token,
        p.collateral_token,
        p.is_long,
        p.trigger_price,
        p.limit_order_type,
    );

    let mut v = IncreasePositionAmounts {
        index_price: prices.index_price,
        initial_collateral_price: prices.initial_collateral_price,
        collateral_price: prices.collateral_price,
        trigger_price: prices.trigger_price,
        borrowing_fee_usd: p.position.map_or(0, |pos| pos.pending_borrowing_fees_usd),
        funding_fee_usd: p.position.map_or(0, |pos| pos.pending_funding_fees_usd),
        limit_order_type: p.limit_order_type,
        ..Default::default()
    };

    if v.index_price <= 0 || v.initial_collateral_price <= 0 || v.collateral_price <= 0 {
        return Ok(v);
    }

    let pending_fees_usd = v.borrowing_fee_usd + v.funding_fee_usd;

    match p.strategy {
        IncreaseStrategy::LeverageByCollateral { leverage } => {
            if p.initial_collateral_amount <= 0 {
                return Ok(v);
            }
            v.estimated_leverage = Some(leverage);
            v.initial_collateral_amount = p.initial_collateral_amount;
            v.initial_collateral_usd = convert_to_usd(
                p.initial_collateral_amount,
                p.initial_collateral_token.decimals,
                v.initial_collateral_price,
            );

            let swap = get_swap_amounts_by_from_value(
                p.initial_collateral_token,
                p.collateral_token,
                p.initial_collateral_amount,
                None,
                false,
                p.find_swap_path,
                p.ui_fee_factor,
            )?;
            v.swap_ui_fee_usd = swap_ui_fee(swap.swap_path_stats.as_ref(), p.ui_fee_factor);
            v.swap_path_stats = swap.swap_path_stats;

            // Fees scale with size, so size is sized twice: once on the gross
            // collateral to pick the fee tier, then on what is left after fees.
            // The swap ui fee is already netted out of the swap output.
            let base_collateral_usd = convert_to_usd(swap.amount_out, p.collateral_token.decimals, v.collateral_price);
            let base_size_usd = mul_div_const(base_collateral_usd, leverage, BASIS_POINTS_DIVISOR);
            let base_impact = get_price_impact_for_position(market, base_size_usd, p.is_long, false)?;
            let base_fee = get_position_fee(market, base_size_usd, base_impact > 0, p.referral, p.ui_fee_factor);

            v.size_delta_usd = mul_div_const(
                base_collateral_usd - base_fee.position_fee_usd - pending_fees_usd - base_fee.ui_fee_usd,
                leverage,
                BASIS_POINTS_DIVISOR,
            );
            v.index_token_amount = to_token_amount(v.size_delta_usd, index_token, v.index_price)?;

            let fee = get_position_fee(market, v.size_delta_usd, base_impact > 0, p.referral, p.ui_fee_factor);
            v.position_fee_usd = fee.position_fee_usd;
            v.fee_discount_usd = fee.discount_usd;
            v.ui_fee_usd = fee.ui_fee_usd;

            v.collateral_delta_usd =
                base_collateral_usd - v.position_fee_usd - pending_fees_usd - v.ui_fee_usd;
            v.collateral_delta_amount = to_token_amount(v.collateral_delta_usd, p.collateral_token, v.collateral_price)?;
        }
        IncreaseStrategy::LeverageBySize { leverage } => {
            if leverage <= 0 {
                return Ok(v);
            }
            v.estimated_leverage = Some(leverage);
            v.index_token_amount = p.index_token_amount;
            v.size_delta_usd = convert_to_usd(p.index_token_amount, index_token.decimals, v.index_price);

            let impact = get_price_impact_for_position(market, v.size_delta_usd, p.is_long, false)?;
            let fee = get_position_fee(market, v.size_delta_usd, impact > 0, p.referral, p.ui_fee_factor);
            v.position_fee_usd = fee.position_fee_usd;
            v.fee_discount_usd = fee.discount_usd;
            v.ui_fee_usd = fee.ui_fee_usd;

            v.collateral_delta_usd = mul_div_const(v.size_delta_usd, BASIS_POINTS_DIVISOR, leverage);
            v.collateral_delta_amount = to_token_amount(v.collateral_delta_usd, p.collateral_token, v.collateral_price)?;

            let base_collateral_usd = v.collateral_delta_usd + v.position_fee_usd + pending_fees_usd + v.ui_fee_usd;
            let base_collateral_amount = to_token_amount(base_collateral_usd, p.collateral_token, v.collateral_price)?;

            let swap = get_swap_amounts_by_to_value(
                p.initial_collateral_token,
                p.collateral_token,
                base_collateral_amount,
                None,
                false,
                p.find_swap_path,
                p.ui_fee_factor,
            )?;
            v.swap_ui_fee_usd = swap_ui_fee(swap.swap_path_stats.as_ref(), p.ui_fee_factor);
            v.swap_path_stats = swap.swap_path_stats;
            v.initial_collateral_amount = swap.amount_in;
            v.initial_collateral_usd = convert_to_usd(
                v.initial_collateral_amount,
                p.initial_collateral_token.decimals,
                v.initial_collateral_price,
            );
        }
        IncreaseStrategy::Independent => {
            v.index_token_amount = p.index_token_amount;
            v.size_delta_usd = convert_to_usd(p.index_token_amount, index_token.decimals, v.index_price);
            v.initial_collateral_amount = p.initial_collateral_amount;
            v.initial_collateral_usd = convert_to_usd(
                p.initial_collateral_amount,
                p.initial_collateral_token.decimals,
                v.initial_collateral_price,
            );

            let impact = get_price_impact_for_position(market, v.size_delta_usd, p.is_long, false)?;
            let fee = get_position_fee(market, v.size_delta_usd, impact > 0, p.referral, p.ui_fee_factor);
            v.position_fee_usd = fee.position_fee_usd;
            v.fee_discount_usd = fee.discount_usd;
            v.ui_fee_usd = fee.ui_fee_usd;

            let swap = get_swap_amounts_by_from_value(
                p.initial_collateral_token,
                p.collateral_token,
                p.initial_collateral_amount,
                None,
                false,
                p.find_swap_path,
                p.ui_fee_factor,
            )?;
            v.swap_ui_fee_usd = swap_ui_fee(swap.swap_path_stats.as_ref(), p.ui_fee_factor);
            v.swap_path_stats = swap.swap_path_stats;

            let base_collateral_usd = convert_to_usd(swap.amount_out, p.collateral_token.decimals, v.collateral_price);
            // Fees beyond the paid collateral leave nothing to deposit.
            v.collateral_delta_usd =
                (base_collateral_usd - v.position_fee_usd - pending_fees_usd - v.ui_fee_usd).max(0);
            v.collateral_delta_amount = to_token_amount(v.collateral_delta_usd, p.collateral_token, v.collateral_price)?;
            v.estimated_leverage = get_leverage(v.size_delta_usd, v.collateral_delta_usd, None, 0, 0);
        }
    }

    let info = get_acceptable_price_info(market, true, p.is_long, v.index_price, v.size_delta_usd, None)?;
    v.position_price_impact_delta_usd = info.price_impact_delta_usd;
    v.acceptable_price = info.acceptable_price;
    v.acceptable_price_delta_bps = info.acceptable_price_delta_bps;

    if let Some(order_type) = p.limit_order_type {
        v.recommended_acceptable_price_delta_bps = get_default_acceptable_price_impact_bps(
            true,
            p.is_long,
            v.index_price,
            v.size_delta_usd,
            v.position_price_impact_delta_usd,
            p.acceptable_price_impact_buffer_bps,
        );
        let max_negative_bps = p
            .fixed_acceptable_price_impact_bps
            .unwrap_or(v.recommended_acceptable_price_delta_bps);
        let limit = get_acceptable_price_info(
            market,
            true,
            p.is_long,
            v.index_price,
            v.size_delta_usd,
            Some(max_negative_bps),
        )?;
        v.acceptable_price = limit.acceptable_price;
        v.acceptable_price_delta_bps = limit.acceptable_price_delta_bps;
        v.trigger_threshold_type = Some(get_trigger_threshold_type(order_type, p.is_long)?);
    }

    // Impact is settled in index tokens at the trigger price when there is one.
    let impact_price = |fallback: Price| p.trigger_price.filter(|t| *t > 0).unwrap_or(fallback);
    let impact_amount = if v.position_price_impact_delta_usd > 0 {
        to_token_amount(
            v.position_price_impact_delta_usd,
            index_token,
            impact_price(index_token.prices.max_price),
        )?
    } else {
        let price = impact_price(index_token.prices.min_price);
        if price <= 0 {
            0
        } else {
            mul_div_round_up_magnitude(v.position_price_impact_delta_usd, pow10(index_token.decimals as u32), price)?
        }
    };

    let base_tokens = to_token_amount(v.size_delta_usd, index_token, v.index_price)?;
    v.size_delta_in_tokens = if p.is_long {
        base_tokens + impact_amount
    } else {
        base_tokens - impact_amount
    };

    Ok(v)
}

fn swap_ui_fee(stats: Option<&SwapPathStats>, ui_fee_factor: Factor) -> Usd {
    stats.map_or(0, |s| apply_factor(s.total_swap_volume(), ui_fee_factor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::numbers::PRECISION;
    use crate::state::MarketsInfoData;
    use crate::testing::{MarketInfoBuilder, usd};
    use crate::trade::swap::get_swap_path_stats;

    fn no_swap(_: Usd, _: bool) -> Option<SwapPathStats> {
        None
    }

    fn market(fee_factor: Factor) -> MarketInfo {
        MarketInfoBuilder::eth_usdc()
            .pool_amounts(1_000 * PRECISION, 1_000_000_000_000)
            .position_fee_factors(fee_factor, fee_factor)
            .swap_fee_factors(PRECISION / 1_000, PRECISION / 1_000)
            .build()
    }

    fn params<'a>(m: &'a MarketInfo, strategy: IncreaseStrategy, finder: &'a dyn FindSwapPath) -> IncreasePositionParams<'a> {
        IncreasePositionParams {
            market: m,
            initial_collateral_token: &m.short_token,
            collateral_token: &m.short_token,
            is_long: true,
            initial_collateral_amount: 1_000_000_000,
            index_token_amount: 0,
            strategy,
            position: None,
            trigger_price: None,
            limit_order_type: None,
            fixed_acceptable_price_impact_bps: None,
            acceptable_price_impact_buffer_bps: 30,
            find_swap_path: finder,
            referral: None,
            ui_fee_factor: 0,
        }
    }

    #[test]
    fn market_prices_use_mark_and_min() {
        let m = MarketInfoBuilder::eth_usdc().build();
        let prices = get_increase_position_prices(&m.index_token, &m.short_token, &m.long_token, true, Some(usd(900)), None);
        assert_eq!(prices.index_price, usd(1_000));
        assert_eq!(prices.collateral_price, usd(1_000));

        let prices = get_increase_position_prices(
            &m.index_token,
            &m.short_token,
            &m.long_token,
            true,
            Some(usd(900)),
            Some(OrderType::LimitIncrease),
        );
        assert_eq!(prices.index_price, usd(900));
        assert_eq!(prices.initial_collateral_price, PRECISION);
        assert_eq!(prices.collateral_price, usd(900));
    }

    #[test]
    fn leverage_by_collateral_without_fees() {
        let m = market(0);
        let p = params(&m, IncreaseStrategy::LeverageByCollateral { leverage: 50_000 }, &no_swap);
        let a = get_increase_position_amounts(&p).unwrap();
        assert_eq!(a.size_delta_usd, usd(5_000));
        assert_eq!(a.collateral_delta_usd, usd(1_000));
        assert_eq!(a.collateral_delta_amount, 1_000_000_000);
        assert_eq!(a.size_delta_in_tokens, 5 * PRECISION);
        assert_eq!(a.estimated_leverage, Some(50_000));
        assert_eq!(a.acceptable_price, usd(1_000));
    }

    #[test]
    fn leverage_by_collateral_pays_fees_from_collateral() {
        // 0.1% position fee.
        let m = market(PRECISION / 1_000);
        let p = params(&m, IncreaseStrategy::LeverageByCollateral { leverage: 50_000 }, &no_swap);
        let a = get_increase_position_amounts(&p).unwrap();
        // Base fee on 5000 is 5; (1000 - 5) * 5 = 4975.
        assert_eq!(a.size_delta_usd, usd(4_975));
        assert_eq!(a.position_fee_usd, mul_div_const(usd(4_975), 1, 1_000));
        assert_eq!(a.collateral_delta_usd, usd(1_000) - a.position_fee_usd);
    }

    #[test]
    fn leverage_by_size_adds_fees_on_top() {
        let m = market(PRECISION / 1_000);
        let mut p = params(&m, IncreaseStrategy::LeverageBySize { leverage: 50_000 }, &no_swap);
        p.index_token_amount = 5 * PRECISION;
        let a = get_increase_position_amounts(&p).unwrap();
        assert_eq!(a.size_delta_usd, usd(5_000));
        assert_eq!(a.collateral_delta_usd, usd(1_000));
        assert_eq!(a.position_fee_usd, usd(5));
        assert_eq!(a.initial_collateral_amount, 1_005_000_000);
        assert_eq!(a.initial_collateral_usd, usd(1_005));
    }

    #[test]
    fn independent_computes_leverage() {
        let m = market(PRECISION / 1_000);
        let mut p = params(&m, IncreaseStrategy::Independent, &no_swap);
        p.index_token_amount = 2 * PRECISION;
        let a = get_increase_position_amounts(&p).unwrap();
        assert_eq!(a.size_delta_usd, usd(2_000));
        assert_eq!(a.collateral_delta_usd, usd(998));
        // 2000 / 998
        assert_eq!(a.estimated_leverage, Some(20_040));
    }

    #[test]
    fn independent_without_collateral_has_no_leverage() {
        let m = market(PRECISION / 1_000);
        let mut p = params(&m, IncreaseStrategy::Independent, &no_swap);
        p.initial_collateral_amount = 0;
        p.index_token_amount = 2 * PRECISION;
        let a = get_increase_position_amounts(&p).unwrap();
        assert_eq!(a.size_delta_usd, usd(2_000));
        assert_eq!(a.position_fee_usd, usd(2));
        assert_eq!(a.collateral_delta_usd, 0);
        assert_eq!(a.collateral_delta_amount, 0);
        assert_eq!(a.estimated_leverage, None);
    }

    #[test]
    fn collateral_is_swapped_first() {
        let m = market(0);
        let addr = m.market_token_address();
        let markets: MarketsInfoData = [(addr, m.clone())].into();
        let eth = m.long_token.address;
        let finder = |usd_in: Usd, _: bool| get_swap_path_stats(&markets, &[addr], &eth, usd_in, true).ok().flatten();

        let mut p = params(&m, IncreaseStrategy::LeverageByCollateral { leverage: 20_000 }, &finder);
        p.initial_collateral_token = &m.long_token;
        p.initial_collateral_amount = PRECISION;
        let a = get_increase_position_amounts(&p).unwrap();
        assert_eq!(a.initial_collateral_usd, usd(1_000));
        // 0.1% swap fee.
        assert_eq!(a.collateral_delta_usd, usd(999));
        assert_eq!(a.size_delta_usd, usd(1_998));
        assert_eq!(a.swap_path_stats.unwrap().swap_path, vec![addr]);
    }

    #[test]
    fn limit_increase_uses_trigger_price_and_buffer() {
        let m = market(0);
        let mut p = params(&m, IncreaseStrategy::LeverageByCollateral { leverage: 20_000 }, &no_swap);
        p.trigger_price = Some(usd(900));
        p.limit_order_type = Some(OrderType::LimitIncrease);
        let a = get_increase_position_amounts(&p).unwrap();
        assert_eq!(a.index_price, usd(900));
        assert_eq!(a.recommended_acceptable_price_delta_bps, 30);
        assert_eq!(a.acceptable_price, usd(900) + mul_div_const(usd(900), 30, 10_000));
        assert_eq!(a.acceptable_price_delta_bps, -30);
        assert_eq!(a.trigger_threshold_type, Some(TriggerThresholdType::Below));
        assert_eq!(a.size_delta_in_tokens, mul_div_const(usd(2_000), PRECISION, usd(900)));
    }

    #[test]
    fn missing_price_leaves_zeros() {
        let mut m = market(0);
        m.index_token.prices = crate::types::TokenPrices::flat(0);
        let p = params(&m, IncreaseStrategy::LeverageByCollateral { leverage: 20_000 }, &no_swap);
        let a = get_increase_position_amounts(&p).unwrap();
        assert_eq!(a.size_delta_usd, 0);
        assert_eq!(a.acceptable_price, 0);
    }
}
