// src/risk/liquidation.rs

use crate::math::conversion::get_is_equivalent_tokens;
use crate::math::numbers::{BASIS_POINTS_DIVISOR, PRECISION, apply_factor, pow10};
use crate::math::rounding::mul_div;
use crate::services::fees::get_position_fee;
use crate::services::funding::get_position_pending_fees_usd;
use crate::services::liquidity::get_open_interest_usd;
use crate::services::price_impact::get_price_impact_for_position;
use crate::state::MarketInfo;
use crate::types::{Bps, Factor, Price, ReferralInfo, TokenAmount, TokenData, Usd};

/// Inputs of [`get_liquidation_price`].
#[derive(Clone, Copy, Debug)]
pub struct LiquidationPriceParams<'a> {
    pub market: &'a MarketInfo,
    pub collateral_token: &'a TokenData,
    pub size_in_usd: Usd,
    pub size_in_tokens: TokenAmount,
    pub collateral_amount: TokenAmount,
    pub collateral_usd: Usd,
    pub pending_funding_fees_usd: Usd,
    pub pending_borrowing_fees_usd: Usd,
    pub min_collateral_usd: Usd,
    pub is_long: bool,
    /// Assume the worst impact allowed for liquidations instead of the
    /// current one.
    pub use_max_price_impact: bool,
    pub referral: Option<&'a ReferralInfo>,
}

/// Index price at which the position's remaining collateral falls to the
/// liquidation threshold.
///
/// When the collateral is the index token its value moves with the price, so
/// the collateral amount joins the size in the denominator. Otherwise the
/// collateral is fixed in USD. `None` for an empty position, a zero
/// denominator, or a non-positive result.
pub fn get_liquidation_price(p: &LiquidationPriceParams<'_>) -> Option<Price> {
    if p.size_in_usd <= 0 || p.size_in_tokens <= 0 {
        return None;
    }
    let market = p.market;
    let index = &market.index_token;

    let closing_fee_usd = get_position_fee(market, p.size_in_usd, false, p.referral, 0).position_fee_usd;
    let pending_fees_usd = get_position_pending_fees_usd(p.pending_funding_fees_usd, p.pending_borrowing_fees_usd);
    let total_fees_usd = pending_fees_usd + closing_fee_usd;

    let max_negative_impact_usd = -apply_factor(p.size_in_usd, market.max_position_impact.for_liquidations);
    let impact_usd = if p.use_max_price_impact {
        max_negative_impact_usd
    } else {
        // Positive impact is not counted on.
        get_price_impact_for_position(market, -p.size_in_usd, p.is_long, true)
            .unwrap_or(0)
            .max(max_negative_impact_usd)
            .min(0)
    };

    let liquidation_collateral_usd =
        apply_factor(p.size_in_usd, market.collateral.min_collateral_factor).max(p.min_collateral_usd);
    let unit = pow10(index.decimals as u32);

    let price = if get_is_equivalent_tokens(p.collateral_token, index) {
        if p.is_long {
            let numerator = p.size_in_usd + liquidation_collateral_usd - impact_usd + total_fees_usd;
            mul_div(numerator, unit, p.size_in_tokens + p.collateral_amount).ok()?
        } else {
            let numerator = p.size_in_usd - liquidation_collateral_usd + impact_usd - total_fees_usd;
            mul_div(numerator, unit, p.size_in_tokens - p.collateral_amount).ok()?
        }
    } else {
        let remaining_collateral_usd = p.collateral_usd + impact_usd - total_fees_usd;
        if p.is_long {
            let numerator = liquidation_collateral_usd - remaining_collateral_usd + p.size_in_usd;
            mul_div(numerator, unit, p.size_in_tokens).ok()?
        } else {
            let numerator = liquidation_collateral_usd - remaining_collateral_usd - p.size_in_usd;
            mul_div(numerator, unit, -p.size_in_tokens).ok()?
        }
    };

    (price > 0).then_some(price)
}

/// Collateral factor a position must keep after its side's open interest
/// moves by `open_interest_delta`.
///
/// Crowded sides need more collateral: the open interest multiplier scales
/// with the side's size, floored by the market's flat minimum.
pub fn get_min_collateral_factor_for_position(market: &MarketInfo, open_interest_delta: Usd, is_long: bool) -> Factor {
    let open_interest = get_open_interest_usd(market, is_long) + open_interest_delta;
    let multiplier = if is_long {
        market.collateral.min_collateral_factor_for_open_interest_long
    } else {
        market.collateral.min_collateral_factor_for_open_interest_short
    };
    apply_factor(open_interest, multiplier).max(market.collateral.min_collateral_factor)
}

/// Leverage, in bps, at which collateral sits exactly at
/// `min_collateral_factor`; `fallback_bps` for a zero factor.
pub fn get_max_allowed_leverage_by_min_collateral_factor(min_collateral_factor: Factor, fallback_bps: Bps) -> Bps {
    if min_collateral_factor <= 0 {
        return fallback_bps;
    }
    mul_div(PRECISION, BASIS_POINTS_DIVISOR, min_collateral_factor).unwrap_or(fallback_bps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ImpactFactors;
    use crate::testing::{MarketInfoBuilder, usd};

    fn market() -> MarketInfo {
        MarketInfoBuilder::eth_usdc()
            .min_collateral_factor(PRECISION / 100)
            .build()
    }

    fn params<'a>(market: &'a MarketInfo, collateral: &'a TokenData, is_long: bool) -> LiquidationPriceParams<'a> {
        // 10 ETH at 1000, backed by 1000 USD of collateral.
        LiquidationPriceParams {
            market,
            collateral_token: collateral,
            size_in_usd: usd(10_000),
            size_in_tokens: 10 * PRECISION,
            collateral_amount: 1_000_000_000,
            collateral_usd: usd(1_000),
            pending_funding_fees_usd: 0,
            pending_borrowing_fees_usd: 0,
            min_collateral_usd: 0,
            is_long,
            use_max_price_impact: false,
            referral: None,
        }
    }

    #[test]
    fn cross_margin_long_and_short() {
        let m = market();
        // Keep 1% of size (100 USD): 900 USD of loss over 10 ETH.
        assert_eq!(get_liquidation_price(&params(&m, &m.short_token, true)), Some(usd(910)));
        assert_eq!(get_liquidation_price(&params(&m, &m.short_token, false)), Some(usd(1_090)));
    }

    #[test]
    fn fees_and_min_collateral_move_it_closer() {
        let m = market();
        let mut p = params(&m, &m.short_token, true);
        p.pending_borrowing_fees_usd = usd(100);
        assert_eq!(get_liquidation_price(&p), Some(usd(920)));

        p.min_collateral_usd = usd(300);
        assert_eq!(get_liquidation_price(&p), Some(usd(940)));
    }

    #[test]
    fn collateral_in_index_token() {
        let m = market();
        let mut p = params(&m, &m.long_token, true);
        p.collateral_amount = PRECISION;
        // (10_000 + 100) / 11 ETH
        let price = get_liquidation_price(&p).unwrap();
        assert_eq!(price, mul_div(usd(10_100), PRECISION, 11 * PRECISION).unwrap());

        let mut short = p;
        short.is_long = false;
        // (10_000 - 100) / 9 ETH
        assert_eq!(get_liquidation_price(&short), Some(usd(1_100)));

        short.collateral_amount = short.size_in_tokens;
        assert_eq!(get_liquidation_price(&short), None);
    }

    #[test]
    fn max_impact_for_liquidations() {
        let m = MarketInfoBuilder::eth_usdc()
            .min_collateral_factor(PRECISION / 100)
            .max_position_impact(0, 0, PRECISION / 100)
            .position_impact(ImpactFactors {
                positive_factor: 0,
                negative_factor: 0,
                exponent_factor: PRECISION,
            })
            .build();
        let mut p = params(&m, &m.short_token, true);
        p.use_max_price_impact = true;
        // 100 USD of worst-case impact.
        assert_eq!(get_liquidation_price(&p), Some(usd(920)));
    }

    #[test]
    fn overcollateralized_or_empty_positions_have_none() {
        let m = market();
        let mut p = params(&m, &m.short_token, true);
        p.collateral_usd = usd(20_000);
        assert_eq!(get_liquidation_price(&p), None);

        let mut p = params(&m, &m.short_token, true);
        p.size_in_tokens = 0;
        assert_eq!(get_liquidation_price(&p), None);
    }

    #[test]
    fn min_collateral_factor_grows_with_open_interest() {
        let m = MarketInfoBuilder::eth_usdc()
            .open_interest_usd(usd(100_000), 0)
            .min_collateral_factor(PRECISION / 100)
            .min_collateral_factors_for_open_interest(PRECISION / 1_000_000, 0)
            .build();
        assert_eq!(get_min_collateral_factor_for_position(&m, 0, true), PRECISION / 10);
        assert_eq!(get_min_collateral_factor_for_position(&m, -usd(50_000), true), PRECISION / 20);
        assert_eq!(get_min_collateral_factor_for_position(&m, 0, false), PRECISION / 100);
    }

    #[test]
    fn max_allowed_leverage() {
        assert_eq!(get_max_allowed_leverage_by_min_collateral_factor(PRECISION / 100, 500_000), 1_000_000);
        assert_eq!(get_max_allowed_leverage_by_min_collateral_factor(0, 500_000), 500_000);
    }
}
