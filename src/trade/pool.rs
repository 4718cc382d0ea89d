// src/trade/pool.rs
//
// Liquidity provider flows: minting market tokens against collateral and
// burning them for it.

use crate::error::Result;
use crate::math::conversion::{convert_to_token_amount, convert_to_usd, get_mid_price};
use crate::math::numbers::apply_factor;
use crate::math::rounding::mul_div_const;
use crate::services::fees::get_swap_fee;
use crate::services::liquidity::{market_token_amount_to_usd, usd_to_market_token_amount};
use crate::services::price_impact::get_price_impact_for_swap;
use crate::state::MarketInfo;
use crate::types::{Factor, TokenAmount, TokenData, Usd};

/// Which side of a deposit the caller fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepositStrategy {
    /// Collateral amounts are given; market tokens follow.
    ByCollaterals,
    /// Market tokens are given; collateral follows, split by the given
    /// collateral amounts when both sides are included.
    ByMarketToken {
        include_long_token: bool,
        include_short_token: bool,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepositAmounts {
    pub market_token_amount: TokenAmount,
    pub market_token_usd: Usd,
    pub long_token_amount: TokenAmount,
    pub long_token_usd: Usd,
    pub short_token_amount: TokenAmount,
    pub short_token_usd: Usd,
    pub swap_fee_usd: Usd,
    pub ui_fee_usd: Usd,
    pub swap_price_impact_delta_usd: Usd,
}

/// Market tokens minted for a deposit, or the collateral a target mint
/// needs.
///
/// Collateral is valued at mid prices and market tokens at the max pool
/// value. A deposit that rebalances the pool earns positive swap impact.
pub fn get_deposit_amounts(
    market: &MarketInfo,
    market_token: &TokenData,
    long_token_amount: TokenAmount,
    short_token_amount: TokenAmount,
    market_token_amount: TokenAmount,
    strategy: DepositStrategy,
    ui_fee_factor: Factor,
) -> Result<DepositAmounts> {
    let long_token = &market.long_token;
    let short_token = &market.short_token;
    let long_price = get_mid_price(&long_token.prices);
    let short_price = get_mid_price(&short_token.prices);
    let pool_value = market.pool.pool_value_max;

    let mut v = DepositAmounts::default();

    match strategy {
        DepositStrategy::ByCollaterals => {
            if long_token_amount <= 0 && short_token_amount <= 0 {
                return Ok(v);
            }
            v.long_token_amount = long_token_amount;
            v.long_token_usd = convert_to_usd(long_token_amount, long_token.decimals, long_price);
            v.short_token_amount = short_token_amount;
            v.short_token_usd = convert_to_usd(short_token_amount, short_token.decimals, short_price);

            let total_usd = v.long_token_usd + v.short_token_usd;
            v.swap_price_impact_delta_usd =
                get_price_impact_for_swap(market, long_token, short_token, v.long_token_usd, v.short_token_usd, true)?;
            v.swap_fee_usd = get_swap_fee(market, total_usd, v.swap_price_impact_delta_usd > 0);
            v.ui_fee_usd = apply_factor(total_usd, ui_fee_factor);

            let net_usd = total_usd - v.swap_fee_usd - v.ui_fee_usd + v.swap_price_impact_delta_usd;
            v.market_token_amount = usd_to_market_token_amount(pool_value, market_token, net_usd);
            v.market_token_usd = market_token_amount_to_usd(pool_value, market_token, v.market_token_amount);
        }
        DepositStrategy::ByMarketToken {
            include_long_token,
            include_short_token,
        } => {
            if market_token_amount <= 0 {
                return Ok(v);
            }
            v.market_token_amount = market_token_amount;
            v.market_token_usd = market_token_amount_to_usd(pool_value, market_token, market_token_amount);

            let prev_long_usd = convert_to_usd(long_token_amount, long_token.decimals, long_price);
            let prev_short_usd = convert_to_usd(short_token_amount, short_token.decimals, short_price);
            let prev_sum_usd = prev_long_usd + prev_short_usd;

            if include_long_token && include_short_token && prev_sum_usd > 0 {
                v.long_token_usd = mul_div_const(v.market_token_usd, prev_long_usd, prev_sum_usd);
                v.short_token_usd = v.market_token_usd - v.long_token_usd;
            } else if include_long_token {
                v.long_token_usd = v.market_token_usd;
            } else if include_short_token {
                v.short_token_usd = v.market_token_usd;
            }

            v.swap_price_impact_delta_usd =
                get_price_impact_for_swap(market, long_token, short_token, v.long_token_usd, v.short_token_usd, true)?;
            v.swap_fee_usd = get_swap_fee(market, v.market_token_usd, v.swap_price_impact_delta_usd > 0);
            v.ui_fee_usd = apply_factor(v.market_token_usd, ui_fee_factor);

            // Gross up so the mint survives fees and impact.
            let total_usd = v.market_token_usd + v.swap_fee_usd + v.ui_fee_usd - v.swap_price_impact_delta_usd;
            if v.market_token_usd > 0 {
                v.long_token_usd = mul_div_const(total_usd, v.long_token_usd, v.market_token_usd);
                v.short_token_usd = mul_div_const(total_usd, v.short_token_usd, v.market_token_usd);
            }
            v.long_token_amount = convert_to_token_amount(v.long_token_usd, long_token.decimals, long_price).unwrap_or(0);
            v.short_token_amount =
                convert_to_token_amount(v.short_token_usd, short_token.decimals, short_price).unwrap_or(0);
        }
    }

    Ok(v)
}

/// Which side of a withdrawal the caller fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithdrawalStrategy {
    ByMarketToken,
    ByLongCollateral,
    ByShortCollateral,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WithdrawalAmounts {
    pub market_token_amount: TokenAmount,
    pub market_token_usd: Usd,
    pub long_token_amount: TokenAmount,
    pub long_token_usd: Usd,
    pub short_token_amount: TokenAmount,
    pub short_token_usd: Usd,
    pub swap_fee_usd: Usd,
    pub ui_fee_usd: Usd,
}

/// Collateral paid out for burning market tokens, or the burn a target
/// payout needs.
///
/// Payouts are split pro rata to the pools' USD at max prices; market
/// tokens are valued at the min pool value. Each side pays its own swap fee
/// and half the ui fee.
pub fn get_withdrawal_amounts(
    market: &MarketInfo,
    market_token: &TokenData,
    market_token_amount: TokenAmount,
    long_token_amount: TokenAmount,
    short_token_amount: TokenAmount,
    strategy: WithdrawalStrategy,
    ui_fee_factor: Factor,
) -> WithdrawalAmounts {
    let long_token = &market.long_token;
    let short_token = &market.short_token;
    let long_price = long_token.prices.max_price;
    let short_price = short_token.prices.max_price;
    let pool_value = market.pool.pool_value_min;

    let long_pool_usd = convert_to_usd(market.pool.long_pool_amount, long_token.decimals, long_price);
    let short_pool_usd = convert_to_usd(market.pool.short_pool_amount, short_token.decimals, short_price);
    let total_pool_usd = long_pool_usd + short_pool_usd;

    let mut v = WithdrawalAmounts::default();
    if total_pool_usd <= 0 {
        return v;
    }

    match strategy {
        WithdrawalStrategy::ByMarketToken => {
            v.market_token_amount = market_token_amount;
            v.market_token_usd = market_token_amount_to_usd(pool_value, market_token, market_token_amount);
            let long_usd = mul_div_const(v.market_token_usd, long_pool_usd, total_pool_usd);
            let short_usd = mul_div_const(v.market_token_usd, short_pool_usd, total_pool_usd);

            let long_swap_fee_usd = get_swap_fee(market, long_usd, false);
            let short_swap_fee_usd = get_swap_fee(market, short_usd, false);
            v.ui_fee_usd = apply_factor(v.market_token_usd, ui_fee_factor);
            v.swap_fee_usd = long_swap_fee_usd + short_swap_fee_usd;

            v.long_token_usd = long_usd - long_swap_fee_usd - v.ui_fee_usd / 2;
            v.short_token_usd = short_usd - short_swap_fee_usd - v.ui_fee_usd / 2;
            v.long_token_amount = convert_to_token_amount(v.long_token_usd, long_token.decimals, long_price).unwrap_or(0);
            v.short_token_amount =
                convert_to_token_amount(v.short_token_usd, short_token.decimals, short_price).unwrap_or(0);
        }
        WithdrawalStrategy::ByLongCollateral | WithdrawalStrategy::ByShortCollateral => {
            if strategy == WithdrawalStrategy::ByLongCollateral && long_pool_usd > 0 {
                v.long_token_amount = long_token_amount;
                v.long_token_usd = convert_to_usd(long_token_amount, long_token.decimals, long_price);
                v.short_token_usd = mul_div_const(v.long_token_usd, short_pool_usd, long_pool_usd);
                v.short_token_amount =
                    convert_to_token_amount(v.short_token_usd, short_token.decimals, short_price).unwrap_or(0);
            } else if strategy == WithdrawalStrategy::ByShortCollateral && short_pool_usd > 0 {
                v.short_token_amount = short_token_amount;
                v.short_token_usd = convert_to_usd(short_token_amount, short_token.decimals, short_price);
                v.long_token_usd = mul_div_const(v.short_token_usd, long_pool_usd, short_pool_usd);
                v.long_token_amount =
                    convert_to_token_amount(v.long_token_usd, long_token.decimals, long_price).unwrap_or(0);
            }

            let payout_usd = v.long_token_usd + v.short_token_usd;
            v.swap_fee_usd = get_swap_fee(market, v.long_token_usd, false) + get_swap_fee(market, v.short_token_usd, false);
            v.ui_fee_usd = apply_factor(payout_usd, ui_fee_factor);
            v.market_token_usd = payout_usd + v.swap_fee_usd + v.ui_fee_usd;
            v.market_token_amount = usd_to_market_token_amount(pool_value, market_token, v.market_token_usd);
        }
    }

    v
}
