use crate::error::{Error, Result};
use crate::math::conversion::{convert_to_usd, get_price_for_pnl};
use crate::math::numbers::{apply_factor, pow10};
use crate::math::rounding::{mul_div, mul_div_const};
use crate::services::liquidity::{get_open_interest_in_tokens, get_open_interest_usd, get_pool_usd_without_pnl};
use crate::state::MarketInfo;
use crate::types::{Price, PriceType, TokenAmount, TokenData, Usd};

/// Aggregate pnl of all open positions on one side.
///
/// `maximize` values the open interest at the price that favors traders.
pub fn get_pool_pnl(market: &MarketInfo, is_long: bool, maximize: bool) -> Usd {
    let price = get_price_for_pnl(&market.index_token.prices, is_long, maximize);
    let oi_tokens = get_open_interest_in_tokens(market, is_long);
    let oi_usd = get_open_interest_usd(market, is_long);
    let value = convert_to_usd(oi_tokens, market.index_token.decimals, price);
    if is_long { value - oi_usd } else { oi_usd - value }
}

/// Trader profit is capped at `max_pnl_factor_for_traders` of the pool;
/// losses pass through.
pub fn get_capped_pool_pnl(market: &MarketInfo, pool_usd: Usd, pool_pnl: Usd, is_long: bool) -> Usd {
    if pool_pnl < 0 {
        return pool_pnl;
    }
    let factor = if is_long {
        market.collateral.max_pnl_factor_for_traders_long
    } else {
        market.collateral.max_pnl_factor_for_traders_short
    };
    pool_pnl.min(apply_factor(pool_usd, factor))
}

/// `size_in_tokens` valued at `mark_price`.
pub fn get_position_value_usd(index_token: &TokenData, size_in_tokens: TokenAmount, mark_price: Price) -> Usd {
    convert_to_usd(size_in_tokens, index_token.decimals, mark_price)
}

/// Unrealized pnl of a position at `mark_price`.
///
/// Profit is scaled down by the same ratio the pool-wide profit is capped
/// by, so no position claims more than the pool can pay.
pub fn get_position_pnl_usd(
    market: &MarketInfo,
    size_in_usd: Usd,
    size_in_tokens: TokenAmount,
    mark_price: Price,
    is_long: bool,
) -> Usd {
    let value = get_position_value_usd(&market.index_token, size_in_tokens, mark_price);
    let total = if is_long { value - size_in_usd } else { size_in_usd - value };
    if total <= 0 {
        return total;
    }

    let pool_pnl = get_pool_pnl(market, is_long, true);
    let pool_usd = get_pool_usd_without_pnl(market, is_long, PriceType::Min);
    let capped = get_capped_pool_pnl(market, pool_usd, pool_pnl, is_long);

    if capped != pool_pnl && capped > 0 && pool_pnl > 0 {
        return mul_div_const(total, capped, pool_pnl);
    }
    total
}

/// Average entry price; `None` for a position without tokens.
pub fn get_entry_price(size_in_usd: Usd, size_in_tokens: TokenAmount, index_token: &TokenData) -> Option<Price> {
    if size_in_tokens <= 0 {
        return None;
    }
    mul_div(size_in_usd, pow10(index_token.decimals as u32), size_in_tokens).ok()
}

/// Share of `total_pnl_usd` realized by closing `size_delta_tokens`.
pub fn realized_pnl_usd(
    total_pnl_usd: Usd,
    size_delta_tokens: TokenAmount,
    pos_size_tokens: TokenAmount,
) -> Result<Usd> {
    if pos_size_tokens <= 0 {
        return Err(Error::DivisionByZero);
    }
    mul_div(total_pnl_usd, size_delta_tokens, pos_size_tokens)
}
