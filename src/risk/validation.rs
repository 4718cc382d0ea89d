// src/risk/validation.rs

use crate::config::ProtocolConfig;
use crate::math::conversion::{convert_to_usd, get_is_equivalent_tokens};
use crate::math::numbers::apply_factor;
use crate::math::pnl::get_position_pnl_usd;
use crate::math::rounding::mul_div_const;
use crate::risk::liquidation::{get_max_allowed_leverage_by_min_collateral_factor, get_min_collateral_factor_for_position};
use crate::risk::next_position::NextPositionValues;
use crate::services::liquidity::{
    get_available_usd_liquidity_for_collateral, get_available_usd_liquidity_for_position, get_token_pool_type,
};
use crate::state::{MarketInfo, MarketsInfoData, Position, PositionInfo};
use crate::trade::decrease::DecreasePositionAmounts;
use crate::trade::increase::IncreasePositionAmounts;
use crate::trade::swap::{SwapAmounts, SwapPathStats};
use crate::types::{Address, Bps, Factor, Price, TokenAmount, TokenData, Usd};

/// Why an order, as sized, would be rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("amount is empty")]
    EmptyAmount,

    #[error("market {0} is disabled")]
    MarketDisabled(Address),

    #[error("no swap path from {from} to {to}")]
    NoSwapPath { from: Address, to: Address },

    #[error("insufficient liquidity: {available} available, {required} required")]
    InsufficientLiquidity { available: Usd, required: Usd },

    #[error("leverage {leverage} bps above max {max} bps")]
    MaxLeverageExceeded { leverage: Bps, max: Bps },

    #[error("collateral {collateral_usd} below min {min}")]
    MinCollateral { collateral_usd: Usd, min: Usd },

    #[error("position size {size_usd} below min {min}")]
    MinPositionSize { size_usd: Usd, min: Usd },

    #[error("close size {size_delta_usd} above position size {size_usd}")]
    CloseSizeExceeded { size_delta_usd: Usd, size_usd: Usd },

    #[error("position would be liquidated on entry")]
    InvalidLiquidationPrice,
}

/// Whether a decrease of `size_delta_usd` has to close the whole position.
///
/// Dust and empty positions always close. Otherwise only a realized loss can force it: when
/// the collateral left after the loss no longer covers the min collateral
/// factor, and either the remainder would fall below `min_collateral_usd`
/// or the remaining size below `min_position_size_usd`.
pub fn is_full_close(
    market: &MarketInfo,
    position: &Position,
    size_delta_usd: Usd,
    index_price: Price,
    remaining_collateral_usd: Usd,
    config: &ProtocolConfig,
) -> bool {
    let next_size_usd = position.size_in_usd - size_delta_usd;
    if next_size_usd < config.dust_usd || position.size_in_usd <= 0 {
        return true;
    }

    let is_long = position.key.is_long;
    let pnl = get_position_pnl_usd(market, position.size_in_usd, position.size_in_tokens, index_price, is_long);
    let realized_pnl = mul_div_const(pnl, size_delta_usd, position.size_in_usd);
    if realized_pnl >= 0 {
        return false;
    }
    let remaining_pnl = pnl - realized_pnl;
    let estimated_remaining_collateral_usd = remaining_collateral_usd + realized_pnl;

    let min_collateral_factor = get_min_collateral_factor_for_position(market, -size_delta_usd, is_long);
    if estimated_remaining_collateral_usd >= apply_factor(position.size_in_usd, min_collateral_factor) {
        return false;
    }

    estimated_remaining_collateral_usd + remaining_pnl < config.min_collateral_usd
        || next_size_usd < config.min_position_size_usd
}

/// Whether the collateral left after withdrawing `collateral_delta_amount`
/// and absorbing a realized loss still backs `next_size_usd`.
///
/// Withdrawing more than the position holds is never sufficient.
pub fn will_position_collateral_be_sufficient(
    position: &Position,
    collateral_token: &TokenData,
    collateral_delta_amount: TokenAmount,
    realized_pnl_usd: Usd,
    next_size_usd: Usd,
    min_collateral_factor: Factor,
    min_collateral_usd: Usd,
) -> bool {
    if collateral_delta_amount > position.collateral_amount {
        return false;
    }

    let mut remaining_collateral_usd = convert_to_usd(
        position.collateral_amount - collateral_delta_amount,
        collateral_token.decimals,
        collateral_token.prices.min_price,
    );
    if realized_pnl_usd < 0 {
        remaining_collateral_usd += realized_pnl_usd;
    }
    if remaining_collateral_usd < 0 || remaining_collateral_usd < min_collateral_usd {
        return false;
    }

    remaining_collateral_usd >= apply_factor(next_size_usd, min_collateral_factor)
}

fn check_swap_path(
    markets: &MarketsInfoData,
    from: &TokenData,
    to: &TokenData,
    stats: Option<&SwapPathStats>,
) -> Result<(), TradeError> {
    if get_is_equivalent_tokens(from, to) {
        return Ok(());
    }
    let Some(stats) = stats else {
        return Err(TradeError::NoSwapPath {
            from: from.address,
            to: to.address,
        });
    };

    let available = markets
        .get(&stats.target_market_address)
        .and_then(|market| {
            let side = get_token_pool_type(market, &stats.token_out_address)?;
            Some(get_available_usd_liquidity_for_collateral(market, side.is_long()))
        })
        .unwrap_or(0);
    if stats.is_out_liquidity() || available < stats.usd_out {
        return Err(TradeError::InsufficientLiquidity {
            available,
            required: stats.usd_out,
        });
    }
    Ok(())
}

fn check_leverage(market: &MarketInfo, next: &NextPositionValues, is_long: bool, config: &ProtocolConfig) -> Result<(), TradeError> {
    let Some(leverage) = next.next_leverage else {
        return Err(TradeError::MinCollateral {
            collateral_usd: next.next_collateral_usd,
            min: config.min_collateral_usd,
        });
    };
    let factor = get_min_collateral_factor_for_position(market, 0, is_long);
    let max = get_max_allowed_leverage_by_min_collateral_factor(factor, config.max_allowed_leverage_bps);
    if leverage > max {
        return Err(TradeError::MaxLeverageExceeded { leverage, max });
    }
    Ok(())
}

pub fn validate_swap(
    markets: &MarketsInfoData,
    from: &TokenData,
    to: &TokenData,
    amounts: &SwapAmounts,
) -> Result<(), TradeError> {
    if amounts.amount_in <= 0 || amounts.usd_in <= 0 {
        return Err(TradeError::EmptyAmount);
    }
    check_swap_path(markets, from, to, amounts.swap_path_stats.as_ref())
}

/// Checks an increase against market liquidity and the position it would
/// produce.
#[allow(clippy::too_many_arguments)]
pub fn validate_increase(
    markets: &MarketsInfoData,
    market: &MarketInfo,
    initial_collateral_token: &TokenData,
    collateral_token: &TokenData,
    is_long: bool,
    amounts: &IncreasePositionAmounts,
    next: &NextPositionValues,
    config: &ProtocolConfig,
) -> Result<(), TradeError> {
    if amounts.size_delta_usd <= 0 || amounts.initial_collateral_amount <= 0 {
        return Err(TradeError::EmptyAmount);
    }
    if market.is_disabled {
        return Err(TradeError::MarketDisabled(market.market_token_address()));
    }
    check_swap_path(
        markets,
        initial_collateral_token,
        collateral_token,
        amounts.swap_path_stats.as_ref(),
    )?;

    let available = get_available_usd_liquidity_for_position(market, is_long);
    if amounts.size_delta_usd > available {
        return Err(TradeError::InsufficientLiquidity {
            available,
            required: amounts.size_delta_usd,
        });
    }

    if next.next_collateral_usd < config.min_collateral_usd {
        return Err(TradeError::MinCollateral {
            collateral_usd: next.next_collateral_usd,
            min: config.min_collateral_usd,
        });
    }
    check_leverage(market, next, is_long, config)?;

    let liquidated_on_entry = match next.next_liq_price {
        Some(liq) if is_long => liq >= amounts.index_price,
        Some(liq) => liq <= amounts.index_price,
        None => false,
    };
    if liquidated_on_entry {
        return Err(TradeError::InvalidLiquidationPrice);
    }
    Ok(())
}

/// Checks a partial close leaves a position that may stay open. Full
/// closes only need a positive size within the position.
pub fn validate_decrease(
    market: &MarketInfo,
    position: &PositionInfo,
    amounts: &DecreasePositionAmounts,
    next: &NextPositionValues,
    config: &ProtocolConfig,
) -> Result<(), TradeError> {
    if amounts.size_delta_usd <= 0 {
        return Err(TradeError::EmptyAmount);
    }
    let size_usd = position.position.size_in_usd;
    if amounts.size_delta_usd > size_usd {
        return Err(TradeError::CloseSizeExceeded {
            size_delta_usd: amounts.size_delta_usd,
            size_usd,
        });
    }
    if amounts.is_full_close {
        return Ok(());
    }

    if next.next_size_usd < config.min_position_size_usd {
        return Err(TradeError::MinPositionSize {
            size_usd: next.next_size_usd,
            min: config.min_position_size_usd,
        });
    }
    if next.next_collateral_usd < config.min_collateral_usd {
        return Err(TradeError::MinCollateral {
            collateral_usd: next.next_collateral_usd,
            min: config.min_collateral_usd,
        });
    }
    check_leverage(market, next, position.is_long(), config)
}
