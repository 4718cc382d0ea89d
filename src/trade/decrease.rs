// src/trade/decrease.rs

use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::math::conversion::{convert_to_token_amount, convert_to_usd, get_is_equivalent_tokens, get_mark_price};
use crate::math::numbers::{BASIS_POINTS_DIVISOR, apply_factor, get_basis_points};
use crate::math::pnl::{get_position_pnl_usd, realized_pnl_usd};
use crate::math::position::{get_leverage, size_delta_in_tokens};
use crate::math::rounding::{mul_div, mul_div_const};
use crate::risk::liquidation::get_min_collateral_factor_for_position;
use crate::risk::validation::{is_full_close, will_position_collateral_be_sufficient};
use crate::services::fees::{DecreaseFees, get_position_fee, get_total_fees_usd_for_decrease};
use crate::services::pricing::{get_acceptable_price_info, get_default_acceptable_price_impact_bps, get_trigger_threshold_type};
use crate::state::{MarketInfo, OrderType, PositionInfo, TriggerThresholdType};
use crate::trade::swap::get_swap_stats;
use crate::types::{Bps, Price, ReferralInfo, TokenAmount, TokenData, Usd};

/// Which token a decrease pays out in, relative to the side's pnl token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DecreasePositionSwapType {
    /// Pnl is already paid in the collateral token.
    #[default]
    NoSwap,
    SwapPnlTokenToCollateralToken,
    SwapCollateralTokenToPnlToken,
}

/// Longs realize pnl in the long token, shorts in the short token.
pub fn get_decrease_swap_type(
    pnl_token: &TokenData,
    collateral_token: &TokenData,
    receive_token: Option<&TokenData>,
) -> DecreasePositionSwapType {
    if get_is_equivalent_tokens(pnl_token, collateral_token) {
        DecreasePositionSwapType::NoSwap
    } else if receive_token.is_some_and(|t| get_is_equivalent_tokens(pnl_token, t)) {
        DecreasePositionSwapType::SwapCollateralTokenToPnlToken
    } else {
        DecreasePositionSwapType::SwapPnlTokenToCollateralToken
    }
}

/// Outcome of settling a cost against a decrease's payout and collateral.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollateralCostPayment {
    /// Profit left after paying.
    pub output_amount: TokenAmount,
    pub remaining_collateral_amount: TokenAmount,
    pub paid_output_amount: TokenAmount,
    pub paid_remaining_collateral_amount: TokenAmount,
}

/// Pays `cost_usd` in collateral tokens: out of `output_amount` first, then
/// out of `collateral_amount`. Nothing goes below zero; whatever neither can
/// cover is dropped.
pub fn pay_for_collateral_cost(
    cost_usd: Usd,
    collateral_token: &TokenData,
    collateral_amount: TokenAmount,
    output_amount: TokenAmount,
) -> CollateralCostPayment {
    let mut payment = CollateralCostPayment {
        output_amount,
        remaining_collateral_amount: collateral_amount,
        ..Default::default()
    };

    let mut remaining_cost = convert_to_token_amount(
        cost_usd,
        collateral_token.decimals,
        collateral_token.prices.min_price,
    )
    .unwrap_or(0);
    if remaining_cost <= 0 {
        return payment;
    }

    if payment.output_amount > 0 {
        let paid = payment.output_amount.min(remaining_cost);
        payment.output_amount -= paid;
        payment.paid_output_amount = paid;
        remaining_cost -= paid;
    }
    if remaining_cost == 0 {
        return payment;
    }

    let paid = payment.remaining_collateral_amount.max(0).min(remaining_cost);
    payment.remaining_collateral_amount -= paid;
    payment.paid_remaining_collateral_amount = paid;
    payment
}

/// Everything a decrease order carries. Every figure starts at zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecreasePositionAmounts {
    pub is_full_close: bool,
    pub size_delta_usd: Usd,
    pub size_delta_in_tokens: TokenAmount,
    pub collateral_delta_usd: Usd,
    pub collateral_delta_amount: TokenAmount,

    pub index_price: Price,
    pub collateral_price: Price,
    pub trigger_price: Option<Price>,
    pub acceptable_price: Price,
    pub acceptable_price_delta_bps: Bps,
    pub recommended_acceptable_price_delta_bps: Bps,

    pub estimated_pnl: Usd,
    pub estimated_pnl_percentage: Bps,
    pub realized_pnl: Usd,
    pub realized_pnl_percentage: Bps,

    pub position_fee_usd: Usd,
    pub fee_discount_usd: Usd,
    pub ui_fee_usd: Usd,
    pub swap_ui_fee_usd: Usd,
    pub borrowing_fee_usd: Usd,
    pub funding_fee_usd: Usd,
    pub swap_profit_fee_usd: Usd,
    pub position_price_impact_delta_usd: Usd,
    pub price_impact_diff_usd: Usd,

    /// Part of the costs covered by profit.
    pub payed_output_usd: Usd,
    /// Part of the costs covered by collateral.
    pub payed_remaining_collateral_usd: Usd,
    pub payed_remaining_collateral_amount: TokenAmount,

    pub receive_token_amount: TokenAmount,
    pub receive_usd: Usd,

    pub trigger_order_type: Option<OrderType>,
    pub trigger_threshold_type: Option<TriggerThresholdType>,
    pub decrease_swap_type: DecreasePositionSwapType,
}

#[derive(Clone, Copy, Debug)]
pub struct DecreasePositionParams<'a> {
    pub market: &'a MarketInfo,
    pub collateral_token: &'a TokenData,
    pub is_long: bool,
    pub position: Option<&'a PositionInfo>,
    pub close_size_usd: Usd,
    /// Withdraw collateral in proportion so leverage stays the same.
    pub keep_leverage: bool,
    pub trigger_price: Option<Price>,
    /// Set for take-profit and stop-loss orders.
    pub trigger_order_type: Option<OrderType>,
    pub fixed_acceptable_price_impact_bps: Option<Bps>,
    pub receive_token: Option<&'a TokenData>,
    pub referral: Option<&'a ReferralInfo>,
    pub config: &'a ProtocolConfig,
}

fn apply_acceptable_price(p: &DecreasePositionParams<'_>, v: &mut DecreasePositionAmounts) -> Result<()> {
    let info = get_acceptable_price_info(p.market, false, p.is_long, v.index_price, v.size_delta_usd, None)?;
    v.position_price_impact_delta_usd = info.price_impact_delta_usd;
    v.price_impact_diff_usd = info.price_impact_diff_usd;
    v.acceptable_price = info.acceptable_price;
    v.acceptable_price_delta_bps = info.acceptable_price_delta_bps;

    match v.trigger_order_type {
        None => {}
        // A stop loss must fill whatever the price.
        Some(OrderType::StopLossDecrease) => {
            v.acceptable_price = if p.is_long { 0 } else { Price::MAX };
        }
        Some(_) => {
            v.recommended_acceptable_price_delta_bps = get_default_acceptable_price_impact_bps(
                false,
                p.is_long,
                v.index_price,
                v.size_delta_usd,
                v.position_price_impact_delta_usd,
                p.config.acceptable_price_impact_buffer_bps,
            );
            let max_negative_bps = p
                .fixed_acceptable_price_impact_bps
                .unwrap_or(v.recommended_acceptable_price_delta_bps);
            let trigger = get_acceptable_price_info(
                p.market,
                false,
                p.is_long,
                v.index_price,
                v.size_delta_usd,
                Some(max_negative_bps),
            )?;
            v.acceptable_price = trigger.acceptable_price;
            v.acceptable_price_delta_bps = trigger.acceptable_price_delta_bps;
        }
    }
    Ok(())
}

fn decrease_fees(v: &DecreasePositionAmounts) -> DecreaseFees {
    DecreaseFees {
        position_fee_usd: v.position_fee_usd,
        borrowing_fee_usd: v.borrowing_fee_usd,
        funding_fee_usd: v.funding_fee_usd,
        swap_profit_fee_usd: v.swap_profit_fee_usd,
        swap_ui_fee_usd: v.swap_ui_fee_usd,
        ui_fee_usd: v.ui_fee_usd,
        pnl_usd: v.realized_pnl,
        price_impact_delta_usd: v.position_price_impact_delta_usd,
        price_impact_diff_usd: v.price_impact_diff_usd,
    }
}

/// Sizes a decrease of `close_size_usd` against `position`.
///
/// Costs (fees, realized loss, negative impact) are paid out of profit
/// first and collateral second. What is left of the profit, plus the
/// withdrawn collateral, is what the trader receives.
pub fn get_decrease_position_amounts(p: &DecreasePositionParams<'_>) -> Result<DecreasePositionAmounts> {
    let market = p.market;
    let index_token = &market.index_token;
    let collateral_token = p.collateral_token;

    let mut v = DecreasePositionAmounts {
        trigger_order_type: p.trigger_order_type,
        decrease_swap_type: get_decrease_swap_type(market.collateral_token(p.is_long), collateral_token, p.receive_token),
        ..Default::default()
    };

    let mark_price = get_mark_price(&index_token.prices, false, p.is_long);
    match p.trigger_order_type {
        Some(order_type) => {
            v.trigger_price = p.trigger_price;
            v.index_price = p.trigger_price.unwrap_or(mark_price);
            v.collateral_price = if get_is_equivalent_tokens(index_token, collateral_token) {
                v.index_price
            } else {
                collateral_token.prices.min_price
            };
            v.trigger_threshold_type = Some(get_trigger_threshold_type(order_type, p.is_long)?);
        }
        None => {
            v.index_price = mark_price;
            v.collateral_price = collateral_token.prices.min_price;
        }
    }

    if p.close_size_usd <= 0 {
        return Ok(v);
    }
    v.size_delta_usd = p.close_size_usd;

    let Some(info) = p.position.filter(|i| i.position.size_in_usd > 0 && i.position.size_in_tokens > 0) else {
        // No position to settle against: only the closing fees are known.
        apply_acceptable_price(p, &mut v)?;
        let fee = get_position_fee(
            market,
            v.size_delta_usd,
            v.position_price_impact_delta_usd > 0,
            p.referral,
            p.config.ui_fee_factor(),
        );
        v.position_fee_usd = fee.position_fee_usd;
        v.fee_discount_usd = fee.discount_usd;
        v.ui_fee_usd = fee.ui_fee_usd;
        v.payed_output_usd = get_total_fees_usd_for_decrease(&decrease_fees(&v));
        return Ok(v);
    };
    let position = &info.position;

    let collateral_usd = convert_to_usd(position.collateral_amount, collateral_token.decimals, v.collateral_price);
    v.estimated_pnl = get_position_pnl_usd(
        market,
        position.size_in_usd,
        position.size_in_tokens,
        v.index_price,
        p.is_long,
    );

    // Keeping leverage withdraws collateral only while what stays behind
    // still backs the remaining size.
    let mut keep_leverage = p.keep_leverage;
    let mut collateral_delta_usd = 0;
    if keep_leverage {
        collateral_delta_usd = mul_div_const(v.size_delta_usd, collateral_usd, position.size_in_usd);
        let collateral_delta_amount =
            convert_to_token_amount(collateral_delta_usd, collateral_token.decimals, v.collateral_price).unwrap_or(0);
        let estimated_realized_pnl = mul_div_const(v.estimated_pnl, v.size_delta_usd, position.size_in_usd);
        let sufficient = will_position_collateral_be_sufficient(
            position,
            collateral_token,
            collateral_delta_amount,
            estimated_realized_pnl,
            position.size_in_usd - v.size_delta_usd,
            get_min_collateral_factor_for_position(market, -v.size_delta_usd, p.is_long),
            p.config.min_collateral_usd,
        );
        if !sufficient {
            keep_leverage = false;
            collateral_delta_usd = 0;
        }
    }

    v.is_full_close = is_full_close(
        market,
        position,
        v.size_delta_usd,
        v.index_price,
        collateral_usd - collateral_delta_usd,
        p.config,
    );
    if v.is_full_close {
        v.size_delta_usd = position.size_in_usd;
    }
    v.size_delta_in_tokens = size_delta_in_tokens(position, v.size_delta_usd, v.is_full_close)?;

    v.realized_pnl = realized_pnl_usd(v.estimated_pnl, v.size_delta_in_tokens, position.size_in_tokens)?;
    if collateral_usd != 0 {
        v.realized_pnl_percentage = get_basis_points(v.realized_pnl, collateral_usd, false);
        v.estimated_pnl_percentage = get_basis_points(v.estimated_pnl, collateral_usd, false);
    }

    apply_acceptable_price(p, &mut v)?;

    let profit_usd = v.realized_pnl.max(0) + v.position_price_impact_delta_usd.max(0);

    let fee = get_position_fee(
        market,
        v.size_delta_usd,
        v.position_price_impact_delta_usd > 0,
        p.referral,
        p.config.ui_fee_factor(),
    );
    v.position_fee_usd = fee.position_fee_usd;
    v.fee_discount_usd = fee.discount_usd;
    v.ui_fee_usd = fee.ui_fee_usd;
    v.borrowing_fee_usd = info.pending_borrowing_fees_usd;
    v.funding_fee_usd = info.pending_funding_fees_usd;

    if profit_usd > 0 && v.decrease_swap_type == DecreasePositionSwapType::SwapPnlTokenToCollateralToken {
        let pnl_token = market.collateral_token(p.is_long);
        let swap = get_swap_stats(market, &pnl_token.address, &collateral_token.address, profit_usd, true)?;
        v.swap_profit_fee_usd = swap.swap_fee_usd - swap.price_impact_delta_usd;
        v.swap_ui_fee_usd = apply_factor(swap.usd_in, p.config.ui_fee_factor());
    }

    let total_fees_usd = get_total_fees_usd_for_decrease(&decrease_fees(&v));
    let profit_amount =
        convert_to_token_amount(profit_usd, collateral_token.decimals, v.collateral_price).unwrap_or(0);
    let payment = pay_for_collateral_cost(total_fees_usd, collateral_token, position.collateral_amount, profit_amount);

    v.payed_output_usd = convert_to_usd(payment.paid_output_amount, collateral_token.decimals, v.collateral_price);
    v.payed_remaining_collateral_amount = payment.paid_remaining_collateral_amount;
    v.payed_remaining_collateral_usd = convert_to_usd(
        payment.paid_remaining_collateral_amount,
        collateral_token.decimals,
        v.collateral_price,
    );

    if v.is_full_close {
        v.collateral_delta_usd = collateral_usd;
        v.collateral_delta_amount = position.collateral_amount;
        v.receive_token_amount = payment.output_amount + payment.remaining_collateral_amount;
    } else if keep_leverage && collateral_usd > 0 && payment.remaining_collateral_amount > 0 {
        // Withdraw down to the collateral the remaining size needs at the
        // leverage the position had before fees.
        let remaining_collateral_usd =
            convert_to_usd(payment.remaining_collateral_amount, collateral_token.decimals, v.collateral_price);
        let next_size_usd = position.size_in_usd - v.size_delta_usd;
        let leverage = get_leverage(
            position.size_in_usd,
            collateral_usd,
            None,
            info.pending_funding_fees_usd,
            info.pending_borrowing_fees_usd,
        );
        v.collateral_delta_usd = match leverage {
            Some(l) if l != 0 => (remaining_collateral_usd - mul_div(next_size_usd, BASIS_POINTS_DIVISOR, l)?).max(0),
            _ => 0,
        };
        v.collateral_delta_amount =
            convert_to_token_amount(v.collateral_delta_usd, collateral_token.decimals, v.collateral_price).unwrap_or(0);
        v.receive_token_amount = payment.output_amount + v.collateral_delta_amount;
    } else {
        v.receive_token_amount = payment.output_amount;
    }
    v.receive_usd = convert_to_usd(v.receive_token_amount, collateral_token.decimals, v.collateral_price);

    Ok(v)
}
