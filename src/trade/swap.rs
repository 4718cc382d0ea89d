// src/trade/swap.rs

use tracing::debug;

use crate::error::{Error, Result};
use crate::math::conversion::{convert_to_usd, get_amount_by_ratio, get_is_equivalent_tokens, to_token_amount};
use crate::math::numbers::{PRECISION, apply_factor, get_basis_points, pow10};
use crate::math::rounding::mul_div_const;
use crate::services::fees::{SwapFeeItem, SwapStep, get_swap_fee, get_total_swap_volume};
use crate::services::liquidity::{get_available_usd_liquidity_for_collateral, get_opposite_collateral, get_token_pool_type};
use crate::services::price_impact::{apply_swap_impact_with_cap, get_price_impact_for_swap};
use crate::state::{MarketInfo, MarketsInfoData, get_market_info};
use crate::trade::routing::FindSwapPath;
use crate::types::{Address, Factor, Price, TokenAmount, TokenData, Usd};

/// Outcome of one hop through one market.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwapStats {
    pub market_address: Address,
    pub token_in_address: Address,
    pub token_out_address: Address,
    pub swap_fee_usd: Usd,
    pub swap_fee_amount: TokenAmount,
    /// Impact actually paid or received after the impact pool caps.
    pub price_impact_delta_usd: Usd,
    pub amount_in: TokenAmount,
    pub amount_in_after_fees: TokenAmount,
    pub usd_in: Usd,
    pub amount_out: TokenAmount,
    pub usd_out: Usd,
    /// The output pool cannot pay `usd_out`.
    pub is_out_liquidity: bool,
}

impl SwapStep for SwapStats {
    fn usd_in(&self) -> Usd {
        self.usd_in
    }

    fn swap_fee_usd(&self) -> Usd {
        self.swap_fee_usd
    }

    fn fee_item(&self) -> SwapFeeItem {
        SwapFeeItem {
            market_address: self.market_address,
            token_in_address: self.token_in_address,
            token_out_address: self.token_out_address,
            delta_usd: -self.swap_fee_usd,
            bps: if self.usd_in != 0 {
                get_basis_points(-self.swap_fee_usd, self.usd_in, false)
            } else {
                0
            },
        }
    }
}

/// Swap `usd_in` worth of `token_in` into `token_out` through one market.
///
/// The pair must be the market's two collaterals. A swap whose impact cannot
/// be computed yields zero output flagged as out of liquidity rather than an
/// error.
pub fn get_swap_stats(
    market: &MarketInfo,
    token_in_address: &Address,
    token_out_address: &Address,
    usd_in: Usd,
    should_apply_price_impact: bool,
) -> Result<SwapStats> {
    let invalid = || Error::InvalidSwapTokens {
        market: market.market_token_address(),
        token_a: *token_in_address,
        token_b: *token_out_address,
    };
    let in_pool = get_token_pool_type(market, token_in_address).ok_or_else(invalid)?;
    let token_in = market.collateral_token(in_pool.is_long());
    let token_out = get_opposite_collateral(market, token_in_address)
        .filter(|t| t.address == *token_out_address)
        .ok_or_else(invalid)?;
    let out_pool = get_token_pool_type(market, token_out_address).ok_or_else(invalid)?;

    let price_in = token_in.prices.min_price;
    let price_out = token_out.prices.max_price;
    let amount_in = to_token_amount(usd_in, token_in, price_in)?;

    let mut stats = SwapStats {
        market_address: market.market_token_address(),
        token_in_address: token_in.address,
        token_out_address: token_out.address,
        amount_in,
        amount_in_after_fees: amount_in,
        usd_in,
        ..Default::default()
    };

    let impact = match get_price_impact_for_swap(market, token_in, token_out, usd_in, -usd_in, false) {
        Ok(impact) => impact,
        Err(err) => {
            debug!(market = %stats.market_address, error = %err, "swap impact unavailable");
            stats.is_out_liquidity = true;
            return Ok(stats);
        }
    };

    stats.swap_fee_amount = get_swap_fee(market, amount_in, impact > 0);
    stats.swap_fee_usd = get_swap_fee(market, usd_in, impact > 0);
    stats.amount_in_after_fees = amount_in - stats.swap_fee_amount;

    let capped_impact_usd = if impact > 0 {
        // Positive impact is paid from the output side's impact pool and
        // spills over onto the input side's pool.
        let out = apply_swap_impact_with_cap(market, token_out, impact)?;
        let mut capped = convert_to_usd(out.impact_delta_amount, token_out.decimals, price_out);
        if out.capped_diff_usd > 0 {
            let spill = apply_swap_impact_with_cap(market, token_in, out.capped_diff_usd)?;
            if spill.impact_delta_amount > 0 {
                capped += convert_to_usd(spill.impact_delta_amount, token_in.decimals, price_in);
            }
        }
        capped
    } else {
        let negative = apply_swap_impact_with_cap(market, token_in, impact)?;
        convert_to_usd(negative.impact_delta_amount, token_in.decimals, price_in)
    };
    stats.price_impact_delta_usd = capped_impact_usd;

    let mut usd_out = usd_in - stats.swap_fee_usd;
    if should_apply_price_impact {
        usd_out += capped_impact_usd;
    }
    stats.usd_out = usd_out.max(0);
    stats.amount_out = to_token_amount(stats.usd_out, token_out, price_out)?;

    stats.is_out_liquidity = get_available_usd_liquidity_for_collateral(market, out_pool.is_long()) < stats.usd_out;

    Ok(stats)
}

/// Outcome of a whole swap path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwapPathStats {
    pub swap_path: Vec<Address>,
    pub swap_steps: Vec<SwapStats>,
    pub token_in_address: Address,
    pub token_out_address: Address,
    pub target_market_address: Address,
    pub usd_out: Usd,
    pub amount_out: TokenAmount,
    pub total_swap_fee_usd: Usd,
    pub total_swap_price_impact_delta_usd: Usd,
    /// Impact minus fees over every hop.
    pub total_fees_delta_usd: Usd,
}

impl SwapPathStats {
    /// Some hop cannot pay out.
    pub fn is_out_liquidity(&self) -> bool {
        self.swap_steps.iter().any(|s| s.is_out_liquidity)
    }

    pub fn total_swap_volume(&self) -> Usd {
        get_total_swap_volume(&self.swap_steps)
    }
}

/// Chain [`get_swap_stats`] over `swap_path`; `None` for an empty path.
pub fn get_swap_path_stats(
    markets: &MarketsInfoData,
    swap_path: &[Address],
    initial_collateral_address: &Address,
    usd_in: Usd,
    should_apply_price_impact: bool,
) -> Result<Option<SwapPathStats>> {
    let Some(last_market) = swap_path.last() else {
        return Ok(None);
    };

    let mut steps = Vec::with_capacity(swap_path.len());
    let mut token_in = *initial_collateral_address;
    let mut usd = usd_in;
    let mut total_swap_fee_usd = 0;
    let mut total_swap_price_impact_delta_usd = 0;

    for market_address in swap_path {
        let market = get_market_info(markets, market_address)?;
        let token_out = get_opposite_collateral(market, &token_in)
            .ok_or(Error::NotMarketCollateral {
                market: *market_address,
                token: token_in,
            })?
            .address;
        let step = get_swap_stats(market, &token_in, &token_out, usd, should_apply_price_impact)?;
        token_in = step.token_out_address;
        usd = step.usd_out;
        total_swap_fee_usd += step.swap_fee_usd;
        total_swap_price_impact_delta_usd += step.price_impact_delta_usd;
        steps.push(step);
    }

    let amount_out = steps.last().map_or(0, |s| s.amount_out);

    Ok(Some(SwapPathStats {
        swap_path: swap_path.to_vec(),
        swap_steps: steps,
        token_in_address: *initial_collateral_address,
        token_out_address: token_in,
        target_market_address: *last_market,
        usd_out: usd,
        amount_out,
        total_swap_fee_usd,
        total_swap_price_impact_delta_usd,
        total_fees_delta_usd: total_swap_price_impact_delta_usd - total_swap_fee_usd,
    }))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapPathOutput {
    pub out_token_address: Address,
    /// Last market of the path, `None` for an empty path.
    pub out_market_address: Option<Address>,
}

/// Token a swap path ends in, without pricing it.
pub fn get_swap_path_output_addresses(
    markets: &MarketsInfoData,
    initial_collateral_address: &Address,
    swap_path: &[Address],
) -> Result<SwapPathOutput> {
    let mut token = *initial_collateral_address;
    for market_address in swap_path {
        let market = get_market_info(markets, market_address)?;
        token = get_opposite_collateral(market, &token)
            .ok_or(Error::NotMarketCollateral {
                market: *market_address,
                token,
            })?
            .address;
    }
    Ok(SwapPathOutput {
        out_token_address: token,
        out_market_address: swap_path.last().copied(),
    })
}

/// Price ratio between two tokens, expressed as units of the cheaper token
/// per unit of the dearer one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokensRatio {
    pub ratio: Factor,
    pub largest_token: Address,
    pub smallest_token: Address,
}

pub fn get_tokens_ratio_by_amounts(
    from_token: &TokenData,
    to_token: &TokenData,
    from_amount: TokenAmount,
    to_amount: TokenAmount,
) -> TokensRatio {
    let adjusted_from = mul_div_const(from_amount, PRECISION, pow10(from_token.decimals as u32));
    let adjusted_to = mul_div_const(to_amount, PRECISION, pow10(to_token.decimals as u32));

    let (smallest_token, largest_token, largest_amount, smallest_amount) = if adjusted_from > adjusted_to {
        (from_token, to_token, adjusted_from, adjusted_to)
    } else {
        (to_token, from_token, adjusted_to, adjusted_from)
    };

    let ratio = if smallest_amount > 0 {
        mul_div_const(largest_amount, PRECISION, smallest_amount)
    } else {
        0
    };

    TokensRatio {
        ratio,
        largest_token: largest_token.address,
        smallest_token: smallest_token.address,
    }
}

/// Amounts of a swap order, with the path that realizes them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwapAmounts {
    pub amount_in: TokenAmount,
    pub usd_in: Usd,
    pub amount_out: TokenAmount,
    pub usd_out: Usd,
    pub min_output_amount: TokenAmount,
    pub price_in: Price,
    pub price_out: Price,
    pub swap_path_stats: Option<SwapPathStats>,
}

/// Output of swapping `amount_in` of `token_in`.
///
/// Market swaps take the path's output less the ui fee. Limit swaps price
/// the output at `trigger_ratio` and then apply the path's fees and impact.
pub fn get_swap_amounts_by_from_value<F: FindSwapPath + ?Sized>(
    token_in: &TokenData,
    token_out: &TokenData,
    amount_in: TokenAmount,
    trigger_ratio: Option<&TokensRatio>,
    is_limit: bool,
    find_swap_path: &F,
    ui_fee_factor: Factor,
) -> Result<SwapAmounts> {
    let price_in = token_in.prices.min_price;
    let price_out = token_out.prices.max_price;
    let usd_in = convert_to_usd(amount_in, token_in.decimals, price_in);

    let defaults = SwapAmounts {
        amount_in,
        usd_in,
        price_in,
        price_out,
        ..Default::default()
    };
    if amount_in <= 0 {
        return Ok(defaults);
    }

    if get_is_equivalent_tokens(token_in, token_out) {
        return Ok(SwapAmounts {
            amount_out: amount_in,
            usd_out: usd_in,
            min_output_amount: amount_in,
            ..defaults
        });
    }

    let Some(stats) = find_swap_path.find_swap_path(usd_in, is_limit) else {
        return Ok(defaults);
    };

    let swap_ui_fee_usd = apply_factor(stats.total_swap_volume(), ui_fee_factor);
    let swap_ui_fee_amount = to_token_amount(swap_ui_fee_usd, token_out, price_out)?;

    let (mut amount_out, mut usd_out) = if is_limit {
        let Some(ratio) = trigger_ratio else {
            return Ok(defaults);
        };
        let raw_out = get_amount_by_ratio(
            token_in,
            token_out,
            amount_in,
            ratio.ratio,
            ratio.largest_token == token_out.address,
        );
        let usd_out = convert_to_usd(raw_out, token_out.decimals, price_out) - stats.total_swap_fee_usd
            - swap_ui_fee_usd
            + stats.total_swap_price_impact_delta_usd;
        (to_token_amount(usd_out, token_out, price_out)?, usd_out)
    } else {
        (stats.amount_out - swap_ui_fee_amount, stats.usd_out - swap_ui_fee_usd)
    };

    if amount_out < 0 {
        amount_out = 0;
        usd_out = 0;
    }

    Ok(SwapAmounts {
        amount_out,
        usd_out,
        min_output_amount: amount_out,
        swap_path_stats: Some(stats),
        ..defaults
    })
}

/// Input needed to receive `amount_out` of `token_out`.
///
/// Market swaps scale the input by how much the path loses on the way;
/// limit swaps price the input at `trigger_ratio` and add fees back.
pub fn get_swap_amounts_by_to_value<F: FindSwapPath + ?Sized>(
    token_in: &TokenData,
    token_out: &TokenData,
    amount_out: TokenAmount,
    trigger_ratio: Option<&TokensRatio>,
    is_limit: bool,
    find_swap_path: &F,
    ui_fee_factor: Factor,
) -> Result<SwapAmounts> {
    let price_in = token_in.prices.min_price;
    let price_out = token_out.prices.max_price;
    let usd_out = convert_to_usd(amount_out, token_out.decimals, price_out);
    let ui_fee_usd = apply_factor(usd_out, ui_fee_factor);

    let defaults = SwapAmounts {
        amount_out,
        usd_out,
        min_output_amount: amount_out,
        price_in,
        price_out,
        ..Default::default()
    };
    if amount_out <= 0 {
        return Ok(defaults);
    }

    if get_is_equivalent_tokens(token_in, token_out) {
        return Ok(SwapAmounts {
            amount_in: amount_out,
            usd_in: usd_out,
            ..defaults
        });
    }

    let base_usd_in = usd_out;
    let Some(stats) = find_swap_path.find_swap_path(base_usd_in, is_limit) else {
        return Ok(defaults);
    };

    let (mut amount_in, mut usd_in) = if is_limit {
        let Some(ratio) = trigger_ratio else {
            return Ok(defaults);
        };
        let raw_in = get_amount_by_ratio(
            token_out,
            token_in,
            amount_out,
            ratio.ratio,
            ratio.largest_token == token_in.address,
        );
        let usd_in = convert_to_usd(raw_in, token_in.decimals, price_in) + stats.total_swap_fee_usd + ui_fee_usd
            - stats.total_swap_price_impact_delta_usd;
        (to_token_amount(usd_in, token_in, price_in)?, usd_in)
    } else {
        let adjusted = if stats.usd_out > 0 {
            mul_div_const(base_usd_in, usd_out, stats.usd_out)
        } else {
            0
        };
        let usd_in = adjusted + ui_fee_usd;
        (to_token_amount(usd_in, token_in, price_in)?, usd_in)
    };

    if amount_in < 0 {
        amount_in = 0;
        usd_in = 0;
    }

    Ok(SwapAmounts {
        amount_in,
        usd_in,
        swap_path_stats: Some(stats),
        ..defaults
    })
}
