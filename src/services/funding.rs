use crate::math::conversion::convert_to_usd;
use crate::math::numbers::apply_factor;
use crate::math::rounding::mul_div_const;
use crate::services::liquidity::get_open_interest_usd;
use crate::state::{MarketInfo, Position};
use crate::types::{Factor, Seconds, TokenData, Usd};

/// Funding factor for one side over `period`.
///
/// Negative on the paying side. The receiving side's factor is scaled by
/// the open interest ratio so both sides move the same USD.
pub fn get_funding_factor_per_period(market: &MarketInfo, is_long: bool, period: Seconds) -> Factor {
    let funding = &market.funding;
    let long_oi = market.open_interest.long_interest_usd;
    let short_oi = market.open_interest.short_interest_usd;

    let paying = funding.funding_factor_per_second.saturating_mul(period);

    let (payer_oi, receiver_oi) = if funding.longs_pay_shorts {
        (long_oi, short_oi)
    } else {
        (short_oi, long_oi)
    };
    let receiving = if receiver_oi > 0 {
        mul_div_const(paying, payer_oi, receiver_oi)
    } else {
        0
    };

    if funding.longs_pay_shorts == is_long {
        -paying
    } else {
        receiving
    }
}

/// USD moved by one side's open interest over `period`; negative when paying.
pub fn get_funding_fee_rate_usd(market: &MarketInfo, is_long: bool, period: Seconds) -> Usd {
    let factor = get_funding_factor_per_period(market, is_long, period);
    apply_factor(get_open_interest_usd(market, is_long), factor)
}

/// Funding owed by `pos`, valued at the collateral min price.
pub fn get_pending_funding_fees_usd(pos: &Position, collateral: &TokenData) -> Usd {
    convert_to_usd(pos.funding_fee_amount, collateral.decimals, collateral.prices.min_price)
}

/// Funding the position can claim in both pool tokens.
pub fn get_claimable_funding_usd(market: &MarketInfo, pos: &Position) -> Usd {
    let long = &market.long_token;
    let short = &market.short_token;
    convert_to_usd(pos.claimable_long_token_amount, long.decimals, long.prices.min_price)
        + convert_to_usd(pos.claimable_short_token_amount, short.decimals, short.prices.min_price)
}

pub fn get_position_pending_fees_usd(pending_funding_fees_usd: Usd, pending_borrowing_fees_usd: Usd) -> Usd {
    pending_funding_fees_usd + pending_borrowing_fees_usd
}
