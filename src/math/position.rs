use crate::error::{Error, Result};
use crate::math::numbers::BASIS_POINTS_DIVISOR;
use crate::math::rounding::{mul_div, mul_div_round_up_magnitude};
use crate::state::Position;
use crate::types::{Bps, TokenAmount, Usd};

/// Index tokens closed by a `size_delta_usd` decrease.
/// - full close => all tokens
/// - partial:
///   - long => ceil(size_in_tokens * size_delta_usd / size_in_usd)
///   - short => floor(...)
pub fn size_delta_in_tokens(pos: &Position, size_delta_usd: Usd, is_full_close: bool) -> Result<TokenAmount> {
    if is_full_close || size_delta_usd == pos.size_in_usd {
        return Ok(pos.size_in_tokens);
    }
    if pos.size_in_usd <= 0 {
        return Err(Error::DivisionByZero);
    }
    if pos.size_in_tokens <= 0 || size_delta_usd <= 0 {
        return Ok(0);
    }

    let t = if pos.key.is_long {
        mul_div_round_up_magnitude(pos.size_in_tokens, size_delta_usd, pos.size_in_usd)?
    } else {
        mul_div(pos.size_in_tokens, size_delta_usd, pos.size_in_usd)?
    };
    Ok(t.clamp(0, pos.size_in_tokens))
}

/// Leverage in basis points over collateral net of pending fees.
///
/// `None` when nothing is left to back the size. Zero collateral is not
/// "zero leverage".
pub fn get_leverage(
    size_in_usd: Usd,
    collateral_usd: Usd,
    pnl: Option<Usd>,
    pending_funding_fees_usd: Usd,
    pending_borrowing_fees_usd: Usd,
) -> Option<Bps> {
    let remaining = collateral_usd + pnl.unwrap_or(0) - pending_funding_fees_usd - pending_borrowing_fees_usd;
    if remaining <= 0 {
        return None;
    }
    mul_div(size_in_usd, BASIS_POINTS_DIVISOR, remaining).ok()
}

/// USD the trader would walk away with after closing now.
pub fn get_position_net_value(
    collateral_usd: Usd,
    pnl: Usd,
    pending_fees_usd: Usd,
    closing_fee_usd: Usd,
    ui_fee_usd: Usd,
) -> Usd {
    collateral_usd - pending_fees_usd - closing_fee_usd - ui_fee_usd + pnl
}
