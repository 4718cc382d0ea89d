use crate::math::numbers::apply_factor;
use crate::services::liquidity::get_reserved_usd;
use crate::state::{MarketInfo, Position};
use crate::types::{Factor, Seconds, Usd};

fn factor_per_second(market: &MarketInfo, is_long: bool) -> Factor {
    if is_long {
        market.borrowing.borrowing_factor_per_second_long
    } else {
        market.borrowing.borrowing_factor_per_second_short
    }
}

fn cumulative_factor(market: &MarketInfo, is_long: bool) -> Factor {
    if is_long {
        market.borrowing.cumulative_borrowing_factor_long
    } else {
        market.borrowing.cumulative_borrowing_factor_short
    }
}

/// Borrowing factor accrued by one side over `period`.
pub fn get_borrowing_factor_per_period(market: &MarketInfo, is_long: bool, period: Seconds) -> Factor {
    factor_per_second(market, is_long).saturating_mul(period)
}

/// USD the side's reserved open interest pays over `period`.
pub fn get_borrowing_fee_rate_usd(market: &MarketInfo, is_long: bool, period: Seconds) -> Usd {
    let factor = get_borrowing_factor_per_period(market, is_long, period);
    apply_factor(get_reserved_usd(market, is_long), factor)
}

/// Borrowing fees owed by `pos`: the carried amount plus what accrued since
/// its cumulative factor snapshot.
///
/// The market factor only grows; a snapshot ahead of it accrues nothing.
pub fn get_pending_borrowing_fees_usd(market: &MarketInfo, pos: &Position) -> Usd {
    let diff = (cumulative_factor(market, pos.key.is_long) - pos.borrowing_factor).max(0);
    pos.pending_borrowing_fees_usd + apply_factor(pos.size_in_usd, diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::numbers::PRECISION;
    use crate::testing::{MarketInfoBuilder, PositionBuilder, usd};

    #[test]
    fn factor_scales_with_period() {
        let m = MarketInfoBuilder::eth_usdc()
            .borrowing_factors_per_second(10, 20)
            .build();
        assert_eq!(get_borrowing_factor_per_period(&m, true, 3_600), 36_000);
        assert_eq!(get_borrowing_factor_per_period(&m, false, 3_600), 72_000);
    }

    #[test]
    fn fee_rate_applies_to_reserved_usd() {
        let mut m = MarketInfoBuilder::eth_usdc()
            .borrowing_factors_per_second(PRECISION / 1_000_000, 0)
            .build();
        m.open_interest.long_interest_in_tokens = 10 * PRECISION;

        // 10 ETH at 1000 reserved, 1e-6 per second over 100 seconds.
        assert_eq!(get_borrowing_fee_rate_usd(&m, true, 100), usd(1));
        assert_eq!(get_borrowing_fee_rate_usd(&m, false, 100), 0);
    }

    #[test]
    fn pending_fees_accrue_from_snapshot() {
        let mut m = MarketInfoBuilder::eth_usdc().build();
        m.borrowing.cumulative_borrowing_factor_long = PRECISION / 100 * 3;

        let mut pos = PositionBuilder::new()
            .long(true)
            .size(usd(1_000), PRECISION)
            .borrowing_factor(PRECISION / 100)
            .build();
        pos.pending_borrowing_fees_usd = usd(1);

        assert_eq!(get_pending_borrowing_fees_usd(&m, &pos), usd(21));

        pos.borrowing_factor = PRECISION;
        assert_eq!(get_pending_borrowing_fees_usd(&m, &pos), usd(1));
    }
}
