// src/services/liquidity.rs
//
// Pool-side accounting: pool USD, open interest, reserves and the liquidity
// left for new positions and swaps.

use tracing::trace;

use crate::math::conversion::{convert_to_token_amount, convert_to_usd, get_price_by_type};
use crate::math::numbers::{PRECISION, USD_DECIMALS, apply_factor, expand_decimals, pow10};
use crate::math::rounding::mul_div_const;
use crate::state::{MarketInfo, MarketsInfoData};
use crate::types::{Address, PriceType, TokenAmount, TokenData, Usd};

/// Which collateral side of a market a token sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenPoolType {
    Long,
    Short,
}

impl TokenPoolType {
    pub fn is_long(self) -> bool {
        self == TokenPoolType::Long
    }
}

/// Pool side of `token`; a native token matches its wrapped collateral.
pub fn get_token_pool_type(market: &MarketInfo, token: &Address) -> Option<TokenPoolType> {
    let matches = |collateral: &TokenData| {
        collateral.address == *token || collateral.wrapped_address == Some(*token)
    };
    if matches(&market.long_token) || market.market.long_token_address == *token {
        return Some(TokenPoolType::Long);
    }
    if matches(&market.short_token) || market.market.short_token_address == *token {
        return Some(TokenPoolType::Short);
    }
    None
}

/// The collateral on the other side of `token`.
pub fn get_opposite_collateral<'a>(market: &'a MarketInfo, token: &Address) -> Option<&'a TokenData> {
    match get_token_pool_type(market, token)? {
        TokenPoolType::Long => Some(&market.short_token),
        TokenPoolType::Short => Some(&market.long_token),
    }
}

pub fn get_pool_usd_without_pnl(market: &MarketInfo, is_long: bool, price_type: PriceType) -> Usd {
    let token = market.collateral_token(is_long);
    let price = get_price_by_type(&token.prices, price_type);
    convert_to_usd(market.pool_amount(is_long), token.decimals, price)
}

pub fn get_open_interest_usd(market: &MarketInfo, is_long: bool) -> Usd {
    if is_long {
        market.open_interest.long_interest_usd
    } else {
        market.open_interest.short_interest_usd
    }
}

pub fn get_open_interest_in_tokens(market: &MarketInfo, is_long: bool) -> TokenAmount {
    if is_long {
        market.open_interest.long_interest_in_tokens
    } else {
        market.open_interest.short_interest_in_tokens
    }
}

pub fn get_max_open_interest_usd(market: &MarketInfo, is_long: bool) -> Usd {
    if is_long {
        market.open_interest.max_open_interest_long
    } else {
        market.open_interest.max_open_interest_short
    }
}

/// USD the pool has committed to one side.
///
/// Longs are marked at the index max price; shorts are fixed in USD.
pub fn get_reserved_usd(market: &MarketInfo, is_long: bool) -> Usd {
    if is_long {
        convert_to_usd(
            market.open_interest.long_interest_in_tokens,
            market.index_token.decimals,
            market.index_token.prices.max_price,
        )
    } else {
        market.open_interest.short_interest_usd
    }
}

fn reserve_factor(market: &MarketInfo, is_long: bool) -> i128 {
    if is_long {
        market.collateral.reserve_factor_long
    } else {
        market.collateral.reserve_factor_short
    }
}

/// Pool USD at min price times the tighter of the two reserve factors.
pub fn get_max_reserved_usd(market: &MarketInfo, is_long: bool) -> Usd {
    let pool_usd = get_pool_usd_without_pnl(market, is_long, PriceType::Min);
    let oi_reserve_factor = if is_long {
        market.collateral.open_interest_reserve_factor_long
    } else {
        market.collateral.open_interest_reserve_factor_short
    };
    apply_factor(pool_usd, reserve_factor(market, is_long).min(oi_reserve_factor))
}

/// USD of collateral that can leave the pool on `is_long` side.
pub fn get_available_usd_liquidity_for_collateral(market: &MarketInfo, is_long: bool) -> Usd {
    let pool_usd = get_pool_usd_without_pnl(market, is_long, PriceType::Min);
    if market.is_spot_only() {
        return pool_usd;
    }

    let factor = reserve_factor(market, is_long);
    if factor == 0 {
        return 0;
    }
    let min_pool_usd = mul_div_const(get_reserved_usd(market, is_long), PRECISION, factor.abs());
    pool_usd - min_pool_usd
}

/// Headroom for new open interest on one side, never negative.
pub fn get_available_usd_liquidity_for_position(market: &MarketInfo, is_long: bool) -> Usd {
    if market.is_spot_only() {
        return 0;
    }
    let reserved = get_reserved_usd(market, is_long);
    let by_reserve = get_max_reserved_usd(market, is_long) - reserved;
    let by_max_oi = get_max_open_interest_usd(market, is_long) - get_open_interest_usd(market, is_long);
    by_reserve.min(by_max_oi).max(0)
}

/// Enabled market for `index_token` with the most position liquidity on the
/// requested side. Markets holding `collateral_token` win ties.
pub fn get_most_liquid_market_for_position<'a>(
    markets: &'a MarketsInfoData,
    index_token: &Address,
    collateral_token: Option<&Address>,
    is_long: bool,
) -> Option<&'a MarketInfo> {
    let mut best: Option<(&MarketInfo, Usd, bool)> = None;
    for market in markets.values() {
        if market.is_disabled || market.is_spot_only() {
            continue;
        }
        if market.index_token.address != *index_token {
            continue;
        }
        let liquidity = get_available_usd_liquidity_for_position(market, is_long);
        let has_collateral = collateral_token.is_some_and(|c| market.is_collateral(c));
        let better = match best {
            None => true,
            Some((_, l, c)) => liquidity > l || (liquidity == l && has_collateral && !c),
        };
        if better {
            best = Some((market, liquidity, has_collateral));
        }
    }
    best.map(|(m, liquidity, _)| {
        trace!(market = %m.market_token_address(), liquidity, "most liquid market for position");
        m
    })
}

/// Enabled market holding `to_token` as collateral with the most outgoing
/// liquidity for it.
pub fn get_most_liquid_market_for_swap<'a>(
    markets: &'a MarketsInfoData,
    to_token: &Address,
) -> Option<&'a MarketInfo> {
    markets
        .values()
        .filter(|m| !m.is_disabled)
        .filter_map(|m| {
            let side = get_token_pool_type(m, to_token)?;
            Some((m, get_available_usd_liquidity_for_collateral(m, side.is_long())))
        })
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.market_token_address().cmp(&a.0.market_token_address())))
        .map(|(m, _)| m)
}

/// Price of one market token; 1 USD while the supply is empty.
pub fn get_market_token_price(pool_value: Usd, market_token: &TokenData) -> Usd {
    let supply = market_token.total_supply.unwrap_or(0);
    if supply <= 0 {
        return expand_decimals(1, USD_DECIMALS);
    }
    mul_div_const(pool_value, pow10(market_token.decimals as u32), supply)
}

pub fn usd_to_market_token_amount(pool_value: Usd, market_token: &TokenData, usd: Usd) -> TokenAmount {
    let supply = market_token.total_supply.unwrap_or(0);
    let one_usd = expand_decimals(1, USD_DECIMALS);

    if supply == 0 {
        // Seed the first deposit at 1 USD per token, counting any value
        // already sitting in the pool.
        let seeded = if pool_value > 0 { usd + pool_value } else { usd };
        return convert_to_token_amount(seeded, market_token.decimals, one_usd).unwrap_or(0);
    }
    if pool_value == 0 {
        return 0;
    }
    mul_div_const(supply, usd, pool_value)
}

pub fn market_token_amount_to_usd(pool_value: Usd, market_token: &TokenData, amount: TokenAmount) -> Usd {
    let price = get_market_token_price(pool_value, market_token);
    convert_to_usd(amount, market_token.decimals, price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MarketInfoBuilder, TokenBuilder, usd};

    fn market() -> MarketInfo {
        // 10 ETH long pool at 1000 USD, 5000 USDC short pool.
        MarketInfoBuilder::eth_usdc()
            .pool_amounts(10 * PRECISION, 5_000_000_000)
            .reserve_factors(PRECISION / 2, PRECISION / 2)
            .max_open_interest(usd(100_000), usd(100_000))
            .build()
    }

    #[test]
    fn pool_usd_uses_collateral_prices() {
        let m = market();
        assert_eq!(get_pool_usd_without_pnl(&m, true, PriceType::Min), usd(10_000));
        assert_eq!(get_pool_usd_without_pnl(&m, false, PriceType::Max), usd(5_000));
    }

    #[test]
    fn reserved_and_max_reserved() {
        let mut m = market();
        m.open_interest.long_interest_in_tokens = 2 * PRECISION;
        m.open_interest.short_interest_usd = usd(1_000);

        assert_eq!(get_reserved_usd(&m, true), usd(2_000));
        assert_eq!(get_reserved_usd(&m, false), usd(1_000));
        assert_eq!(get_max_reserved_usd(&m, true), usd(5_000));

        m.collateral.open_interest_reserve_factor_long = PRECISION / 4;
        assert_eq!(
            get_max_reserved_usd(&m, true),
            usd(2_500),
            "tighter open interest reserve factor must win"
        );
    }

    #[test]
    fn collateral_liquidity_backs_out_reserve() {
        let mut m = market();
        m.open_interest.long_interest_in_tokens = 2 * PRECISION;
        // 10_000 pool, 2_000 reserved at factor 0.5 pins 4_000.
        assert_eq!(get_available_usd_liquidity_for_collateral(&m, true), usd(6_000));

        m.collateral.reserve_factor_long = 0;
        assert_eq!(get_available_usd_liquidity_for_collateral(&m, true), 0);

        m.market.is_spot_only = true;
        assert_eq!(
            get_available_usd_liquidity_for_collateral(&m, true),
            usd(10_000),
            "spot-only market exposes the whole pool"
        );
    }

    #[test]
    fn position_liquidity_is_floored_and_spot_is_zero() {
        let mut m = market();
        m.open_interest.short_interest_usd = usd(4_000);
        assert_eq!(get_available_usd_liquidity_for_position(&m, false), 0);

        m.open_interest.short_interest_usd = usd(1_000);
        assert_eq!(get_available_usd_liquidity_for_position(&m, false), usd(1_500));

        m.market.is_spot_only = true;
        assert_eq!(get_available_usd_liquidity_for_position(&m, false), 0);
    }

    #[test]
    fn pool_type_and_opposite_collateral() {
        let m = market();
        let eth = m.long_token.address;
        let usdc = m.short_token.address;
        assert_eq!(get_token_pool_type(&m, &eth), Some(TokenPoolType::Long));
        assert_eq!(get_token_pool_type(&m, &usdc), Some(TokenPoolType::Short));
        assert_eq!(get_opposite_collateral(&m, &eth).map(|t| t.address), Some(usdc));
        assert_eq!(get_token_pool_type(&m, &Address::repeat_byte(0x77)), None);
    }

    #[test]
    fn market_token_pricing_seeds_at_one_usd() {
        let lp = TokenBuilder::new(0x55, "GM").build();
        assert_eq!(get_market_token_price(usd(123), &lp), usd(1));
        assert_eq!(usd_to_market_token_amount(0, &lp, usd(10)), 10 * PRECISION);

        let lp = lp.with_total_supply(100 * PRECISION);
        assert_eq!(get_market_token_price(usd(200), &lp), usd(2));
        assert_eq!(usd_to_market_token_amount(usd(200), &lp, usd(10)), 5 * PRECISION);
        assert_eq!(market_token_amount_to_usd(usd(200), &lp, 5 * PRECISION), usd(10));
    }

    /// ETH markets keyed by address: a thin ETH/USDC, a deep ETH/USDC, a
    /// spot-only one, a disabled one and a deep ETH/DAI.
    fn eth_markets() -> MarketsInfoData {
        let eth = TokenBuilder::new(0x01, "ETH").price(usd(1_000)).build();
        let usdc = TokenBuilder::new(0x02, "USDC").decimals(6).build();
        let dai = TokenBuilder::new(0x03, "DAI").build();
        [
            market(),
            MarketInfoBuilder::new(0xa2, eth.clone(), usdc.clone())
                .pool_amounts(100 * PRECISION, 0)
                .build(),
            MarketInfoBuilder::new(0xa3, eth.clone(), usdc.clone())
                .pool_amounts(1_000 * PRECISION, 20_000_000_000)
                .spot_only()
                .build(),
            MarketInfoBuilder::new(0xa4, eth.clone(), usdc)
                .pool_amounts(1_000 * PRECISION, 1_000_000_000_000)
                .disabled()
                .build(),
            MarketInfoBuilder::new(0xa5, eth, dai)
                .pool_amounts(100 * PRECISION, 0)
                .build(),
        ]
        .into_iter()
        .map(|m| (m.market_token_address(), m))
        .collect()
    }

    #[test]
    fn most_liquid_market_for_position() {
        let markets = eth_markets();
        let eth = Address::repeat_byte(0x01);
        let usdc = Address::repeat_byte(0x02);
        let dai = Address::repeat_byte(0x03);
        let pick = |collateral: Option<&Address>, is_long| {
            get_most_liquid_market_for_position(&markets, &eth, collateral, is_long).map(|m| m.market_token_address())
        };

        // 100k of headroom on 0xa2 and 0xa5; the collateral breaks the tie.
        assert_eq!(pick(Some(&usdc), true), Some(Address::repeat_byte(0xa2)));
        assert_eq!(pick(Some(&dai), true), Some(Address::repeat_byte(0xa5)));
        // Only the thin market has USDC to back shorts.
        assert_eq!(pick(None, false), Some(Address::repeat_byte(0xa1)));

        let btc = Address::repeat_byte(0x09);
        assert!(get_most_liquid_market_for_position(&markets, &btc, None, true).is_none());
    }

    #[test]
    fn most_liquid_market_for_swap() {
        let markets = eth_markets();
        let into = |token: u8| {
            get_most_liquid_market_for_swap(&markets, &Address::repeat_byte(token)).map(|m| m.market_token_address())
        };

        // Spot-only pools pay out in full; the disabled 1M USDC pool is skipped.
        assert_eq!(into(0x02), Some(Address::repeat_byte(0xa3)));
        assert_eq!(into(0x01), Some(Address::repeat_byte(0xa3)));
        assert_eq!(into(0x09), None);
    }
}
