// src/math/conversion.rs

use crate::error::{Error, Result};
use crate::math::numbers::{PRECISION, adjust_for_decimals, pow10};
use crate::math::rounding::{mul_div, mul_div_const};
use crate::types::{Price, PriceType, TokenAmount, TokenData, TokenPrices, Usd};

/// `amount * price / 10^decimals`.
pub fn convert_to_usd(amount: TokenAmount, decimals: u8, price: Price) -> Usd {
    mul_div_const(amount, price, pow10(decimals as u32))
}

/// `usd * 10^decimals / price`; `None` for a non-positive price.
pub fn convert_to_token_amount(usd: Usd, decimals: u8, price: Price) -> Option<TokenAmount> {
    if price <= 0 {
        return None;
    }
    Some(mul_div_const(usd, pow10(decimals as u32), price))
}

/// [`convert_to_token_amount`] for `token`, failing with
/// [`Error::MissingPrice`] on a non-positive price.
pub fn to_token_amount(usd: Usd, token: &TokenData, price: Price) -> Result<TokenAmount> {
    convert_to_token_amount(usd, token.decimals, price).ok_or(Error::MissingPrice(token.address))
}

pub fn get_mid_price(prices: &TokenPrices) -> Price {
    (prices.min_price + prices.max_price) / 2
}

pub fn get_price_by_type(prices: &TokenPrices, price_type: PriceType) -> Price {
    match price_type {
        PriceType::Min => prices.min_price,
        PriceType::Max => prices.max_price,
        PriceType::Mid => get_mid_price(prices),
    }
}

/// Increasing a long or decreasing a short buys the index token.
pub fn get_should_use_max_price(is_increase: bool, is_long: bool) -> bool {
    is_increase == is_long
}

/// Execution-side price of the index token for a position change.
pub fn get_mark_price(prices: &TokenPrices, is_increase: bool, is_long: bool) -> Price {
    if get_should_use_max_price(is_increase, is_long) {
        prices.max_price
    } else {
        prices.min_price
    }
}

/// Index price used to value pnl; `maximize` picks the side that favors the
/// position.
pub fn get_price_for_pnl(prices: &TokenPrices, is_long: bool, maximize: bool) -> Price {
    match (is_long, maximize) {
        (true, true) | (false, false) => prices.max_price,
        (true, false) | (false, true) => prices.min_price,
    }
}

/// Same token, a native token and its wrapped form, or two synthetics with
/// the same symbol.
pub fn get_is_equivalent_tokens(a: &TokenData, b: &TokenData) -> bool {
    if a.address == b.address {
        return true;
    }
    if a.wrapped_address == Some(b.address) || b.wrapped_address == Some(a.address) {
        return true;
    }
    if (a.is_synthetic || b.is_synthetic) && a.symbol == b.symbol {
        return true;
    }
    false
}

pub fn get_is_wrap(from: &TokenData, to: &TokenData) -> bool {
    from.is_native && from.wrapped_address == Some(to.address)
}

pub fn get_is_unwrap(from: &TokenData, to: &TokenData) -> bool {
    get_is_wrap(to, from)
}

/// Convert `from_amount` into `to_token` through a `PRECISION`-scaled price
/// ratio.
///
/// A limit-swap trigger ratio is quoted as to-per-from unless
/// `should_invert_ratio`, in which case it is inverted first.
pub fn get_amount_by_ratio(
    from_token: &TokenData,
    to_token: &TokenData,
    from_amount: TokenAmount,
    ratio: i128,
    should_invert_ratio: bool,
) -> TokenAmount {
    if get_is_equivalent_tokens(from_token, to_token) || from_amount == 0 {
        return from_amount;
    }
    if ratio <= 0 {
        return 0;
    }

    let ratio = if should_invert_ratio {
        match mul_div(PRECISION, PRECISION, ratio) {
            Ok(r) => r,
            Err(_) => return 0,
        }
    } else {
        ratio
    };
    let adjusted = adjust_for_decimals(ratio, from_token.decimals, to_token.decimals);
    mul_div_const(from_amount, adjusted, PRECISION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::numbers::expand_decimals;
    use crate::testing::TokenBuilder;

    #[test]
    fn usd_round_trip_within_one_unit() {
        let price = expand_decimals(1_850, 18) + 123_456_789;
        let amount = expand_decimals(7, 18) + 1;

        let usd = convert_to_usd(amount, 18, price);
        let back = convert_to_token_amount(usd, 18, price).expect("positive price");
        assert!(
            (back - amount).abs() <= 1,
            "round trip must lose at most one unit, got {back} vs {amount}"
        );
    }

    #[test]
    fn token_amount_is_undefined_for_zero_price() {
        assert_eq!(convert_to_token_amount(100, 6, 0), None);
        assert_eq!(convert_to_token_amount(100, 6, -1), None);
    }

    #[test]
    fn usdc_amount_converts_with_six_decimals() {
        let usd = convert_to_usd(2_500_000, 6, PRECISION);
        assert_eq!(usd, expand_decimals(25, 17));
    }

    #[test]
    fn mark_price_side_selection() {
        let p = TokenPrices::new(99, 101);
        assert_eq!(get_mark_price(&p, true, true), 101);
        assert_eq!(get_mark_price(&p, false, true), 99);
        assert_eq!(get_mark_price(&p, true, false), 99);
        assert_eq!(get_mark_price(&p, false, false), 101);
        assert_eq!(get_price_by_type(&p, PriceType::Mid), 100);
        assert_eq!(get_price_for_pnl(&p, true, true), 101);
        assert_eq!(get_price_for_pnl(&p, false, true), 99);
    }

    #[test]
    fn native_and_wrapped_are_equivalent() {
        let weth = TokenBuilder::new(0x02, "WETH").build();
        let eth = TokenBuilder::new(0x01, "ETH")
            .native(weth.address)
            .build();
        let usdc = TokenBuilder::new(0x03, "USDC").decimals(6).build();

        assert!(get_is_equivalent_tokens(&eth, &weth));
        assert!(get_is_equivalent_tokens(&weth, &eth));
        assert!(!get_is_equivalent_tokens(&eth, &usdc));
        assert!(get_is_wrap(&eth, &weth));
        assert!(get_is_unwrap(&weth, &eth));
    }

    #[test]
    fn synthetic_matches_by_symbol() {
        let btc = TokenBuilder::new(0x04, "BTC").decimals(8).build();
        let synthetic_btc = TokenBuilder::new(0x05, "BTC").synthetic().build();
        let synthetic_doge = TokenBuilder::new(0x06, "DOGE").synthetic().build();

        assert!(get_is_equivalent_tokens(&synthetic_btc, &btc));
        assert!(!get_is_equivalent_tokens(&synthetic_doge, &btc));
    }

    #[test]
    fn amount_by_ratio_adjusts_decimals() {
        let weth = TokenBuilder::new(0x02, "WETH").build();
        let usdc = TokenBuilder::new(0x03, "USDC").decimals(6).build();

        // 1 WETH at 2000 USDC per WETH.
        let ratio = expand_decimals(2_000, 18);
        let out = get_amount_by_ratio(&weth, &usdc, expand_decimals(1, 18), ratio, false);
        assert_eq!(out, 2_000_000_000);

        // Same trade quoted the other way round.
        let inverted = PRECISION / 2_000;
        let out = get_amount_by_ratio(&weth, &usdc, expand_decimals(1, 18), inverted, true);
        assert_eq!(out, 2_000_000_000);
    }
}
