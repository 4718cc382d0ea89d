// src/risk/next_position.rs

use crate::math::numbers::get_basis_points;
use crate::math::pnl::get_entry_price;
use crate::math::position::get_leverage;
use crate::risk::liquidation::{LiquidationPriceParams, get_liquidation_price};
use crate::state::{MarketInfo, PositionInfo};
use crate::types::{Bps, Price, ReferralInfo, TokenAmount, TokenData, Usd};

/// Position figures after a trade executes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NextPositionValues {
    pub next_size_usd: Usd,
    pub next_collateral_usd: Usd,
    pub next_entry_price: Option<Price>,
    pub next_leverage: Option<Bps>,
    pub next_liq_price: Option<Price>,
    /// Decrease only: pnl left on the remaining size.
    pub next_pnl: Option<Usd>,
    pub next_pnl_percentage: Option<Bps>,
}

#[derive(Clone, Copy, Debug)]
pub struct IncreaseTrade<'a> {
    pub existing_position: Option<&'a PositionInfo>,
    pub market: &'a MarketInfo,
    pub collateral_token: &'a TokenData,
    pub size_delta_usd: Usd,
    pub size_delta_in_tokens: TokenAmount,
    pub collateral_delta_usd: Usd,
    pub collateral_delta_amount: TokenAmount,
    pub index_price: Price,
    pub is_long: bool,
    pub show_pnl_in_leverage: bool,
    pub min_collateral_usd: Usd,
    pub referral: Option<&'a ReferralInfo>,
}

/// Size, collateral and risk of the position once the increase lands.
///
/// Pending fees are already folded into the existing position's collateral,
/// so they are not charged again.
pub fn get_next_position_values_for_increase_trade(t: &IncreaseTrade<'_>) -> NextPositionValues {
    let existing = t.existing_position;
    let next_collateral_usd = existing.map_or(0, |p| p.collateral_usd) + t.collateral_delta_usd;
    let next_collateral_amount = existing.map_or(0, |p| p.position.collateral_amount) + t.collateral_delta_amount;
    let next_size_usd = existing.map_or(0, |p| p.position.size_in_usd) + t.size_delta_usd;
    let next_size_in_tokens = existing.map_or(0, |p| p.position.size_in_tokens) + t.size_delta_in_tokens;

    let next_entry_price =
        get_entry_price(next_size_usd, next_size_in_tokens, &t.market.index_token).or(Some(t.index_price));

    let pnl = if t.show_pnl_in_leverage {
        existing.map(|p| p.pnl)
    } else {
        None
    };
    let next_leverage = get_leverage(next_size_usd, next_collateral_usd, pnl, 0, 0);

    let next_liq_price = get_liquidation_price(&LiquidationPriceParams {
        market: t.market,
        collateral_token: t.collateral_token,
        size_in_usd: next_size_usd,
        size_in_tokens: next_size_in_tokens,
        collateral_amount: next_collateral_amount,
        collateral_usd: next_collateral_usd,
        pending_funding_fees_usd: 0,
        pending_borrowing_fees_usd: 0,
        min_collateral_usd: t.min_collateral_usd,
        is_long: t.is_long,
        use_max_price_impact: false,
        referral: t.referral,
    });

    NextPositionValues {
        next_size_usd,
        next_collateral_usd,
        next_entry_price,
        next_leverage,
        next_liq_price,
        next_pnl: None,
        next_pnl_percentage: None,
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DecreaseTrade<'a> {
    pub existing_position: Option<&'a PositionInfo>,
    pub market: &'a MarketInfo,
    pub collateral_token: &'a TokenData,
    pub size_delta_usd: Usd,
    pub size_delta_in_tokens: TokenAmount,
    pub estimated_pnl: Usd,
    pub realized_pnl: Usd,
    pub collateral_delta_usd: Usd,
    pub collateral_delta_amount: TokenAmount,
    /// Costs the realized pnl could not cover, paid from collateral.
    pub payed_remaining_collateral_usd: Usd,
    pub payed_remaining_collateral_amount: TokenAmount,
    pub show_pnl_in_leverage: bool,
    pub is_long: bool,
    pub min_collateral_usd: Usd,
    pub referral: Option<&'a ReferralInfo>,
}

/// What is left of the position after the decrease; all zero without an
/// existing position.
pub fn get_next_position_values_for_decrease_trade(t: &DecreaseTrade<'_>) -> NextPositionValues {
    let Some(existing) = t.existing_position else {
        return NextPositionValues::default();
    };

    let next_size_usd = existing.position.size_in_usd - t.size_delta_usd;
    let next_size_in_tokens = existing.position.size_in_tokens - t.size_delta_in_tokens;
    let next_collateral_usd =
        (existing.remaining_collateral_usd - t.collateral_delta_usd - t.payed_remaining_collateral_usd).max(0);
    let next_collateral_amount = (existing.remaining_collateral_amount
        - t.collateral_delta_amount
        - t.payed_remaining_collateral_amount)
        .max(0);

    let next_pnl = t.estimated_pnl - t.realized_pnl;
    let next_pnl_percentage = get_basis_points(next_pnl, next_collateral_usd, false);

    let next_leverage = get_leverage(
        next_size_usd,
        next_collateral_usd,
        t.show_pnl_in_leverage.then_some(next_pnl),
        0,
        0,
    );

    let next_liq_price = get_liquidation_price(&LiquidationPriceParams {
        market: t.market,
        collateral_token: t.collateral_token,
        size_in_usd: next_size_usd,
        size_in_tokens: next_size_in_tokens,
        collateral_amount: next_collateral_amount,
        collateral_usd: next_collateral_usd,
        pending_funding_fees_usd: 0,
        pending_borrowing_fees_usd: 0,
        min_collateral_usd: t.min_collateral_usd,
        is_long: t.is_long,
        use_max_price_impact: false,
        referral: t.referral,
    });

    NextPositionValues {
        next_size_usd,
        next_collateral_usd,
        next_entry_price: None,
        next_leverage,
        next_liq_price,
        next_pnl: Some(next_pnl),
        next_pnl_percentage: Some(next_pnl_percentage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::math::numbers::PRECISION;
    use crate::state::get_position_info;
    use crate::testing::{MarketInfoBuilder, PositionBuilder, usd};

    fn setup() -> (MarketInfo, PositionInfo) {
        let market = MarketInfoBuilder::eth_usdc()
            .pool_amounts(100 * PRECISION, 100_000_000_000)
            .min_collateral_factor(PRECISION / 100)
            .build();
        // 2 ETH long opened at 1000 with 500 USDC.
        let position = PositionBuilder::new()
            .market(market.market_token_address())
            .collateral(market.short_token.address, 500_000_000)
            .size(usd(2_000), 2 * PRECISION)
            .build();
        let markets = [(market.market_token_address(), market.clone())].into();
        let config = ProtocolConfig {
            min_collateral_usd: 0,
            ..Default::default()
        };
        let info = get_position_info(&markets, &position, &config, None).unwrap();
        (market, info)
    }

    #[test]
    fn increase_from_scratch_and_on_top() {
        let (market, info) = setup();
        let mut trade = IncreaseTrade {
            existing_position: None,
            market: &market,
            collateral_token: &market.short_token,
            size_delta_usd: usd(2_000),
            size_delta_in_tokens: 2 * PRECISION,
            collateral_delta_usd: usd(500),
            collateral_delta_amount: 500_000_000,
            index_price: usd(1_000),
            is_long: true,
            show_pnl_in_leverage: false,
            min_collateral_usd: 0,
            referral: None,
        };

        let fresh = get_next_position_values_for_increase_trade(&trade);
        assert_eq!(fresh.next_size_usd, usd(2_000));
        assert_eq!(fresh.next_entry_price, Some(usd(1_000)));
        assert_eq!(fresh.next_leverage, Some(40_000));
        // (20 - 500 + 2000) / 2
        assert_eq!(fresh.next_liq_price, Some(usd(760)));

        trade.existing_position = Some(&info);
        let doubled = get_next_position_values_for_increase_trade(&trade);
        assert_eq!(doubled.next_size_usd, usd(4_000));
        assert_eq!(doubled.next_collateral_usd, usd(1_000));
        assert_eq!(doubled.next_leverage, Some(40_000));
        assert_eq!(doubled.next_pnl, None);
    }

    #[test]
    fn decrease_half() {
        let (market, info) = setup();
        let trade = DecreaseTrade {
            existing_position: Some(&info),
            market: &market,
            collateral_token: &market.short_token,
            size_delta_usd: usd(1_000),
            size_delta_in_tokens: PRECISION,
            estimated_pnl: usd(100),
            realized_pnl: usd(50),
            collateral_delta_usd: usd(250),
            collateral_delta_amount: 250_000_000,
            payed_remaining_collateral_usd: 0,
            payed_remaining_collateral_amount: 0,
            show_pnl_in_leverage: true,
            is_long: true,
            min_collateral_usd: 0,
            referral: None,
        };

        let next = get_next_position_values_for_decrease_trade(&trade);
        assert_eq!(next.next_size_usd, usd(1_000));
        assert_eq!(next.next_collateral_usd, usd(250));
        assert_eq!(next.next_pnl, Some(usd(50)));
        assert_eq!(next.next_pnl_percentage, Some(2_000));
        // 1000 / (250 + 50)
        assert_eq!(next.next_leverage, Some(33_333));
        assert!(next.next_liq_price.is_some());

        let none = get_next_position_values_for_decrease_trade(&DecreaseTrade {
            existing_position: None,
            ..trade
        });
        assert_eq!(none, NextPositionValues::default());
    }
}
