// src/state/positions.rs

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::math::conversion::{convert_to_token_amount, convert_to_usd, get_mark_price};
use crate::math::numbers::get_basis_points;
use crate::math::pnl::{get_entry_price, get_position_pnl_usd};
use crate::math::position::{get_leverage, get_position_net_value};
use crate::risk::liquidation::{
    LiquidationPriceParams, get_liquidation_price, get_max_allowed_leverage_by_min_collateral_factor,
};
use crate::services::borrowing::get_pending_borrowing_fees_usd;
use crate::services::fees::get_position_fee;
use crate::services::funding::{get_claimable_funding_usd, get_pending_funding_fees_usd, get_position_pending_fees_usd};
use crate::services::price_impact::get_price_impact_for_position;
use crate::state::{MarketInfo, MarketsInfoData, get_market_info};
use crate::types::{Address, BlockNumber, Bps, Factor, Price, ReferralInfo, TokenAmount, TokenData, Usd};

/// Identifies a position: one per account, market, collateral and side.
///
/// Renders as `account:market:collateral:isLong`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub account: Address,
    pub market_address: Address,
    pub collateral_token_address: Address,
    pub is_long: bool,
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.account, self.market_address, self.collateral_token_address, self.is_long
        )
    }
}

impl FromStr for PositionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidPositionKey(s.to_string());
        let mut parts = s.split(':');
        let (Some(account), Some(market), Some(collateral), Some(is_long), None) =
            (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Ok(Self {
            account: account.parse().map_err(|_| invalid())?,
            market_address: market.parse().map_err(|_| invalid())?,
            collateral_token_address: collateral.parse().map_err(|_| invalid())?,
            is_long: is_long.parse().map_err(|_| invalid())?,
        })
    }
}

/// Position snapshot as read from chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub key: PositionKey,

    pub size_in_usd: Usd,
    pub size_in_tokens: TokenAmount,
    pub collateral_amount: TokenAmount,

    /// Cumulative borrowing factor at the last update.
    pub borrowing_factor: Factor,
    /// Borrowing fees carried from before the `borrowing_factor` snapshot.
    pub pending_borrowing_fees_usd: Usd,
    /// Funding owed, in collateral tokens.
    pub funding_fee_amount: TokenAmount,
    pub claimable_long_token_amount: TokenAmount,
    pub claimable_short_token_amount: TokenAmount,

    pub increased_at_block: BlockNumber,
    pub decreased_at_block: BlockNumber,
}

impl Default for PositionKey {
    fn default() -> Self {
        Self {
            account: Address::ZERO,
            market_address: Address::ZERO,
            collateral_token_address: Address::ZERO,
            is_long: true,
        }
    }
}

/// Positions by key.
#[derive(Clone, Debug, Default)]
pub struct PositionsData {
    positions: HashMap<PositionKey, Position>,
}

impl PositionsData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn get_mut(&mut self, key: &PositionKey) -> Option<&mut Position> {
        self.positions.get_mut(key)
    }

    pub fn upsert(&mut self, position: Position) {
        self.positions.insert(position.key, position);
    }

    pub fn remove(&mut self, key: &PositionKey) -> Option<Position> {
        self.positions.remove(key)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PositionKey, &Position)> {
        self.positions.iter()
    }

    pub fn get_or_insert_with<F>(&mut self, key: PositionKey, f: F) -> &mut Position
    where
        F: FnOnce(PositionKey) -> Position,
    {
        match self.positions.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let k = *e.key();
                e.insert(f(k))
            }
        }
    }
}

impl FromIterator<Position> for PositionsData {
    fn from_iter<I: IntoIterator<Item = Position>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().map(|p| (p.key, p)).collect(),
        }
    }
}

/// A position with every display figure derived from the market snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionInfo {
    pub position: Position,
    pub market_address: Address,
    pub index_token_address: Address,

    pub entry_price: Option<Price>,
    pub mark_price: Price,
    pub liquidation_price: Option<Price>,

    pub collateral_usd: Usd,
    pub remaining_collateral_usd: Usd,
    pub remaining_collateral_amount: TokenAmount,

    pub pending_borrowing_fees_usd: Usd,
    pub pending_funding_fees_usd: Usd,
    pub pending_fees_usd: Usd,
    pub claimable_funding_usd: Usd,
    pub closing_fee_usd: Usd,
    pub ui_fee_usd: Usd,

    pub pnl: Usd,
    pub pnl_percentage: Bps,
    pub pnl_after_fees: Usd,
    pub pnl_after_fees_percentage: Bps,
    pub net_value: Usd,

    pub leverage: Option<Bps>,
    pub leverage_with_pnl: Option<Bps>,
    pub has_low_collateral: bool,
}

impl PositionInfo {
    pub fn key(&self) -> PositionKey {
        self.position.key
    }

    pub fn is_long(&self) -> bool {
        self.position.key.is_long
    }
}

pub type PositionsInfoData = HashMap<PositionKey, PositionInfo>;

fn collateral_token<'a>(market: &'a MarketInfo, address: &Address) -> Result<&'a TokenData> {
    if market.long_token.address == *address {
        Ok(&market.long_token)
    } else if market.short_token.address == *address {
        Ok(&market.short_token)
    } else {
        Err(Error::NotMarketCollateral {
            market: market.market_token_address(),
            token: *address,
        })
    }
}

pub fn get_position_info(
    markets: &MarketsInfoData,
    position: &Position,
    config: &ProtocolConfig,
    referral: Option<&ReferralInfo>,
) -> Result<PositionInfo> {
    let key = &position.key;
    let market = get_market_info(markets, &key.market_address)?;
    let collateral = collateral_token(market, &key.collateral_token_address)?;
    let index = &market.index_token;
    let collateral_min_price = collateral.prices.min_price;

    let mark_price = get_mark_price(&index.prices, false, key.is_long);
    let entry_price = get_entry_price(position.size_in_usd, position.size_in_tokens, index);

    let pending_borrowing_fees_usd = get_pending_borrowing_fees_usd(market, position);
    let pending_funding_fees_usd = get_pending_funding_fees_usd(position, collateral);
    let pending_fees_usd = get_position_pending_fees_usd(pending_funding_fees_usd, pending_borrowing_fees_usd);

    let closing_impact = get_price_impact_for_position(market, -position.size_in_usd, key.is_long, true)?;
    let closing_fee = get_position_fee(
        market,
        position.size_in_usd,
        closing_impact > 0,
        referral,
        config.ui_fee_factor(),
    );

    let collateral_usd = convert_to_usd(position.collateral_amount, collateral.decimals, collateral_min_price);
    let remaining_collateral_usd = collateral_usd - pending_fees_usd;
    let remaining_collateral_amount =
        convert_to_token_amount(remaining_collateral_usd, collateral.decimals, collateral_min_price)
            .ok_or(Error::MissingPrice(collateral.address))?;

    let pnl = get_position_pnl_usd(
        market,
        position.size_in_usd,
        position.size_in_tokens,
        mark_price,
        key.is_long,
    );
    let pnl_percentage = if collateral_usd != 0 {
        get_basis_points(pnl, collateral_usd, false)
    } else {
        0
    };

    let net_value = get_position_net_value(
        collateral_usd,
        pnl,
        pending_fees_usd,
        closing_fee.position_fee_usd,
        closing_fee.ui_fee_usd,
    );
    let pnl_after_fees = pnl - pending_fees_usd - closing_fee.position_fee_usd - closing_fee.ui_fee_usd;
    let pnl_after_fees_percentage = if collateral_usd != 0 {
        get_basis_points(pnl_after_fees, collateral_usd + closing_fee.position_fee_usd, false)
    } else {
        0
    };

    let leverage = get_leverage(
        position.size_in_usd,
        collateral_usd,
        None,
        pending_funding_fees_usd,
        pending_borrowing_fees_usd,
    );
    let leverage_with_pnl = get_leverage(
        position.size_in_usd,
        collateral_usd,
        Some(pnl),
        pending_funding_fees_usd,
        pending_borrowing_fees_usd,
    );
    let max_allowed_leverage = get_max_allowed_leverage_by_min_collateral_factor(
        market.collateral.min_collateral_factor,
        config.max_allowed_leverage_bps,
    );
    let has_low_collateral = leverage.is_some_and(|l| l > max_allowed_leverage);

    let liquidation_price = get_liquidation_price(&LiquidationPriceParams {
        market,
        collateral_token: collateral,
        size_in_usd: position.size_in_usd,
        size_in_tokens: position.size_in_tokens,
        collateral_amount: position.collateral_amount,
        collateral_usd,
        pending_funding_fees_usd,
        pending_borrowing_fees_usd,
        min_collateral_usd: config.min_collateral_usd,
        is_long: key.is_long,
        use_max_price_impact: false,
        referral,
    });

    Ok(PositionInfo {
        position: position.clone(),
        market_address: market.market_token_address(),
        index_token_address: index.address,
        entry_price,
        mark_price,
        liquidation_price,
        collateral_usd,
        remaining_collateral_usd,
        remaining_collateral_amount,
        pending_borrowing_fees_usd,
        pending_funding_fees_usd,
        pending_fees_usd,
        claimable_funding_usd: get_claimable_funding_usd(market, position),
        closing_fee_usd: closing_fee.position_fee_usd,
        ui_fee_usd: closing_fee.ui_fee_usd,
        pnl,
        pnl_percentage,
        pnl_after_fees,
        pnl_after_fees_percentage,
        net_value,
        leverage,
        leverage_with_pnl,
        has_low_collateral,
    })
}

/// Derive info for every position; failures are logged and left out.
pub fn get_positions_info(
    markets: &MarketsInfoData,
    positions: &PositionsData,
    config: &ProtocolConfig,
    referral: Option<&ReferralInfo>,
) -> PositionsInfoData {
    positions
        .iter()
        .filter_map(|(key, position)| match get_position_info(markets, position, config, referral) {
            Ok(info) => Some((*key, info)),
            Err(err) => {
                warn!(position = %key, error = %err, "skipping position");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::numbers::PRECISION;
    use crate::testing::{MarketInfoBuilder, PositionBuilder, usd};

    #[test]
    fn key_renders_and_parses_back() {
        let key = PositionKey {
            account: Address::repeat_byte(0xaa),
            market_address: Address::repeat_byte(0xbb),
            collateral_token_address: Address::repeat_byte(0xcc),
            is_long: false,
        };
        let s = key.to_string();
        assert!(s.ends_with(":false"));
        assert_eq!(s.split(':').count(), 4);
        assert_eq!(s.parse::<PositionKey>().unwrap(), key);
    }

    #[test]
    fn malformed_key_is_rejected() {
        let bad_flag = format!("{0}:{0}:{0}:yes", Address::ZERO);
        for s in ["", "0x00:0x00", "a:b:c:true", bad_flag.as_str()] {
            assert!(matches!(s.parse::<PositionKey>(), Err(Error::InvalidPositionKey(_))), "{s}");
        }
    }

    #[test]
    fn store_get_or_insert_keeps_existing() {
        let pos = PositionBuilder::new().size(usd(10), 1).build();
        let key = pos.key;
        let mut store: PositionsData = [pos].into_iter().collect();

        let p = store.get_or_insert_with(key, |k| Position {
            key: k,
            ..Default::default()
        });
        assert_eq!(p.size_in_usd, usd(10));
        assert_eq!(store.len(), 1);
        assert!(store.remove(&key).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn info_derives_pnl_and_leverage() {
        let market = MarketInfoBuilder::eth_usdc().pool_amounts(100 * PRECISION, 100_000_000_000).build();
        let markets: MarketsInfoData = [(market.market_token_address(), market.clone())].into();

        // 2 ETH long opened at 900 with 400 USDC collateral; mark is 1000.
        let pos = PositionBuilder::new()
            .long(true)
            .market(market.market_token_address())
            .collateral(market.short_token.address, 400_000_000)
            .size(usd(1_800), 2 * PRECISION)
            .build();

        let info = get_position_info(&markets, &pos, &ProtocolConfig::default(), None).unwrap();
        assert_eq!(info.pnl, usd(200));
        assert_eq!(info.pnl_percentage, 5_000);
        assert_eq!(info.collateral_usd, usd(400));
        assert_eq!(info.entry_price, Some(usd(900)));
        assert_eq!(info.leverage, Some(45_000));
        assert_eq!(info.leverage_with_pnl, Some(30_000));
        assert_eq!(info.net_value, usd(600));
        assert!(info.liquidation_price.is_some());
        assert!(!info.has_low_collateral);
    }

    #[test]
    fn batch_skips_positions_of_unknown_markets() {
        let market = MarketInfoBuilder::eth_usdc().build();
        let markets: MarketsInfoData = [(market.market_token_address(), market.clone())].into();

        let good = PositionBuilder::new()
            .market(market.market_token_address())
            .collateral(market.short_token.address, 1_000_000)
            .size(usd(10), PRECISION / 100)
            .build();
        let orphan = PositionBuilder::new()
            .account(Address::repeat_byte(9))
            .market(Address::repeat_byte(0xee))
            .size(usd(10), PRECISION / 100)
            .build();

        let positions: PositionsData = [good.clone(), orphan].into_iter().collect();
        let info = get_positions_info(&markets, &positions, &ProtocolConfig::default(), None);
        assert_eq!(info.len(), 1);
        assert!(info.contains_key(&good.key));
    }
}
