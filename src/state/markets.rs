// src/state/markets.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::state::tokens::TokensData;
use crate::types::{Address, Factor, TokenAmount, TokenData, Usd};

/// Static market definition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub market_token_address: Address,
    pub index_token_address: Address,
    pub long_token_address: Address,
    pub short_token_address: Address,
    /// Long and short collateral are the same token.
    #[serde(default)]
    pub is_same_collaterals: bool,
    /// No index token; swaps only.
    #[serde(default)]
    pub is_spot_only: bool,
    #[serde(default)]
    pub name: String,
}

pub type MarketsData = HashMap<Address, Market>;

/// Pool token balances and caps. Amounts are in collateral token units.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolState {
    pub long_pool_amount: TokenAmount,
    pub short_pool_amount: TokenAmount,
    pub max_long_pool_amount: TokenAmount,
    pub max_short_pool_amount: TokenAmount,
    /// Pool value with pnl maximized / minimized (USD).
    pub pool_value_max: Usd,
    pub pool_value_min: Usd,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenInterestState {
    pub long_interest_usd: Usd,
    pub short_interest_usd: Usd,
    pub long_interest_in_tokens: TokenAmount,
    pub short_interest_in_tokens: TokenAmount,
    pub max_open_interest_long: Usd,
    pub max_open_interest_short: Usd,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeFactors {
    pub position_fee_factor_for_positive_impact: Factor,
    pub position_fee_factor_for_negative_impact: Factor,
    pub swap_fee_factor_for_positive_impact: Factor,
    pub swap_fee_factor_for_negative_impact: Factor,
}

/// Impact curve: `impact = factor * diff^exponent`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactFactors {
    pub positive_factor: Factor,
    pub negative_factor: Factor,
    /// Exponent as a `PRECISION` factor (2.0 = 2 * 10^18).
    pub exponent_factor: Factor,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxPositionImpactFactors {
    pub positive: Factor,
    pub negative: Factor,
    pub for_liquidations: Factor,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactPoolState {
    /// Index token units.
    pub position_impact_pool_amount: TokenAmount,
    pub swap_impact_pool_amount_long: TokenAmount,
    pub swap_impact_pool_amount_short: TokenAmount,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollateralFactors {
    pub min_collateral_factor: Factor,
    pub min_collateral_factor_for_open_interest_long: Factor,
    pub min_collateral_factor_for_open_interest_short: Factor,
    pub reserve_factor_long: Factor,
    pub reserve_factor_short: Factor,
    pub open_interest_reserve_factor_long: Factor,
    pub open_interest_reserve_factor_short: Factor,
    pub max_pnl_factor_for_traders_long: Factor,
    pub max_pnl_factor_for_traders_short: Factor,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorrowingState {
    /// Per-second borrowing factor for each side.
    pub borrowing_factor_per_second_long: Factor,
    pub borrowing_factor_per_second_short: Factor,
    /// Cumulative factor; positions snapshot it on every change.
    pub cumulative_borrowing_factor_long: Factor,
    pub cumulative_borrowing_factor_short: Factor,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingState {
    /// Per-second funding factor paid by the heavier side.
    pub funding_factor_per_second: Factor,
    pub longs_pay_shorts: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualInventoryState {
    pub virtual_pool_amount_for_long_token: TokenAmount,
    pub virtual_pool_amount_for_short_token: TokenAmount,
    /// Signed cross-market position inventory; positive means net short.
    pub virtual_inventory_for_positions: Usd,
}

/// Raw per-market on-chain figures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketValues {
    pub market_token_address: Address,
    pub pool: PoolState,
    pub open_interest: OpenInterestState,
    pub fees: FeeFactors,
    pub position_impact: ImpactFactors,
    pub swap_impact: ImpactFactors,
    pub max_position_impact: MaxPositionImpactFactors,
    pub impact_pool: ImpactPoolState,
    pub collateral: CollateralFactors,
    pub borrowing: BorrowingState,
    pub funding: FundingState,
    pub virtual_inventory: VirtualInventoryState,
    pub is_disabled: bool,
}

pub type MarketValuesData = HashMap<Address, MarketValues>;

/// Market with resolved tokens and live accounting state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarketInfo {
    pub market: Market,
    pub index_token: TokenData,
    pub long_token: TokenData,
    pub short_token: TokenData,

    pub pool: PoolState,
    pub open_interest: OpenInterestState,
    pub fees: FeeFactors,
    pub position_impact: ImpactFactors,
    pub swap_impact: ImpactFactors,
    pub max_position_impact: MaxPositionImpactFactors,
    pub impact_pool: ImpactPoolState,
    pub collateral: CollateralFactors,
    pub borrowing: BorrowingState,
    pub funding: FundingState,
    pub virtual_inventory: VirtualInventoryState,
    pub is_disabled: bool,
}

impl MarketInfo {
    /// Join a market with its tokens and values.
    ///
    /// When both sides share one collateral token the single on-chain
    /// balance is counted once per side, so pool amounts are halved.
    pub fn new(
        market: Market,
        index_token: TokenData,
        long_token: TokenData,
        short_token: TokenData,
        values: MarketValues,
    ) -> Self {
        let MarketValues {
            mut pool,
            open_interest,
            fees,
            position_impact,
            swap_impact,
            max_position_impact,
            impact_pool,
            collateral,
            borrowing,
            funding,
            virtual_inventory,
            is_disabled,
            ..
        } = values;

        if market.is_same_collaterals {
            pool.long_pool_amount /= 2;
            pool.short_pool_amount /= 2;
        }

        Self {
            market,
            index_token,
            long_token,
            short_token,
            pool,
            open_interest,
            fees,
            position_impact,
            swap_impact,
            max_position_impact,
            impact_pool,
            collateral,
            borrowing,
            funding,
            virtual_inventory,
            is_disabled,
        }
    }

    pub fn market_token_address(&self) -> Address {
        self.market.market_token_address
    }

    pub fn is_same_collaterals(&self) -> bool {
        self.market.is_same_collaterals
    }

    pub fn is_spot_only(&self) -> bool {
        self.market.is_spot_only
    }

    pub fn name(&self) -> &str {
        &self.market.name
    }

    pub fn collateral_token(&self, is_long: bool) -> &TokenData {
        if is_long {
            &self.long_token
        } else {
            &self.short_token
        }
    }

    pub fn pool_amount(&self, is_long: bool) -> TokenAmount {
        if is_long {
            self.pool.long_pool_amount
        } else {
            self.pool.short_pool_amount
        }
    }

    pub fn is_collateral(&self, token: &Address) -> bool {
        self.market.long_token_address == *token || self.market.short_token_address == *token
    }
}

pub type MarketsInfoData = HashMap<Address, MarketInfo>;

/// Resolve every market against its values and priced tokens.
///
/// Markets with a missing token or missing values are skipped.
pub fn build_markets_info(
    markets: &MarketsData,
    values: &MarketValuesData,
    tokens: &TokensData,
) -> MarketsInfoData {
    let mut out = MarketsInfoData::with_capacity(markets.len());
    for (address, market) in markets {
        match market_info(market, values, tokens) {
            Ok(info) => {
                out.insert(*address, info);
            }
            Err(e) => warn!(market = %address, error = %e, "cannot build market info, skipping"),
        }
    }
    out
}

fn market_info(market: &Market, values: &MarketValuesData, tokens: &TokensData) -> Result<MarketInfo> {
    let v = values
        .get(&market.market_token_address)
        .ok_or(Error::MarketValuesNotFound(market.market_token_address))?;
    let long_token = tokens.require(&market.long_token_address)?.clone();
    let short_token = tokens.require(&market.short_token_address)?.clone();
    // Spot-only markets carry no index token; price the long token instead.
    let index_token = if market.is_spot_only {
        long_token.clone()
    } else {
        tokens.require(&market.index_token_address)?.clone()
    };

    Ok(MarketInfo::new(
        market.clone(),
        index_token,
        long_token,
        short_token,
        v.clone(),
    ))
}

pub fn get_market_info<'a>(markets: &'a MarketsInfoData, address: &Address) -> Result<&'a MarketInfo> {
    markets.get(address).ok_or(Error::MarketNotFound(*address))
}
