// src/state/orders.rs

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::math::conversion::convert_to_usd;
use crate::services::pricing::get_trigger_threshold_type;
use crate::state::{MarketsInfoData, TokensData, get_market_info};
use crate::trade::swap::{
    SwapPathStats, TokensRatio, get_swap_path_output_addresses, get_swap_path_stats, get_tokens_ratio_by_amounts,
};
use crate::types::{Address, BlockNumber, Price, TokenAmount, Usd};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    MarketSwap,
    LimitSwap,
    MarketIncrease,
    LimitIncrease,
    MarketDecrease,
    LimitDecrease,
    StopLossDecrease,
    Liquidation,
}

impl OrderType {
    pub fn is_swap(self) -> bool {
        matches!(self, Self::MarketSwap | Self::LimitSwap)
    }

    pub fn is_increase(self) -> bool {
        matches!(self, Self::MarketIncrease | Self::LimitIncrease)
    }

    pub fn is_decrease(self) -> bool {
        matches!(
            self,
            Self::MarketDecrease | Self::LimitDecrease | Self::StopLossDecrease | Self::Liquidation
        )
    }

    pub fn is_position(self) -> bool {
        self.is_increase() || self.is_decrease()
    }

    pub fn is_market(self) -> bool {
        matches!(self, Self::MarketSwap | Self::MarketIncrease | Self::MarketDecrease)
    }

    /// Waits for a price: limit swaps and increases.
    pub fn is_limit(self) -> bool {
        matches!(self, Self::LimitSwap | Self::LimitIncrease)
    }

    /// Take-profit or stop-loss decrease.
    pub fn is_trigger_decrease(self) -> bool {
        matches!(self, Self::LimitDecrease | Self::StopLossDecrease)
    }

    /// Has a trigger price compared against the index price.
    pub fn has_trigger_price(self) -> bool {
        matches!(self, Self::LimitIncrease | Self::LimitDecrease | Self::StopLossDecrease)
    }
}

/// Side of the trigger price the index price must reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriggerThresholdType {
    Above,
    Below,
}

impl fmt::Display for TriggerThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => f.write_str(">"),
            Self::Below => f.write_str("<"),
        }
    }
}

impl TriggerThresholdType {
    /// Whether `index_price` has crossed `trigger_price`.
    pub fn is_reached(self, index_price: Price, trigger_price: Price) -> bool {
        match self {
            Self::Above => index_price >= trigger_price,
            Self::Below => index_price <= trigger_price,
        }
    }
}

/// Order intent as stored on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub key: String,
    pub account: Address,
    pub order_type: OrderType,
    pub market_address: Address,
    pub initial_collateral_token_address: Address,
    #[serde(default)]
    pub swap_path: Vec<Address>,
    #[serde(default)]
    pub size_delta_usd: Usd,
    #[serde(default)]
    pub initial_collateral_delta_amount: TokenAmount,
    #[serde(default)]
    pub trigger_price: Price,
    #[serde(default)]
    pub acceptable_price: Price,
    #[serde(default)]
    pub min_output_amount: TokenAmount,
    #[serde(default)]
    pub is_long: bool,
    #[serde(default)]
    pub should_unwrap_native_token: bool,
    #[serde(default)]
    pub is_frozen: bool,
    #[serde(default)]
    pub updated_at_block: BlockNumber,
}

/// Orders by key.
#[derive(Clone, Debug, Default)]
pub struct OrdersData {
    orders: HashMap<String, Order>,
}

impl OrdersData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by `order.key`.
    pub fn insert(&mut self, order: Order) -> Option<Order> {
        self.orders.insert(order.key.clone(), order)
    }

    pub fn get(&self, key: &str) -> Option<&Order> {
        self.orders.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Order> {
        self.orders.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Order> {
        self.orders.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.orders.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Order)> {
        self.orders.iter()
    }
}

impl FromIterator<Order> for OrdersData {
    fn from_iter<I: IntoIterator<Item = Order>>(iter: I) -> Self {
        Self {
            orders: iter.into_iter().map(|o| (o.key.clone(), o)).collect(),
        }
    }
}

/// An order decorated with the outcome of its swap path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderInfo {
    pub order: Order,
    pub swap_path_stats: Option<SwapPathStats>,
    /// Collateral the swap path ends in.
    pub target_collateral_address: Address,
    pub trigger_threshold_type: Option<TriggerThresholdType>,
    /// Limit swaps only: price ratio between the two tokens.
    pub trigger_ratio: Option<TokensRatio>,
}

pub type OrdersInfoData = HashMap<String, OrderInfo>;

pub fn get_order_info(markets: &MarketsInfoData, tokens: &TokensData, order: &Order) -> Result<OrderInfo> {
    let initial = tokens.require(&order.initial_collateral_token_address)?;
    if order.order_type.is_position() {
        get_market_info(markets, &order.market_address)?;
    }

    let usd_in = convert_to_usd(
        order.initial_collateral_delta_amount,
        initial.decimals,
        initial.prices.min_price,
    );
    let swap_path_stats = get_swap_path_stats(markets, &order.swap_path, &initial.address, usd_in, true)?;
    let output = get_swap_path_output_addresses(markets, &initial.address, &order.swap_path)?;

    let trigger_threshold_type = if order.order_type.has_trigger_price() {
        Some(get_trigger_threshold_type(order.order_type, order.is_long)?)
    } else {
        None
    };

    let trigger_ratio = if order.order_type == OrderType::LimitSwap {
        let target = tokens.require(&output.out_token_address)?;
        Some(get_tokens_ratio_by_amounts(
            initial,
            target,
            order.initial_collateral_delta_amount,
            order.min_output_amount,
        ))
    } else {
        None
    };

    Ok(OrderInfo {
        order: order.clone(),
        swap_path_stats,
        target_collateral_address: output.out_token_address,
        trigger_threshold_type,
        trigger_ratio,
    })
}

/// Decorate every order; invalid ones are logged and left out.
pub fn get_orders_info(markets: &MarketsInfoData, tokens: &TokensData, orders: &OrdersData) -> OrdersInfoData {
    orders
        .iter()
        .filter_map(|(key, order)| match get_order_info(markets, tokens, order) {
            Ok(info) => Some((key.clone(), info)),
            Err(err) => {
                warn!(order = %key, order_type = ?order.order_type, error = %err, "skipping order");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::numbers::PRECISION;
    use crate::testing::MarketInfoBuilder;

    fn order(key: &str, order_type: OrderType, market: Address, collateral: Address) -> Order {
        Order {
            key: key.to_string(),
            account: Address::repeat_byte(1),
            order_type,
            market_address: market,
            initial_collateral_token_address: collateral,
            swap_path: Vec::new(),
            size_delta_usd: 0,
            initial_collateral_delta_amount: 0,
            trigger_price: 0,
            acceptable_price: 0,
            min_output_amount: 0,
            is_long: true,
            should_unwrap_native_token: false,
            is_frozen: false,
            updated_at_block: 0,
        }
    }

    #[test]
    fn classification() {
        assert!(OrderType::LimitSwap.is_swap() && OrderType::LimitSwap.is_limit());
        assert!(OrderType::Liquidation.is_decrease() && !OrderType::Liquidation.is_market());
        assert!(OrderType::StopLossDecrease.is_trigger_decrease());
        assert!(!OrderType::MarketIncrease.has_trigger_price());
        assert!(OrderType::LimitIncrease.is_position());
    }

    #[test]
    fn threshold_reached() {
        assert!(TriggerThresholdType::Above.is_reached(10, 10));
        assert!(!TriggerThresholdType::Below.is_reached(11, 10));
        assert_eq!(TriggerThresholdType::Below.to_string(), "<");
    }

    #[test]
    fn decorates_swap_and_position_orders() {
        let market = MarketInfoBuilder::eth_usdc()
            .pool_amounts(100 * PRECISION, 100_000_000_000)
            .build();
        let eth = market.long_token.clone();
        let usdc = market.short_token.clone();
        let addr = market.market_token_address();
        let markets: MarketsInfoData = [(addr, market)].into();
        let tokens: TokensData = [eth.clone(), usdc.clone()].into_iter().collect();

        let mut swap = order("swap", OrderType::LimitSwap, Address::ZERO, eth.address);
        swap.swap_path = vec![addr];
        swap.initial_collateral_delta_amount = PRECISION;
        swap.min_output_amount = 1_100_000_000;

        let mut tp = order("tp", OrderType::LimitDecrease, addr, usdc.address);
        tp.trigger_price = 1_200 * PRECISION;

        let orphan = order("orphan", OrderType::MarketIncrease, Address::repeat_byte(0xee), usdc.address);

        let orders: OrdersData = [swap, tp, orphan].into_iter().collect();
        let info = get_orders_info(&markets, &tokens, &orders);
        assert_eq!(info.len(), 2);

        let swap = &info["swap"];
        assert_eq!(swap.target_collateral_address, usdc.address);
        let stats = swap.swap_path_stats.as_ref().unwrap();
        assert_eq!(stats.usd_out, 1_000 * PRECISION);
        let ratio = swap.trigger_ratio.unwrap();
        assert_eq!(ratio.largest_token, eth.address);
        assert_eq!(ratio.ratio, 1_100 * PRECISION);

        let tp = &info["tp"];
        assert!(tp.swap_path_stats.is_none());
        assert_eq!(tp.target_collateral_address, usdc.address);
        assert_eq!(tp.trigger_threshold_type, Some(TriggerThresholdType::Above));
    }
}
