pub mod markets;
pub mod orders;
pub mod positions;
pub mod tokens;

pub use markets::{
    BorrowingState, CollateralFactors, FeeFactors, FundingState, ImpactFactors, ImpactPoolState, Market,
    MarketInfo, MarketValues, MarketValuesData, MarketsData, MarketsInfoData, MaxPositionImpactFactors,
    OpenInterestState, PoolState, VirtualInventoryState, build_markets_info, get_market_info,
};
pub use orders::{
    Order, OrderInfo, OrderType, OrdersData, OrdersInfoData, TriggerThresholdType, get_order_info, get_orders_info,
};
pub use positions::{
    Position, PositionInfo, PositionKey, PositionsData, PositionsInfoData, get_position_info, get_positions_info,
};
pub use tokens::{TokenPricesData, TokensData};
