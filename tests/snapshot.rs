use perp_market_math::config::ProtocolConfig;
use perp_market_math::state::{
    self, MarketValuesData, MarketsData, Position, PositionKey, PositionsData, TokenPricesData, TokensData,
};
use perp_market_math::testing::usd;
use perp_market_math::trade::decrease::{DecreasePositionParams, get_decrease_position_amounts};
use perp_market_math::types::{Address, Token};
use serde::Deserialize;

/// Chain snapshot as an indexer would hand it over.
#[derive(Deserialize)]
struct Snapshot {
    tokens: Vec<Token>,
    prices: TokenPricesData,
    markets: MarketsData,
    market_values: MarketValuesData,
    positions: Vec<Position>,
}

fn load() -> Snapshot {
    serde_json::from_str(include_str!("fixtures/snapshot.json")).expect("fixture parses")
}

fn eth_usdc_long() -> PositionKey {
    "0x0909090909090909090909090909090909090909:\
     0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1:\
     0x0202020202020202020202020202020202020202:true"
        .parse()
        .unwrap()
}

/// Markets and positions resolve from plain data; anything without a price
/// is dropped instead of failing the batch.
#[test]
fn test_snapshot_positions_info() {
    let snapshot = load();
    let tokens = TokensData::build(&snapshot.tokens, &snapshot.prices);
    assert_eq!(tokens.len(), 2, "BTC has no price");

    let markets = state::build_markets_info(&snapshot.markets, &snapshot.market_values, &tokens);
    assert_eq!(markets.len(), 1);

    let mut positions = PositionsData::new();
    for position in snapshot.positions {
        positions.upsert(position);
    }
    let config = ProtocolConfig::default();
    let infos = state::get_positions_info(&markets, &positions, &config, None);
    assert_eq!(infos.len(), 1);

    let info = &infos[&eth_usdc_long()];
    assert_eq!(info.entry_price, Some(usd(1_000)));
    assert_eq!(info.mark_price, usd(1_100));
    assert_eq!(info.collateral_usd, usd(500));
    assert_eq!(info.pnl, usd(200));
    assert_eq!(info.pnl_percentage, 4_000);
    assert_eq!(info.closing_fee_usd, usd(1));
    assert_eq!(info.pnl_after_fees, usd(199));
    assert_eq!(info.net_value, usd(699));
    assert_eq!(info.leverage, Some(40_000));
    assert_eq!(info.leverage_with_pnl, Some(28_571));
    assert!(!info.has_low_collateral);
    // (20 - (500 - 1) + 2000) / 2 ETH
    assert_eq!(info.liquidation_price, Some(usd(760) + usd(1) / 2));
    assert_eq!(info.position.increased_at_block, 1_200);
}

/// Closing the whole position pays out its net value.
#[test]
fn test_snapshot_full_close() {
    let snapshot = load();
    let tokens = TokensData::build(&snapshot.tokens, &snapshot.prices);
    let markets = state::build_markets_info(&snapshot.markets, &snapshot.market_values, &tokens);
    let config = ProtocolConfig::default();

    let key = eth_usdc_long();
    let position = snapshot
        .positions
        .iter()
        .find(|p| p.key == key)
        .expect("position in fixture");
    let info = state::get_position_info(&markets, position, &config, None).unwrap();
    let market = &markets[&key.market_address];

    let amounts = get_decrease_position_amounts(&DecreasePositionParams {
        market,
        collateral_token: &market.short_token,
        is_long: true,
        position: Some(&info),
        close_size_usd: usd(2_000),
        keep_leverage: false,
        trigger_price: None,
        trigger_order_type: None,
        fixed_acceptable_price_impact_bps: None,
        receive_token: None,
        referral: None,
        config: &config,
    })
    .unwrap();

    assert!(amounts.is_full_close);
    assert_eq!(amounts.realized_pnl, usd(200));
    assert_eq!(amounts.payed_output_usd, usd(1));
    assert_eq!(amounts.receive_usd, info.net_value);
}

#[test]
fn test_addresses_round_trip_as_hex() {
    let address = Address::repeat_byte(0xab);
    let json = serde_json::to_string(&address).unwrap();
    assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
    assert_eq!(serde_json::from_str::<Address>(&json).unwrap(), address);
    assert!(serde_json::from_str::<Address>("\"0x1234\"").is_err());
}
