//! Fixture builders for market snapshots.
//!
//! [`TokenBuilder`], [`MarketInfoBuilder`] and [`PositionBuilder`] create
//! snapshot values with controlled figures for unit and scenario tests. Every
//! unset figure is zero, except that reserve factors default to 1 and open
//! interest caps are effectively unlimited.

use crate::math::numbers::PRECISION;
use crate::state::{
    ImpactFactors, Market, MarketInfo, MarketValues, Position, PositionKey,
};
use crate::types::{Address, Factor, Price, Token, TokenAmount, TokenData, TokenPrices, Usd};

/// `amount` whole USD at 18 decimals.
pub fn usd(amount: i128) -> Usd {
    amount * PRECISION
}

/// Builder for [`TokenData`]; 18 decimals and a flat 1 USD price by default.
///
/// # Example
///
/// ```
/// use perp_market_math::testing::{TokenBuilder, usd};
///
/// let usdc = TokenBuilder::new(0x03, "USDC").decimals(6).build();
/// let eth = TokenBuilder::new(0x01, "ETH").price(usd(2_000)).build();
/// assert_eq!(usdc.decimals, 6);
/// assert_eq!(eth.prices.max_price, usd(2_000));
/// ```
#[derive(Clone, Debug)]
pub struct TokenBuilder {
    token: Token,
    prices: TokenPrices,
    total_supply: Option<TokenAmount>,
}

impl TokenBuilder {
    /// Token at `Address::repeat_byte(byte)`.
    pub fn new(byte: u8, symbol: &str) -> Self {
        Self {
            token: Token {
                address: Address::repeat_byte(byte),
                symbol: symbol.to_string(),
                decimals: 18,
                is_native: false,
                is_synthetic: false,
                wrapped_address: None,
            },
            prices: TokenPrices::flat(PRECISION),
            total_supply: None,
        }
    }

    pub fn decimals(mut self, decimals: u8) -> Self {
        self.token.decimals = decimals;
        self
    }

    pub fn price(mut self, price: Price) -> Self {
        self.prices = TokenPrices::flat(price);
        self
    }

    pub fn prices(mut self, min_price: Price, max_price: Price) -> Self {
        self.prices = TokenPrices::new(min_price, max_price);
        self
    }

    /// Mark as the chain's native token wrapped by `wrapped`.
    pub fn native(mut self, wrapped: Address) -> Self {
        self.token.is_native = true;
        self.token.wrapped_address = Some(wrapped);
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.token.is_synthetic = true;
        self
    }

    pub fn total_supply(mut self, supply: TokenAmount) -> Self {
        self.total_supply = Some(supply);
        self
    }

    pub fn build(self) -> TokenData {
        let data = TokenData::new(&self.token, self.prices);
        match self.total_supply {
            Some(supply) => data.with_total_supply(supply),
            None => data,
        }
    }
}

/// Builder for [`MarketInfo`].
///
/// Goes through [`MarketInfo::new`], so same-collateral pools are halved
/// exactly as for on-chain snapshots.
#[derive(Clone, Debug)]
pub struct MarketInfoBuilder {
    market: Market,
    index_token: TokenData,
    long_token: TokenData,
    short_token: TokenData,
    values: MarketValues,
}

impl MarketInfoBuilder {
    /// Market at `Address::repeat_byte(byte)`; the long token is the index.
    pub fn new(byte: u8, long_token: TokenData, short_token: TokenData) -> Self {
        let address = Address::repeat_byte(byte);
        let name = format!("{}/USD [{}-{}]", long_token.symbol, long_token.symbol, short_token.symbol);
        let mut values = MarketValues {
            market_token_address: address,
            ..Default::default()
        };
        values.collateral.reserve_factor_long = PRECISION;
        values.collateral.reserve_factor_short = PRECISION;
        values.collateral.open_interest_reserve_factor_long = PRECISION;
        values.collateral.open_interest_reserve_factor_short = PRECISION;
        values.open_interest.max_open_interest_long = usd(1_000_000_000_000);
        values.open_interest.max_open_interest_short = usd(1_000_000_000_000);

        Self {
            market: Market {
                market_token_address: address,
                index_token_address: long_token.address,
                long_token_address: long_token.address,
                short_token_address: short_token.address,
                is_same_collaterals: long_token.address == short_token.address,
                is_spot_only: false,
                name,
            },
            index_token: long_token.clone(),
            long_token,
            short_token,
            values,
        }
    }

    /// ETH/USD backed by ETH (18 decimals, 1000 USD) and USDC (6 decimals,
    /// 1 USD).
    pub fn eth_usdc() -> Self {
        let eth = TokenBuilder::new(0x01, "ETH").price(usd(1_000)).build();
        let usdc = TokenBuilder::new(0x02, "USDC").decimals(6).build();
        Self::new(0xa1, eth, usdc)
    }

    pub fn index_token(mut self, token: TokenData) -> Self {
        self.market.index_token_address = token.address;
        self.index_token = token;
        self
    }

    pub fn spot_only(mut self) -> Self {
        self.market.is_spot_only = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.values.is_disabled = true;
        self
    }

    /// Raw on-chain pool amounts, before same-collateral halving.
    pub fn pool_amounts(mut self, long: TokenAmount, short: TokenAmount) -> Self {
        self.values.pool.long_pool_amount = long;
        self.values.pool.short_pool_amount = short;
        self
    }

    pub fn pool_value(mut self, min: Usd, max: Usd) -> Self {
        self.values.pool.pool_value_min = min;
        self.values.pool.pool_value_max = max;
        self
    }

    /// Sets both the reserve and the open interest reserve factors.
    pub fn reserve_factors(mut self, long: Factor, short: Factor) -> Self {
        let c = &mut self.values.collateral;
        c.reserve_factor_long = long;
        c.reserve_factor_short = short;
        c.open_interest_reserve_factor_long = long;
        c.open_interest_reserve_factor_short = short;
        self
    }

    pub fn max_open_interest(mut self, long: Usd, short: Usd) -> Self {
        self.values.open_interest.max_open_interest_long = long;
        self.values.open_interest.max_open_interest_short = short;
        self
    }

    pub fn open_interest_usd(mut self, long: Usd, short: Usd) -> Self {
        self.values.open_interest.long_interest_usd = long;
        self.values.open_interest.short_interest_usd = short;
        self
    }

    pub fn open_interest_in_tokens(mut self, long: TokenAmount, short: TokenAmount) -> Self {
        self.values.open_interest.long_interest_in_tokens = long;
        self.values.open_interest.short_interest_in_tokens = short;
        self
    }

    pub fn position_impact(mut self, factors: ImpactFactors) -> Self {
        self.values.position_impact = factors;
        self
    }

    pub fn swap_impact(mut self, factors: ImpactFactors) -> Self {
        self.values.swap_impact = factors;
        self
    }

    pub fn max_position_impact(mut self, positive: Factor, negative: Factor, for_liquidations: Factor) -> Self {
        let m = &mut self.values.max_position_impact;
        m.positive = positive;
        m.negative = negative;
        m.for_liquidations = for_liquidations;
        self
    }

    pub fn swap_impact_pools(mut self, long: TokenAmount, short: TokenAmount) -> Self {
        self.values.impact_pool.swap_impact_pool_amount_long = long;
        self.values.impact_pool.swap_impact_pool_amount_short = short;
        self
    }

    pub fn max_pnl_factors(mut self, long: Factor, short: Factor) -> Self {
        self.values.collateral.max_pnl_factor_for_traders_long = long;
        self.values.collateral.max_pnl_factor_for_traders_short = short;
        self
    }

    pub fn min_collateral_factor(mut self, factor: Factor) -> Self {
        self.values.collateral.min_collateral_factor = factor;
        self
    }

    pub fn min_collateral_factors_for_open_interest(mut self, long: Factor, short: Factor) -> Self {
        self.values.collateral.min_collateral_factor_for_open_interest_long = long;
        self.values.collateral.min_collateral_factor_for_open_interest_short = short;
        self
    }

    /// Position fee factors, positive then negative impact.
    pub fn position_fee_factors(mut self, positive: Factor, negative: Factor) -> Self {
        self.values.fees.position_fee_factor_for_positive_impact = positive;
        self.values.fees.position_fee_factor_for_negative_impact = negative;
        self
    }

    /// Swap fee factors, positive then negative impact.
    pub fn swap_fee_factors(mut self, positive: Factor, negative: Factor) -> Self {
        self.values.fees.swap_fee_factor_for_positive_impact = positive;
        self.values.fees.swap_fee_factor_for_negative_impact = negative;
        self
    }

    pub fn borrowing_factors_per_second(mut self, long: Factor, short: Factor) -> Self {
        self.values.borrowing.borrowing_factor_per_second_long = long;
        self.values.borrowing.borrowing_factor_per_second_short = short;
        self
    }

    pub fn funding(mut self, factor_per_second: Factor, longs_pay_shorts: bool) -> Self {
        self.values.funding.funding_factor_per_second = factor_per_second;
        self.values.funding.longs_pay_shorts = longs_pay_shorts;
        self
    }

    pub fn build(self) -> MarketInfo {
        MarketInfo::new(
            self.market,
            self.index_token,
            self.long_token,
            self.short_token,
            self.values,
        )
    }
}

/// Builder for [`Position`]; a long with zero size by default.
#[derive(Clone, Debug, Default)]
pub struct PositionBuilder {
    position: Position,
}

impl PositionBuilder {
    pub fn new() -> Self {
        Self {
            position: Position {
                key: PositionKey {
                    account: Address::repeat_byte(0xac),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    pub fn account(mut self, account: Address) -> Self {
        self.position.key.account = account;
        self
    }

    pub fn market(mut self, market: Address) -> Self {
        self.position.key.market_address = market;
        self
    }

    pub fn long(mut self, is_long: bool) -> Self {
        self.position.key.is_long = is_long;
        self
    }

    pub fn size(mut self, size_in_usd: Usd, size_in_tokens: TokenAmount) -> Self {
        self.position.size_in_usd = size_in_usd;
        self.position.size_in_tokens = size_in_tokens;
        self
    }

    /// Collateral token and amount.
    pub fn collateral(mut self, token: Address, amount: TokenAmount) -> Self {
        self.position.key.collateral_token_address = token;
        self.position.collateral_amount = amount;
        self
    }

    pub fn borrowing_factor(mut self, factor: Factor) -> Self {
        self.position.borrowing_factor = factor;
        self
    }

    pub fn build(self) -> Position {
        self.position
    }
}
