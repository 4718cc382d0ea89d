use crate::state::OrderType;
use crate::types::Address;

/// Errors surfaced by single-item calculations.
///
/// Batch builders never return these; they log and skip the failing item.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("market not found: {0}")]
    MarketNotFound(Address),

    #[error("token not found: {0}")]
    TokenNotFound(Address),

    #[error("price not found for token {0}")]
    MissingPrice(Address),

    #[error("market values not found: {0}")]
    MarketValuesNotFound(Address),

    #[error("negative pool amount after delta, long: {next_long_usd}, short: {next_short_usd}")]
    NegativePoolAmount {
        next_long_usd: i128,
        next_short_usd: i128,
    },

    #[error("invalid tokens to swap in market {market}: {token_a} -> {token_b}")]
    InvalidSwapTokens {
        market: Address,
        token_a: Address,
        token_b: Address,
    },

    #[error("token {token} is not a collateral of market {market}")]
    NotMarketCollateral { market: Address, token: Address },

    #[error("invalid trigger order type: {0:?}")]
    InvalidTriggerOrderType(OrderType),

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid position key: {0}")]
    InvalidPositionKey(String),

    #[error("environment configuration error: {0}")]
    Config(#[from] envy::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
