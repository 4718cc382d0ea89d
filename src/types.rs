// src/types.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// USD value scaled by `USD_DECIMALS`.
pub type Usd = i128;

/// Token amount in the token's native decimals.
pub type TokenAmount = i128;

/// USD price of one whole token, scaled by `USD_DECIMALS`.
pub type Price = i128;

/// Fixed-point factor scaled by `PRECISION`.
pub type Factor = i128;

/// Basis points (1/10_000).
pub type Bps = i128;

pub type Seconds = i128;

pub type BlockNumber = u64;

/// 20-byte account / contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn repeat_byte(byte: u8) -> Self {
        Self([byte; 20])
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|_| Error::InvalidAddress(s.to_string()))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| Error::InvalidAddress(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Oracle min / max price of a token.
///
/// Buying uses `max_price`, selling uses `min_price`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPrices {
    pub min_price: Price,
    pub max_price: Price,
}

impl TokenPrices {
    pub fn new(min_price: Price, max_price: Price) -> Self {
        Self {
            min_price,
            max_price,
        }
    }

    /// Same price on both sides of the spread.
    pub fn flat(price: Price) -> Self {
        Self::new(price, price)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceType {
    Min,
    Max,
    Mid,
}

/// Static token metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub is_native: bool,
    #[serde(default)]
    pub is_synthetic: bool,
    /// Wrapped counterpart of a native token.
    #[serde(default)]
    pub wrapped_address: Option<Address>,
}

/// Token metadata joined with its current prices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenData {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub is_native: bool,
    pub is_synthetic: bool,
    pub wrapped_address: Option<Address>,
    pub prices: TokenPrices,
    /// Only set for market (LP) tokens.
    pub total_supply: Option<TokenAmount>,
}

impl TokenData {
    pub fn new(token: &Token, prices: TokenPrices) -> Self {
        Self {
            address: token.address,
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            is_native: token.is_native,
            is_synthetic: token.is_synthetic,
            wrapped_address: token.wrapped_address,
            prices,
            total_supply: None,
        }
    }

    pub fn with_total_supply(mut self, total_supply: TokenAmount) -> Self {
        self.total_supply = Some(total_supply);
        self
    }
}

/// Referral tier applied to position fees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralInfo {
    /// Share of the position fee rebated to trader + affiliate.
    pub total_rebate_factor: Factor,
    /// Share of the total rebate that goes to the trader as a discount.
    pub discount_factor: Factor,
}
