use std::collections::HashMap;

use tracing::warn;

use crate::error::{Error, Result};
use crate::types::{Address, Token, TokenData, TokenPrices};

pub type TokenPricesData = HashMap<Address, TokenPrices>;

/// Priced tokens keyed by address.
#[derive(Clone, Debug, Default)]
pub struct TokensData {
    tokens: HashMap<Address, TokenData>,
}

impl TokensData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join static token metadata with prices.
    ///
    /// Tokens without a price are dropped.
    pub fn build(tokens: &[Token], prices: &TokenPricesData) -> Self {
        let mut data = Self::new();
        for token in tokens {
            match prices.get(&token.address) {
                Some(p) => data.insert(TokenData::new(token, *p)),
                None => warn!(token = %token.address, symbol = %token.symbol, "no price for token, skipping"),
            }
        }
        data
    }

    pub fn insert(&mut self, token: TokenData) {
        self.tokens.insert(token.address, token);
    }

    pub fn get(&self, address: &Address) -> Option<&TokenData> {
        self.tokens.get(address)
    }

    pub fn require(&self, address: &Address) -> Result<&TokenData> {
        self.get(address).ok_or(Error::TokenNotFound(*address))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &TokenData)> {
        self.tokens.iter()
    }
}

impl FromIterator<TokenData> for TokensData {
    fn from_iter<I: IntoIterator<Item = TokenData>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().map(|t| (t.address, t)).collect(),
        }
    }
}
