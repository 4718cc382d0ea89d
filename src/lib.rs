//! Trade and pool math for a perpetual-futures / spot exchange.
//!
//! # Overview
//!
//! Pure, synchronous calculations over market snapshots handed in as plain
//! data: price impact, fees, pool liquidity, position sizing, liquidation
//! prices and multi-hop swap routing.
//!
//! Build [`state::MarketInfo`] with [`state::build_markets_info`], then use
//! [`trade::increase`], [`trade::decrease`] and [`trade::swap`] to size
//! orders, or [`trade::routing`] to pick a swap path.
//!
//! All values are fixed-point `i128`: USD and prices at 18 decimals
//! ([`math::numbers::USD_DECIMALS`]), token amounts at the token's own
//! decimals, factors at [`math::numbers::PRECISION`].
//!
//! # Testing
//!
//! [`testing`] provides builders for tokens, markets and positions.

pub mod config;
pub mod error;
pub mod math;
pub mod risk;
pub mod services;
pub mod state;
pub mod testing;
pub mod trade;
pub mod types;

pub use error::{Error, Result};
