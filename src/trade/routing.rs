// src/trade/routing.rs
//
// Multi-hop swap routing over the markets' collateral pairs. Paths are
// short and the market set is small, so every simple path is enumerated and
// simulated; nothing is cached between hops.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::error::Result;
use crate::services::liquidity::{get_available_usd_liquidity_for_collateral, get_token_pool_type};
use crate::state::{MarketsInfoData, get_market_info};
use crate::trade::swap::{SwapPathStats, get_swap_path_stats, get_swap_stats};
use crate::types::{Address, Usd};

pub const DEFAULT_MAX_SWAP_PATH_LENGTH: usize = 3;

/// One direction of a market: swap `from` into `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MarketEdge {
    pub market_address: Address,
    pub from: Address,
    pub to: Address,
}

/// Outgoing edges by token.
#[derive(Clone, Debug, Default)]
pub struct MarketsGraph {
    adjacency: HashMap<Address, Vec<MarketEdge>>,
}

impl MarketsGraph {
    pub fn edges_from(&self, token: &Address) -> &[MarketEdge] {
        self.adjacency.get(token).map_or(&[], Vec::as_slice)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Address> {
        self.adjacency.keys()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }
}

/// Both directions of every enabled two-collateral market.
pub fn get_markets_graph(markets: &MarketsInfoData) -> MarketsGraph {
    let mut adjacency: HashMap<Address, Vec<MarketEdge>> = HashMap::new();

    for market in markets.values() {
        if market.is_disabled || market.is_same_collaterals() {
            continue;
        }
        let market_address = market.market_token_address();
        let long = market.long_token.address;
        let short = market.short_token.address;

        adjacency.entry(long).or_default().push(MarketEdge {
            market_address,
            from: long,
            to: short,
        });
        adjacency.entry(short).or_default().push(MarketEdge {
            market_address,
            from: short,
            to: long,
        });
    }

    // HashMap iteration order must not leak into route order.
    for edges in adjacency.values_mut() {
        edges.sort_by_key(|e| e.market_address);
    }

    MarketsGraph { adjacency }
}

/// A candidate path and the liquidity of its thinnest hop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapRoute {
    pub edges: Vec<MarketEdge>,
    pub path: Vec<Address>,
    pub liquidity: Usd,
}

/// Smallest outgoing collateral liquidity along `edges`; 0 if a market is
/// unknown.
pub fn get_max_swap_path_liquidity(markets: &MarketsInfoData, edges: &[MarketEdge]) -> Usd {
    edges
        .iter()
        .map(|edge| {
            markets
                .get(&edge.market_address)
                .and_then(|m| {
                    let side = get_token_pool_type(m, &edge.to)?;
                    Some(get_available_usd_liquidity_for_collateral(m, side.is_long()))
                })
                .unwrap_or(0)
        })
        .min()
        .unwrap_or(0)
}

/// Every simple path of at most `max_depth` hops from `from` to `to`, most
/// liquid first.
///
/// A market appears at most once per path. `None` when `from` has no edges
/// or equals `to`.
pub fn find_all_paths(
    markets: &MarketsInfoData,
    graph: &MarketsGraph,
    from: &Address,
    to: &Address,
    max_depth: usize,
) -> Option<Vec<SwapRoute>> {
    if from == to || graph.edges_from(from).is_empty() {
        return None;
    }

    let mut routes = Vec::new();
    // Explicit stack of (edges so far, markets used so far).
    let mut stack: Vec<(Vec<MarketEdge>, HashSet<Address>)> = graph
        .edges_from(from)
        .iter()
        .rev()
        .map(|e| (vec![*e], HashSet::from([e.market_address])))
        .collect();

    while let Some((edges, used)) = stack.pop() {
        let Some(last) = edges.last() else { continue };

        if last.to == *to {
            let liquidity = get_max_swap_path_liquidity(markets, &edges);
            let path = edges.iter().map(|e| e.market_address).collect();
            routes.push(SwapRoute { edges, path, liquidity });
            continue;
        }
        if edges.len() >= max_depth {
            continue;
        }

        for next in graph.edges_from(&last.to).iter().rev() {
            if used.contains(&next.market_address) {
                continue;
            }
            let mut next_edges = edges.clone();
            next_edges.push(*next);
            let mut next_used = used.clone();
            next_used.insert(next.market_address);
            stack.push((next_edges, next_used));
        }
    }

    // Stable, so equally liquid routes keep discovery order.
    routes.sort_by(|a, b| b.liquidity.cmp(&a.liquidity));
    Some(routes)
}

/// USD out of one hop for `usd_in` in.
pub trait SwapEstimator {
    fn estimate(&self, edge: &MarketEdge, usd_in: Usd) -> Result<Usd>;
}

/// Estimates hops with the full swap-stats calculation.
#[derive(Clone, Copy, Debug)]
pub struct MarketsSwapEstimator<'a> {
    markets: &'a MarketsInfoData,
}

impl<'a> MarketsSwapEstimator<'a> {
    pub fn new(markets: &'a MarketsInfoData) -> Self {
        Self { markets }
    }
}

impl SwapEstimator for MarketsSwapEstimator<'_> {
    fn estimate(&self, edge: &MarketEdge, usd_in: Usd) -> Result<Usd> {
        let market = get_market_info(self.markets, &edge.market_address)?;
        if market.is_disabled {
            return Ok(0);
        }
        let stats = get_swap_stats(market, &edge.from, &edge.to, usd_in, true)?;
        trace!(market = %edge.market_address, usd_in, usd_out = stats.usd_out, "hop estimate");
        Ok(if stats.is_out_liquidity { 0 } else { stats.usd_out })
    }
}

/// Route with the largest simulated output.
///
/// Routes whose simulation fails are skipped; `None` when all of them fail.
/// Ties keep the earlier route.
pub fn get_best_swap_path<'r, E: SwapEstimator + ?Sized>(
    routes: &'r [SwapRoute],
    usd_in: Usd,
    estimator: &E,
) -> Option<&'r SwapRoute> {
    let mut best: Option<(&SwapRoute, Usd)> = None;

    for route in routes {
        let simulated = route
            .edges
            .iter()
            .try_fold(usd_in, |usd, edge| estimator.estimate(edge, usd));
        match simulated {
            Ok(usd_out) => {
                if best.is_none_or(|(_, b)| usd_out > b) {
                    best = Some((route, usd_out));
                }
            }
            Err(err) => debug!(path = ?route.path, error = %err, "skipping swap route"),
        }
    }

    best.map(|(route, _)| route)
}

/// Source of swap paths for order sizing.
pub trait FindSwapPath {
    /// Stats of the chosen path for `usd_in`; `None` when no path exists.
    ///
    /// With `by_liquidity` the most liquid path is taken instead of the one
    /// with the best simulated output.
    fn find_swap_path(&self, usd_in: Usd, by_liquidity: bool) -> Option<SwapPathStats>;
}

impl<F> FindSwapPath for F
where
    F: Fn(Usd, bool) -> Option<SwapPathStats>,
{
    fn find_swap_path(&self, usd_in: Usd, by_liquidity: bool) -> Option<SwapPathStats> {
        self(usd_in, by_liquidity)
    }
}

/// Candidate routes between one token pair.
#[derive(Clone, Debug)]
pub struct SwapRoutes<'a> {
    markets: &'a MarketsInfoData,
    from: Address,
    to: Address,
    routes: Vec<SwapRoute>,
}

impl<'a> SwapRoutes<'a> {
    pub fn new(markets: &'a MarketsInfoData, from: Address, to: Address, max_depth: usize) -> Self {
        let graph = get_markets_graph(markets);
        Self::with_graph(markets, &graph, from, to, max_depth)
    }

    /// Reuse a graph built once for many pairs.
    pub fn with_graph(
        markets: &'a MarketsInfoData,
        graph: &MarketsGraph,
        from: Address,
        to: Address,
        max_depth: usize,
    ) -> Self {
        let routes = find_all_paths(markets, graph, &from, &to, max_depth).unwrap_or_default();
        if routes.is_empty() && from != to {
            debug!(%from, %to, "no swap route");
        }
        Self {
            markets,
            from,
            to,
            routes,
        }
    }

    pub fn routes(&self) -> &[SwapRoute] {
        &self.routes
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn to(&self) -> Address {
        self.to
    }

    /// Most liquid single-market route.
    pub fn direct_path(&self) -> Option<&SwapRoute> {
        self.routes.iter().find(|r| r.edges.len() == 1)
    }

    pub fn max_liquidity_path(&self) -> Option<&SwapRoute> {
        self.routes.first()
    }

    pub fn best_path(&self, usd_in: Usd) -> Option<&SwapRoute> {
        get_best_swap_path(&self.routes, usd_in, &MarketsSwapEstimator::new(self.markets))
    }
}

impl FindSwapPath for SwapRoutes<'_> {
    fn find_swap_path(&self, usd_in: Usd, by_liquidity: bool) -> Option<SwapPathStats> {
        let route = if by_liquidity {
            self.max_liquidity_path()
        } else {
            self.best_path(usd_in).or_else(|| self.direct_path())
        }?;

        match get_swap_path_stats(self.markets, &route.path, &self.from, usd_in, true) {
            Ok(stats) => stats,
            Err(err) => {
                debug!(path = ?route.path, error = %err, "swap path stats failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::math::numbers::PRECISION;
    use crate::state::MarketInfo;
    use crate::testing::{MarketInfoBuilder, TokenBuilder, usd};

    fn token(byte: u8, symbol: &str) -> crate::types::TokenData {
        TokenBuilder::new(byte, symbol).build()
    }

    /// Market between two 1 USD tokens holding `long`/`short` whole tokens.
    fn pair(byte: u8, a: u8, b: u8, long: i128, short: i128) -> MarketInfo {
        MarketInfoBuilder::new(byte, token(a, "A"), token(b, "B"))
            .pool_amounts(long * PRECISION, short * PRECISION)
            .swap_fee_factors(PRECISION / 1_000, PRECISION / 1_000)
            .build()
    }

    fn data(markets: impl IntoIterator<Item = MarketInfo>) -> MarketsInfoData {
        markets.into_iter().map(|m| (m.market_token_address(), m)).collect()
    }

    #[test]
    fn graph_skips_disabled_and_single_collateral_markets() {
        let a = token(1, "A");
        let markets = data([
            pair(0xa1, 1, 2, 10, 10),
            MarketInfoBuilder::new(0xa2, a.clone(), token(3, "C")).disabled().build(),
            MarketInfoBuilder::new(0xa3, a.clone(), a).build(),
        ]);
        let graph = get_markets_graph(&markets);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edges_from(&Address::repeat_byte(1))[0].to, Address::repeat_byte(2));
        assert!(graph.edges_from(&Address::repeat_byte(3)).is_empty());
    }

    #[test]
    fn paths_do_not_reuse_markets_and_respect_depth() {
        // Two parallel A-B markets and one B-C market.
        let markets = data([pair(0xa1, 1, 2, 10, 10), pair(0xa2, 1, 2, 20, 20), pair(0xa3, 2, 3, 10, 10)]);
        let graph = get_markets_graph(&markets);
        let (a, b, c) = (Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3));

        let direct = find_all_paths(&markets, &graph, &a, &b, 3).unwrap();
        assert_eq!(direct.len(), 2);
        assert_eq!(direct[0].path, vec![Address::repeat_byte(0xa2)]);
        assert_eq!(direct[0].liquidity, usd(20));
        assert_eq!(direct[1].liquidity, usd(10));

        assert!(find_all_paths(&markets, &graph, &a, &c, 1).unwrap().is_empty());
        let two_hops = find_all_paths(&markets, &graph, &a, &c, 3).unwrap();
        assert_eq!(two_hops.len(), 2);
        assert!(two_hops.iter().all(|r| r.path.len() == 2 && r.path[1] == Address::repeat_byte(0xa3)));

        assert!(find_all_paths(&markets, &graph, &Address::repeat_byte(9), &a, 3).is_none());
        assert!(find_all_paths(&markets, &graph, &a, &a, 3).is_none());
    }

    #[test]
    fn bottleneck_liquidity_is_the_thinnest_hop() {
        let markets = data([pair(0xa1, 1, 2, 50, 100), pair(0xa2, 2, 3, 100, 7)]);
        let graph = get_markets_graph(&markets);
        let routes =
            find_all_paths(&markets, &graph, &Address::repeat_byte(1), &Address::repeat_byte(3), 3).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].liquidity, usd(7));
    }

    struct Failing;

    impl SwapEstimator for Failing {
        fn estimate(&self, edge: &MarketEdge, usd_in: Usd) -> Result<Usd> {
            if edge.market_address == Address::repeat_byte(0xa1) {
                Err(Error::MarketNotFound(edge.market_address))
            } else {
                Ok(usd_in / 2)
            }
        }
    }

    #[test]
    fn failing_routes_are_skipped() {
        let edge = |m: u8| MarketEdge {
            market_address: Address::repeat_byte(m),
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
        };
        let route = |m: u8| SwapRoute {
            edges: vec![edge(m)],
            path: vec![Address::repeat_byte(m)],
            liquidity: 0,
        };

        let routes = [route(0xa1), route(0xa2)];
        let best = get_best_swap_path(&routes, usd(10), &Failing).unwrap();
        assert_eq!(best.path, vec![Address::repeat_byte(0xa2)]);
        assert!(get_best_swap_path(&routes[..1], usd(10), &Failing).is_none());
        assert!(get_best_swap_path(&[], usd(10), &Failing).is_none());
    }

    #[test]
    fn swap_routes_find_by_liquidity_or_output() {
        let markets = data([pair(0xa1, 1, 2, 1_000, 1_000), pair(0xa2, 1, 2, 5, 5)]);
        let routes = SwapRoutes::new(&markets, Address::repeat_byte(1), Address::repeat_byte(2), 3);

        assert_eq!(routes.direct_path().unwrap().path, vec![Address::repeat_byte(0xa1)]);
        let by_liquidity = routes.find_swap_path(usd(10), true).unwrap();
        assert_eq!(by_liquidity.swap_path, vec![Address::repeat_byte(0xa1)]);
        assert_eq!(by_liquidity.usd_out, usd(10) - usd(10) / 1_000);

        let best = routes.find_swap_path(usd(10), false).unwrap();
        assert_eq!(best.target_market_address, Address::repeat_byte(0xa1));

        let none = SwapRoutes::new(&markets, Address::repeat_byte(1), Address::repeat_byte(9), 3);
        assert!(none.routes().is_empty());
        assert!(none.find_swap_path(usd(10), false).is_none());
    }
}
