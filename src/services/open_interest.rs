// src/services/open_interest.rs

use crate::types::Usd;

/// Long / short USD on the two sides of an imbalance, open interest for
/// positions or pool value for swaps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenInterestSnapshot {
    pub long_usd: Usd,
    pub short_usd: Usd,
}

/// Balance before and after a hypothetical trade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenInterestParams {
    pub current: OpenInterestSnapshot,
    pub next: OpenInterestSnapshot,
}

impl OpenInterestParams {
    /// Add `usd_delta` to one side of the current open interest.
    pub fn for_delta(current_long: Usd, current_short: Usd, usd_delta: Usd, is_long: bool) -> Self {
        let current = OpenInterestSnapshot {
            long_usd: current_long,
            short_usd: current_short,
        };
        let mut next = current;
        if is_long {
            next.long_usd = current_long + usd_delta;
        } else {
            next.short_usd = current_short + usd_delta;
        }
        Self { current, next }
    }

    /// Same as [`Self::for_delta`] against the signed cross-market inventory.
    ///
    /// A positive inventory is net short exposure, a negative one net long.
    /// A negative delta first lifts both sides so that neither goes below
    /// zero.
    pub fn for_virtual_inventory(virtual_inventory: Usd, usd_delta: Usd, is_long: bool) -> Self {
        let (mut long, mut short) = if virtual_inventory > 0 {
            (0, virtual_inventory)
        } else {
            (-virtual_inventory, 0)
        };

        if usd_delta < 0 {
            let offset = -usd_delta;
            long += offset;
            short += offset;
        }

        Self::for_delta(long, short, usd_delta, is_long)
    }

    /// Two independent deltas, one per side (swaps move both pools).
    pub fn for_pool_deltas(long_usd: Usd, short_usd: Usd, long_delta: Usd, short_delta: Usd) -> Self {
        Self {
            current: OpenInterestSnapshot { long_usd, short_usd },
            next: OpenInterestSnapshot {
                long_usd: long_usd + long_delta,
                short_usd: short_usd + short_delta,
            },
        }
    }
}
