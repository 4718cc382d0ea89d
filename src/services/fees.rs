// src/services/fees.rs

use crate::math::numbers::{apply_factor, get_basis_points};
use crate::state::MarketInfo;
use crate::types::{Address, Bps, Factor, ReferralInfo, Usd};

/// Fee factor times `amount`; the positive-impact factor applies when the
/// accompanying price impact is positive.
///
/// `amount` may be USD or a token amount, the result is in the same unit.
pub fn get_swap_fee(market: &MarketInfo, amount: i128, for_positive_impact: bool) -> i128 {
    let factor = if for_positive_impact {
        market.fees.swap_fee_factor_for_positive_impact
    } else {
        market.fees.swap_fee_factor_for_negative_impact
    };
    apply_factor(amount, factor)
}

/// Position fee split after referral discount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PositionFee {
    /// Fee after the trader discount.
    pub position_fee_usd: Usd,
    pub discount_usd: Usd,
    pub total_rebate_usd: Usd,
    pub ui_fee_usd: Usd,
}

pub fn get_position_fee(
    market: &MarketInfo,
    size_delta_usd: Usd,
    for_positive_impact: bool,
    referral: Option<&ReferralInfo>,
    ui_fee_factor: Factor,
) -> PositionFee {
    let factor = if for_positive_impact {
        market.fees.position_fee_factor_for_positive_impact
    } else {
        market.fees.position_fee_factor_for_negative_impact
    };
    let position_fee_usd = apply_factor(size_delta_usd, factor);
    let ui_fee_usd = apply_factor(size_delta_usd, ui_fee_factor);

    let Some(referral) = referral else {
        return PositionFee {
            position_fee_usd,
            ui_fee_usd,
            ..Default::default()
        };
    };

    let total_rebate_usd = apply_factor(position_fee_usd, referral.total_rebate_factor);
    let discount_usd = apply_factor(total_rebate_usd, referral.discount_factor);

    PositionFee {
        position_fee_usd: position_fee_usd - discount_usd,
        discount_usd,
        total_rebate_usd,
        ui_fee_usd,
    }
}

/// A signed USD fee and its size relative to some basis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeItem {
    pub delta_usd: Usd,
    pub bps: Bps,
}

pub fn get_fee_item(fee_delta_usd: Option<Usd>, basis_usd: Option<Usd>, should_round_up: bool) -> Option<FeeItem> {
    let delta_usd = fee_delta_usd?;
    let bps = match basis_usd {
        Some(basis) if basis > 0 => get_basis_points(delta_usd, basis, should_round_up),
        _ => 0,
    };
    Some(FeeItem { delta_usd, bps })
}

/// Sum of the present items.
pub fn get_total_fee_item<'a>(items: impl IntoIterator<Item = Option<&'a FeeItem>>) -> FeeItem {
    items.into_iter().flatten().fold(FeeItem::default(), |acc, item| FeeItem {
        delta_usd: acc.delta_usd + item.delta_usd,
        bps: acc.bps + item.bps,
    })
}

/// Swap fee of a single hop as a fee item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapFeeItem {
    pub market_address: Address,
    pub token_in_address: Address,
    pub token_out_address: Address,
    pub delta_usd: Usd,
    pub bps: Bps,
}

/// What a single hop contributes to trade fees.
pub trait SwapStep {
    fn usd_in(&self) -> Usd;
    fn swap_fee_usd(&self) -> Usd;
    fn fee_item(&self) -> SwapFeeItem;
}

pub fn get_total_swap_volume<S: SwapStep>(steps: &[S]) -> Usd {
    steps.iter().map(SwapStep::usd_in).sum()
}

/// Inputs of [`get_trade_fees`]; fees are positive costs, impacts signed.
#[derive(Clone, Copy, Debug, Default)]
pub struct TradeFeesParams {
    pub initial_collateral_usd: Usd,
    pub size_delta_usd: Usd,
    pub position_fee_usd: Usd,
    pub fee_discount_usd: Usd,
    pub swap_price_impact_delta_usd: Usd,
    pub position_price_impact_delta_usd: Usd,
    pub price_impact_diff_usd: Usd,
    pub borrowing_fee_usd: Usd,
    pub funding_fee_usd: Usd,
    pub swap_profit_fee_usd: Usd,
    pub ui_fee_factor: Factor,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TradeFees {
    /// Every fee and impact, including positive position impact.
    pub total_fees: FeeItem,
    /// Only what is actually paid out of collateral.
    pub pay_total_fees: FeeItem,
    pub swap_fees: Vec<SwapFeeItem>,
    pub swap_profit_fee: FeeItem,
    pub swap_price_impact: FeeItem,
    pub position_fee_before_discount: FeeItem,
    pub position_fee: FeeItem,
    pub fee_discount_usd: Usd,
    pub position_price_impact: FeeItem,
    pub price_impact_diff: FeeItem,
    pub borrowing_fee: FeeItem,
    pub funding_fee: FeeItem,
    pub ui_fee: FeeItem,
    pub ui_swap_fee: FeeItem,
}

/// Compose every fee of a trade into display items with their totals.
pub fn get_trade_fees<S: SwapStep>(p: &TradeFeesParams, swap_steps: &[S]) -> TradeFees {
    let collateral = Some(p.initial_collateral_usd);
    let size = Some(p.size_delta_usd);
    let item = |delta: Usd, basis: Option<Usd>, round_up: bool| {
        get_fee_item(Some(delta), basis, round_up).unwrap_or_default()
    };

    let swap_fees: Vec<SwapFeeItem> = if p.initial_collateral_usd > 0 {
        swap_steps.iter().map(SwapStep::fee_item).collect()
    } else {
        Vec::new()
    };

    let total_swap_volume = get_total_swap_volume(swap_steps);
    let ui_fee_usd = apply_factor(p.size_delta_usd, p.ui_fee_factor);
    let ui_swap_fee_usd = apply_factor(total_swap_volume, p.ui_fee_factor);

    let swap_profit_fee = item(-p.swap_profit_fee_usd, collateral, false);
    let swap_price_impact = item(p.swap_price_impact_delta_usd, collateral, false);
    let ui_fee = item(-ui_fee_usd, size, true);
    let ui_swap_fee = item(-ui_swap_fee_usd, collateral, true);
    let position_fee_before_discount = item(-(p.position_fee_usd + p.fee_discount_usd), size, false);
    let position_fee = item(-p.position_fee_usd, size, false);
    let borrowing_fee = item(-p.borrowing_fee_usd, collateral, false);
    let funding_fee = item(-p.funding_fee_usd, collateral, false);
    let position_price_impact = item(p.position_price_impact_delta_usd, size, false);
    let price_impact_diff = item(-p.price_impact_diff_usd, size, false);

    let swap_fee_items: Vec<FeeItem> = swap_fees
        .iter()
        .map(|f| FeeItem {
            delta_usd: f.delta_usd,
            bps: f.bps,
        })
        .collect();

    let common = [
        &swap_profit_fee,
        &swap_price_impact,
        &position_fee,
        &borrowing_fee,
        &funding_fee,
        &ui_fee,
        &ui_swap_fee,
    ];

    let total_fees = get_total_fee_item(
        swap_fee_items
            .iter()
            .chain(common)
            .chain([&position_price_impact, &price_impact_diff])
            .map(Some),
    );

    let negative_position_impact = (position_price_impact.delta_usd < 0).then_some(&position_price_impact);
    let pay_total_fees = get_total_fee_item(
        swap_fee_items
            .iter()
            .chain(common)
            .map(Some)
            .chain([negative_position_impact, Some(&price_impact_diff)]),
    );

    TradeFees {
        total_fees,
        pay_total_fees,
        swap_fees,
        swap_profit_fee,
        swap_price_impact,
        position_fee_before_discount,
        position_fee,
        fee_discount_usd: p.fee_discount_usd,
        position_price_impact,
        price_impact_diff,
        borrowing_fee,
        funding_fee,
        ui_fee,
        ui_swap_fee,
    }
}

/// Net negative price impact at or above `threshold_bps`.
pub fn get_is_high_price_impact(
    position_price_impact: Option<&FeeItem>,
    swap_price_impact: Option<&FeeItem>,
    threshold_bps: Bps,
) -> bool {
    let total = get_total_fee_item([position_price_impact, swap_price_impact]);
    total.delta_usd < 0 && total.bps.abs() >= threshold_bps
}

/// Costs settled on a decrease, as positive USD.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecreaseFees {
    pub position_fee_usd: Usd,
    pub borrowing_fee_usd: Usd,
    pub funding_fee_usd: Usd,
    pub swap_profit_fee_usd: Usd,
    pub swap_ui_fee_usd: Usd,
    pub ui_fee_usd: Usd,
    /// Signed realized pnl; only a loss counts.
    pub pnl_usd: Usd,
    /// Signed position impact; only a negative impact counts.
    pub price_impact_delta_usd: Usd,
    pub price_impact_diff_usd: Usd,
}

pub fn get_total_fees_usd_for_decrease(f: &DecreaseFees) -> Usd {
    let negative_pnl = (-f.pnl_usd).max(0);
    let negative_impact = (-f.price_impact_delta_usd).max(0);
    f.position_fee_usd
        + f.borrowing_fee_usd
        + f.funding_fee_usd
        + f.swap_profit_fee_usd
        + f.swap_ui_fee_usd
        + f.ui_fee_usd
        + negative_pnl
        + negative_impact
        + f.price_impact_diff_usd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::numbers::PRECISION;
    use crate::testing::{MarketInfoBuilder, usd};

    fn market() -> MarketInfo {
        MarketInfoBuilder::eth_usdc()
            .position_fee_factors(PRECISION / 2_000, PRECISION * 7 / 10_000)
            .swap_fee_factors(PRECISION / 2_000, PRECISION * 7 / 10_000)
            .build()
    }

    struct Hop(Usd, Usd);

    impl SwapStep for Hop {
        fn usd_in(&self) -> Usd {
            self.0
        }
        fn swap_fee_usd(&self) -> Usd {
            self.1
        }
        fn fee_item(&self) -> SwapFeeItem {
            SwapFeeItem {
                delta_usd: -self.1,
                bps: get_basis_points(-self.1, self.0, false),
                ..Default::default()
            }
        }
    }

    #[test]
    fn position_fee_factor_follows_impact_sign() {
        let m = market();
        let fee = get_position_fee(&m, usd(10_000), true, None, 0);
        assert_eq!(fee.position_fee_usd, usd(5));
        let fee = get_position_fee(&m, usd(10_000), false, None, 0);
        assert_eq!(fee.position_fee_usd, usd(7));
        assert_eq!(get_swap_fee(&m, usd(10_000), false), usd(7));
    }

    #[test]
    fn referral_discount_is_a_share_of_the_rebate() {
        let m = market();
        let referral = ReferralInfo {
            total_rebate_factor: PRECISION / 10,
            discount_factor: PRECISION / 2,
        };
        let fee = get_position_fee(&m, usd(10_000), false, Some(&referral), PRECISION / 10_000);

        assert_eq!(fee.total_rebate_usd, usd(7) / 10);
        assert_eq!(fee.discount_usd, usd(7) / 20);
        assert_eq!(fee.position_fee_usd, usd(7) - usd(7) / 20);
        assert_eq!(fee.ui_fee_usd, usd(1));
    }

    #[test]
    fn fee_items_and_totals() {
        assert_eq!(get_fee_item(None, Some(usd(1)), false), None);
        assert_eq!(
            get_fee_item(Some(-usd(1)), Some(usd(3)), true),
            Some(FeeItem {
                delta_usd: -usd(1),
                bps: -3334
            })
        );
        assert_eq!(get_fee_item(Some(usd(1)), Some(0), false).unwrap().bps, 0);

        let a = FeeItem { delta_usd: 3, bps: 1 };
        let b = FeeItem { delta_usd: -5, bps: -2 };
        assert_eq!(
            get_total_fee_item([Some(&a), None, Some(&b)]),
            FeeItem { delta_usd: -2, bps: -1 }
        );
    }

    #[test]
    fn pay_total_leaves_out_positive_impact() {
        let p = TradeFeesParams {
            initial_collateral_usd: usd(1_000),
            size_delta_usd: usd(10_000),
            position_fee_usd: usd(7),
            position_price_impact_delta_usd: usd(3),
            ..Default::default()
        };
        let fees = get_trade_fees(&p, &[Hop(usd(1_000), usd(1))]);

        assert_eq!(fees.swap_fees.len(), 1);
        assert_eq!(fees.total_fees.delta_usd, -usd(7) - usd(1) + usd(3));
        assert_eq!(fees.pay_total_fees.delta_usd, -usd(7) - usd(1));
    }

    #[test]
    fn high_impact_needs_a_net_loss_over_threshold() {
        let pos = FeeItem { delta_usd: -usd(90), bps: -90 };
        let swap = FeeItem { delta_usd: usd(20), bps: 20 };
        assert!(get_is_high_price_impact(Some(&pos), None, 80));
        assert!(!get_is_high_price_impact(Some(&pos), Some(&swap), 80));
        assert!(!get_is_high_price_impact(None, Some(&swap), 10));
    }

    #[test]
    fn decrease_costs_count_only_losses() {
        let f = DecreaseFees {
            position_fee_usd: usd(7),
            borrowing_fee_usd: usd(2),
            pnl_usd: -usd(10),
            price_impact_delta_usd: usd(4),
            price_impact_diff_usd: usd(1),
            ..Default::default()
        };
        assert_eq!(get_total_fees_usd_for_decrease(&f), usd(20));
    }
}
