//! Adaptive close-fraction sizing.
//!
//! A fixed ladder of close fractions is evaluated bottom-up; evaluation
//! stops at the first non-profitable rung (slippage grows with size, so a
//! smaller rung is never worse than a losing bigger one). Among profitable
//! rungs the one maximizing profit per gas unit wins; the gas estimate is
//! shared across rungs, so this is profit ordering in practice.

use alloy::primitives::U256;
use tracing::debug;

use crate::math;
use crate::strategy::StrategyPlan;
use crate::types::FailReason;

/// One evaluated ladder rung.
#[derive(Debug, Clone)]
pub struct SizedCandidate {
    pub fraction_pct: u8,
    pub debt_to_cover: U256,
    pub expected_collateral: U256,
    pub plan: StrategyPlan,
    pub profit_usd: f64,
}

impl SizedCandidate {
    pub fn profit_per_gas(&self, gas_units: u64) -> f64 {
        if gas_units == 0 {
            return self.profit_usd;
        }
        self.profit_usd / gas_units as f64
    }
}

/// Net profit of a routed liquidation in USD: what the primary swap returns
/// beyond flash repayment, minus the gas budget. Fee-model costs are already
/// inside `expected_out` and the repayment floor.
pub fn plan_profit_usd(
    plan: &StrategyPlan,
    debt_to_cover: U256,
    debt_price: U256,
    debt_decimals: u8,
    gas_cost_usd: f64,
) -> f64 {
    let repayment =
        debt_to_cover + debt_to_cover * U256::from(plan.flash_fee_bps) / U256::from(10_000u64);
    let margin_usd = if plan.expected_out > repayment {
        math::token_value_usd(plan.expected_out - repayment, debt_price, debt_decimals)
    } else {
        -math::token_value_usd(repayment - plan.expected_out, debt_price, debt_decimals)
    };
    margin_usd - gas_cost_usd
}

/// Walk the ladder with `eval`, which routes and prices one fraction.
/// Returns the winning candidate, or the failure reason for attribution:
/// `NoStrategy` when no rung could be routed at all, `NoProfitableSize` when
/// every evaluated rung lost money.
pub fn pick_size(
    ladder: &[u8],
    gas_units: u64,
    mut eval: impl FnMut(u8) -> Option<SizedCandidate>,
) -> Result<SizedCandidate, FailReason> {
    let mut best: Option<SizedCandidate> = None;
    let mut routed_any = false;

    for &fraction in ladder {
        let Some(candidate) = eval(fraction) else {
            continue;
        };
        routed_any = true;
        debug!(
            fraction_pct = fraction,
            strategy = candidate.plan.kind.name(),
            profit_usd = candidate.profit_usd,
            "Ladder rung evaluated"
        );

        if candidate.profit_usd <= 0.0 {
            // Slippage only grows from here; larger rungs cannot recover.
            break;
        }

        let better = match &best {
            None => true,
            Some(current) => {
                candidate.profit_per_gas(gas_units) > current.profit_per_gas(gas_units)
            }
        };
        if better {
            best = Some(candidate);
        }
    }

    match best {
        Some(candidate) => Ok(candidate),
        None if routed_any => Err(FailReason::NoProfitableSize),
        None => Err(FailReason::NoStrategy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyKind;
    use alloy::primitives::{Address, Bytes};
    use liquidator_chain::{ContractMethod, SwapKind, SwapLeg};

    const PRICE_ONE: u64 = 100_000_000;

    fn plan(expected_out: u64) -> StrategyPlan {
        let leg = SwapLeg {
            kind: SwapKind::V2,
            router: Address::ZERO,
            path: Bytes::new(),
            amount_in: U256::ZERO,
            amount_out_min: U256::ZERO,
        };
        StrategyPlan {
            kind: StrategyKind::V2DirectOverAaveFlash,
            method: ContractMethod::FlashPool,
            primary: leg.clone(),
            residual: leg,
            flash_fee_bps: 5,
            swap_fee_bps: 30,
            expected_out: U256::from(expected_out),
        }
    }

    fn candidate(fraction: u8, profit_usd: f64) -> SizedCandidate {
        SizedCandidate {
            fraction_pct: fraction,
            debt_to_cover: U256::from(fraction as u64 * 10_000_000),
            expected_collateral: U256::ZERO,
            plan: plan(0),
            profit_usd,
        }
    }

    #[test]
    fn test_plan_profit_math() {
        // 6-dp debt at $1: out 525.8, repay 500.5 * 1.0005 = 500.750250
        let profit = plan_profit_usd(
            &plan(525_800_000),
            U256::from(500_500_000u64),
            U256::from(PRICE_ONE),
            6,
            0.05,
        );
        assert!((profit - (25.04975 - 0.05)).abs() < 1e-6);

        // Output below repayment goes negative
        let loss = plan_profit_usd(
            &plan(400_000_000),
            U256::from(500_500_000u64),
            U256::from(PRICE_ONE),
            6,
            0.05,
        );
        assert!(loss < 0.0);
    }

    #[test]
    fn test_middle_rung_wins() {
        // 10% -> +1.5, 25% -> +4, 50% -> -2: the 50% rung is evaluated but
        // loses; 25% has the best profit.
        let outcomes = [(10u8, 1.5), (25, 4.0), (50, -2.0)];
        let picked = pick_size(&[10, 25, 50], 1_900_000, |fraction| {
            outcomes
                .iter()
                .find(|(f, _)| *f == fraction)
                .map(|(f, p)| candidate(*f, *p))
        })
        .unwrap();
        assert_eq!(picked.fraction_pct, 25);
    }

    #[test]
    fn test_stops_at_first_unprofitable_rung() {
        let mut evaluated = Vec::new();
        let result = pick_size(&[10, 25, 50], 1_900_000, |fraction| {
            evaluated.push(fraction);
            Some(candidate(fraction, if fraction == 10 { -0.5 } else { 99.0 }))
        });
        // 10% lost money, so 25% and 50% were never priced.
        assert_eq!(evaluated, vec![10]);
        assert_eq!(result.unwrap_err(), FailReason::NoProfitableSize);
    }

    #[test]
    fn test_unroutable_rungs_are_skipped() {
        // 10% cannot be routed (below some venue minimum), 25% can.
        let picked = pick_size(&[10, 25, 50], 1_900_000, |fraction| {
            (fraction >= 25).then(|| candidate(fraction, fraction as f64))
        })
        .unwrap();
        assert_eq!(picked.fraction_pct, 50);
    }

    #[test]
    fn test_nothing_routable_is_no_strategy() {
        let result = pick_size(&[10, 25, 50], 1_900_000, |_| None);
        assert_eq!(result.unwrap_err(), FailReason::NoStrategy);
    }

    /// Stable-stable happy path, end to end through math, routing and
    /// sizing: 1000 units of 6-dp debt at HF 0.95, both prices $1, 5% bonus,
    /// deep stable pool.
    #[test]
    fn test_stable_happy_path() {
        use crate::math;
        use crate::strategy::{StrategyCtx, StrategyRegistry, VenueBook};
        use liquidator_chain::{PoolRef, Quote, Venue};

        let collateral = Address::repeat_byte(0x01);
        let debt = Address::repeat_byte(0x02);
        let price = U256::from(PRICE_ONE);

        // 50% close of 1000 debt units with the 10 bps interest buffer.
        let debt_to_cover =
            math::close_amount(U256::from(1_000_000_000u64), 50, 10, U256::MAX);
        assert_eq!(debt_to_cover, U256::from(500_500_000u64));

        let seized =
            math::expected_collateral(debt_to_cover, price, price, 10_500, 6, 6, 99);
        assert_eq!(seized, U256::from(520_269_750u64));

        let pool = PoolRef {
            venue: Venue::Stable,
            address: Address::repeat_byte(0x50),
            token0: collateral,
            token1: debt,
            fee_micro: 400,
            index0: 0,
            index1: 1,
        };
        let book = VenueBook {
            stable_pool: Some(pool),
            stable_quote: Some(Quote {
                venue: Venue::Stable,
                pool: pool.address,
                amount_in: seized,
                amount_out: U256::from(525_800_000u64),
                fee_bps: 4,
            }),
            ..Default::default()
        };
        let ctx = StrategyCtx {
            borrower: Address::repeat_byte(0xB0),
            collateral,
            debt,
            collateral_is_stable: true,
            debt_is_stable: true,
            collateral_decimals: 6,
            debt_decimals: 6,
            collateral_price: price,
            debt_price: price,
            debt_to_cover,
            expected_collateral: seized,
            v2_router: Address::repeat_byte(0xD2),
            v3_router: Address::repeat_byte(0xD3),
            book: &book,
        };

        let plan = StrategyRegistry::standard().best(&ctx).unwrap();
        assert_eq!(plan.kind, StrategyKind::StableKittyOverAaveFlash);
        // Flash repayment floor: debtToCover plus the 5 bps flash fee.
        assert_eq!(plan.primary.amount_out_min, U256::from(500_750_250u64));

        let profit = plan_profit_usd(&plan, debt_to_cover, price, 6, 0.05);
        assert!(profit > 24.0 && profit < 26.0);
    }
}
