//! Liquidation executor.
//!
//! Takes a candidate from the scanner or the block trigger, re-checks that
//! it is still liquidatable, simulates the chosen route, escalates through
//! slippage tiers and then strategies on revert, prices gas by expected
//! profit, submits, and attributes the outcome back to the blacklist and
//! the prepared cache.
//!
//! Per borrower there is at most one execution in flight; the escalation
//! loop lives entirely inside a single attempt — the executor never loops
//! across blocks.

use alloy::primitives::{Address, B256, U256};
use anyhow::Result;
use dashmap::DashSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use liquidator_api::Notifier;
use liquidator_chain::contracts::pool as pool_abi;
use liquidator_chain::{
    apply_gas_multiplier, encode_execute, escalated_slippage_bps, AccountHealth, RpcErrorKind,
    RpcGateway, TierTable, TransactionSender, SLIPPAGE_ESCALATION,
};

use crate::blacklist::Blacklist;
use crate::math;
use crate::prepared::{BuildOutcome, PreparedCache, Preparer};
use crate::tracker::HotTracker;
use crate::types::{Candidate, CandidateState, FailReason, PreparedLiquidation, StrategyKind};

/// What a simulation revert means for the escalation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevertCause {
    /// The position healed; stop quietly.
    Recovered,
    /// Swap could not clear at this tolerance; widen slippage.
    SwapFailed,
    /// Anything else; advance to the next strategy.
    Other,
}

fn classify_revert(reason: &str) -> RevertCause {
    let lower = reason.to_lowercase();
    if lower.contains("health factor") || lower.contains("healthfactor") || lower.contains("'45'")
    {
        return RevertCause::Recovered;
    }
    if lower.contains("swapfailed")
        || lower.contains("swap failed")
        || lower.contains("insufficient output")
        || lower.contains("noreward")
        || lower.contains("no reward")
    {
        return RevertCause::SwapFailed;
    }
    RevertCause::Other
}

/// Primary-swap `minOut` at a given escalation step: the quote-implied bound
/// loosened by the tier, never below what repays the flash source.
fn min_out_for_step(
    expected_out: U256,
    repayment_floor: U256,
    base_slippage_bps: u16,
    step: usize,
) -> U256 {
    let bps = escalated_slippage_bps(base_slippage_bps, step);
    let tolerated = math::apply_bps_down(expected_out, bps);
    tolerated.max(repayment_floor)
}

/// Final outcome of one candidate.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub borrower: Address,
    pub state: CandidateState,
    pub strategy: Option<StrategyKind>,
    pub tx_hash: Option<B256>,
    pub profit_usd: f64,
    pub detail: String,
}

pub struct Executor {
    gateway: Arc<RpcGateway>,
    sender: Arc<TransactionSender>,
    preparer: Arc<Preparer>,
    prepared: Arc<PreparedCache>,
    tracker: Arc<HotTracker>,
    blacklist: Arc<Blacklist>,
    notifier: Arc<dyn Notifier>,
    /// Liquidation contract per pool.
    contracts: HashMap<Address, Address>,
    profit_receiver: Address,
    gas_tiers: TierTable,
    slippage_tiers: TierTable,
    inflight: DashSet<Address>,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<RpcGateway>,
        sender: Arc<TransactionSender>,
        preparer: Arc<Preparer>,
        prepared: Arc<PreparedCache>,
        tracker: Arc<HotTracker>,
        blacklist: Arc<Blacklist>,
        notifier: Arc<dyn Notifier>,
        contracts: HashMap<Address, Address>,
        profit_receiver: Address,
        gas_tiers: TierTable,
        slippage_tiers: TierTable,
    ) -> Self {
        Self {
            gateway,
            sender,
            preparer,
            prepared,
            tracker,
            blacklist,
            notifier,
            contracts,
            profit_receiver,
            gas_tiers,
            slippage_tiers,
            inflight: DashSet::new(),
        }
    }

    /// Run one candidate to a terminal state.
    #[instrument(skip(self, candidate), fields(borrower = %candidate.position.borrower))]
    pub async fn execute(&self, candidate: Candidate) -> ExecutionReport {
        let borrower = candidate.position.borrower;
        let pool = candidate.position.pool;

        if self.blacklist.is_blocked(&borrower) {
            return self.report_skip(borrower, "blacklisted");
        }
        if !self.inflight.insert(borrower) {
            return self.report_skip(borrower, "already in flight");
        }
        let report = self.execute_inner(borrower, pool, candidate).await;
        self.inflight.remove(&borrower);
        report
    }

    async fn execute_inner(
        &self,
        borrower: Address,
        pool: Address,
        candidate: Candidate,
    ) -> ExecutionReport {
        let started = Instant::now();
        let Some(&contract) = self.contracts.get(&pool) else {
            return self.report_skip(borrower, "no liquidation contract for pool");
        };

        // Step 1: freshness gate against the read endpoint.
        match self.read_health(pool, borrower).await {
            Ok(health) if health.health_factor > math::WAD => {
                debug!(borrower = %borrower, "Recovered above HF 1, aborting");
                self.tracker.observe(&crate::types::Position {
                    borrower,
                    pool,
                    health_factor: health.health_factor,
                    total_debt_base: health.total_debt_base,
                    last_observed_block: candidate.position.last_observed_block,
                });
                return ExecutionReport {
                    borrower,
                    state: CandidateState::LostRace,
                    strategy: None,
                    tx_hash: None,
                    profit_usd: 0.0,
                    detail: "recovered".to_string(),
                };
            }
            Ok(_) => {}
            Err(e) => {
                warn!(borrower = %borrower, error = %e, "Freshness read failed");
                return self.report_skip(borrower, "freshness read failed");
            }
        }

        // Step 2: take the prepared fast path or build fresh.
        let (mut plan, fast_path) = match candidate.prepared {
            Some(prepared) => (prepared, true),
            None => match self.build_fresh(borrower, pool, &[]).await {
                Ok(plan) => (plan, false),
                Err(reason) => {
                    self.blacklist.record(borrower, reason);
                    self.notifier
                        .info(&format!(
                            "liquidation rejected for {borrower}: {}",
                            reason.as_str()
                        ))
                        .await;
                    return ExecutionReport {
                        borrower,
                        state: CandidateState::Considered,
                        strategy: None,
                        tx_hash: None,
                        profit_usd: 0.0,
                        detail: reason.as_str().to_string(),
                    };
                }
            },
        };

        // Steps 3-5: simulate, escalating slippage within a strategy and then
        // the strategy itself. The registry is closed, so excluding each
        // failed strategy walks the full priority order and stops when no
        // route remains.
        let mut excluded: Vec<StrategyKind> = Vec::new();
        let mut last_swap_failure = false;

        loop {
            let base_bps = self.base_slippage_bps(&plan);
            let mut advanced = false;

            for step in 0..SLIPPAGE_ESCALATION.len() {
                let calldata = self.encode_with_tier(&plan, contract, base_bps, step);
                match self.simulate(contract, &calldata).await {
                    Ok(()) => {
                        return self
                            .submit(borrower, contract, plan, base_bps, step, started, fast_path)
                            .await;
                    }
                    Err(SimFailure::Revert(reason)) => match classify_revert(&reason) {
                        RevertCause::Recovered => {
                            debug!(borrower = %borrower, "Recovered during simulation");
                            if fast_path {
                                // Stale parameters, not a dead borrower.
                                self.prepared.invalidate(&borrower);
                            }
                            return ExecutionReport {
                                borrower,
                                state: CandidateState::LostRace,
                                strategy: Some(plan.strategy),
                                tx_hash: None,
                                profit_usd: 0.0,
                                detail: "recovered".to_string(),
                            };
                        }
                        RevertCause::SwapFailed => {
                            debug!(
                                borrower = %borrower,
                                step,
                                strategy = plan.strategy.name(),
                                "Swap failed in simulation, widening slippage"
                            );
                            last_swap_failure = true;
                            continue;
                        }
                        RevertCause::Other => {
                            debug!(
                                borrower = %borrower,
                                strategy = plan.strategy.name(),
                                reason = %reason,
                                "Simulation reverted, advancing strategy"
                            );
                            last_swap_failure = false;
                            advanced = true;
                            break;
                        }
                    },
                    Err(SimFailure::Rpc(e)) => {
                        warn!(borrower = %borrower, error = %e, "Simulation RPC failure");
                        return self.report_skip(borrower, "simulation rpc failure");
                    }
                }
            }
            if !advanced {
                // Slippage ladder exhausted on swap failures.
                last_swap_failure = true;
            }

            excluded.push(plan.strategy);
            self.prepared.invalidate(&borrower);
            match self.build_fresh(borrower, pool, &excluded).await {
                Ok(next) => plan = next,
                Err(_) => break,
            }
        }

        // Step 7 (failure side): all routes exhausted.
        let reason = if last_swap_failure {
            FailReason::SwapFailed
        } else {
            FailReason::SimulationRevert
        };
        self.blacklist.record(borrower, reason);
        self.notifier
            .info(&format!(
                "all strategies failed for {borrower}: {}",
                reason.as_str()
            ))
            .await;
        ExecutionReport {
            borrower,
            state: CandidateState::Reverted,
            strategy: None,
            tx_hash: None,
            profit_usd: 0.0,
            detail: reason.as_str().to_string(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit(
        &self,
        borrower: Address,
        contract: Address,
        plan: PreparedLiquidation,
        base_bps: u16,
        step: usize,
        started: Instant,
        fast_path: bool,
    ) -> ExecutionReport {
        // Step 4: price gas by expected profit.
        let multiplier = self.gas_tiers.lookup(plan.estimated_profit_usd);
        let base_gas = match self.gateway.gas_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!(error = %e, "Gas price read failed");
                return self.report_skip(borrower, "gas price read failed");
            }
        };
        let gas_price = apply_gas_multiplier(base_gas, multiplier);
        let calldata = self.encode_with_tier(&plan, contract, base_bps, step);

        info!(
            borrower = %borrower,
            strategy = plan.strategy.name(),
            profit_usd = plan.estimated_profit_usd,
            gas_multiplier = multiplier,
            slippage_step = step,
            fast_path,
            sim_to_submit_ms = started.elapsed().as_millis() as u64,
            "Submitting liquidation"
        );

        // Step 6: broadcast through the tx endpoint and wait for inclusion.
        match self.sender.send(contract, calldata, gas_price).await {
            Ok(tx_hash) => {
                // Step 7: success attribution.
                self.blacklist.purge(&borrower);
                self.prepared.invalidate(&borrower);
                self.tracker.remove(&borrower);
                self.notifier
                    .alert(&format!(
                        "liquidated {borrower} via {} for ~${:.2} ({tx_hash})",
                        plan.strategy.name(),
                        plan.estimated_profit_usd
                    ))
                    .await;
                ExecutionReport {
                    borrower,
                    state: CandidateState::Confirmed,
                    strategy: Some(plan.strategy),
                    tx_hash: Some(tx_hash),
                    profit_usd: plan.estimated_profit_usd,
                    detail: "confirmed".to_string(),
                }
            }
            Err(e) => {
                self.blacklist.record(borrower, FailReason::ExecutionRevert);
                self.prepared.invalidate(&borrower);
                self.notifier
                    .alert(&format!(
                        "liquidation of {borrower} reverted on-chain: {e} (strategy {}; consider wider slippage or a deeper venue)",
                        plan.strategy.name()
                    ))
                    .await;
                ExecutionReport {
                    borrower,
                    state: CandidateState::Reverted,
                    strategy: Some(plan.strategy),
                    tx_hash: None,
                    profit_usd: 0.0,
                    detail: format!("execution revert: {e}"),
                }
            }
        }
    }

    async fn build_fresh(
        &self,
        borrower: Address,
        pool: Address,
        exclude: &[StrategyKind],
    ) -> Result<PreparedLiquidation, FailReason> {
        match self
            .preparer
            .build_one_excluding(borrower, pool, exclude)
            .await
        {
            Ok(BuildOutcome::Ready(plan)) => Ok(plan),
            Ok(BuildOutcome::Rejected(reason)) => Err(reason),
            Err(e) => {
                warn!(borrower = %borrower, error = %e, "Route building failed");
                Err(FailReason::NoStrategy)
            }
        }
    }

    fn base_slippage_bps(&self, plan: &PreparedLiquidation) -> u16 {
        self.slippage_tiers.lookup(plan.debt_to_cover_usd).round() as u16
    }

    fn encode_with_tier(
        &self,
        plan: &PreparedLiquidation,
        _contract: Address,
        base_bps: u16,
        step: usize,
    ) -> alloy::primitives::Bytes {
        let mut primary = plan.primary_swap.clone();
        primary.amount_out_min = min_out_for_step(
            plan.expected_out,
            plan.repayment_floor(),
            base_bps,
            step,
        );
        encode_execute(
            plan.method,
            &plan.params,
            &primary,
            &plan.residual_swap,
            self.profit_receiver,
        )
    }

    async fn simulate(
        &self,
        contract: Address,
        calldata: &alloy::primitives::Bytes,
    ) -> Result<(), SimFailure> {
        let tx = alloy::rpc::types::TransactionRequest::default()
            .to(contract)
            .input(calldata.clone().into());
        match self.gateway.call(&tx).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let text = e.to_string();
                match RpcErrorKind::classify(&text) {
                    RpcErrorKind::Revert(reason) => Err(SimFailure::Revert(reason)),
                    _ => Err(SimFailure::Rpc(text)),
                }
            }
        }
    }

    async fn read_health(&self, pool: Address, borrower: Address) -> Result<AccountHealth> {
        let tx = alloy::rpc::types::TransactionRequest::default()
            .to(pool)
            .input(pool_abi::user_account_data_call(borrower).into());
        let data = self.gateway.call(&tx).await?;
        AccountHealth::decode(&data)
    }

    fn report_skip(&self, borrower: Address, detail: &str) -> ExecutionReport {
        debug!(borrower = %borrower, detail, "Candidate skipped");
        ExecutionReport {
            borrower,
            state: CandidateState::Considered,
            strategy: None,
            tx_hash: None,
            profit_usd: 0.0,
            detail: detail.to_string(),
        }
    }
}

enum SimFailure {
    Revert(String),
    Rpc(String),
}
