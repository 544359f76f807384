//! Core domain types shared across the pipeline.

use alloy::primitives::{Address, U256};
use std::time::Instant;

use liquidator_chain::{ContractMethod, ExecuteParams, SwapLeg};

use crate::math;

/// Health factor band below which a position is tracked as warm.
pub const WARM_HF: f64 = 1.10;

/// Band below which a prepared liquidation is built in the background.
pub const PREPARE_HF: f64 = 1.05;

/// A borrower's position as observed by one scan. Replaced wholesale by the
/// next observation, never mutated in place.
#[derive(Debug, Clone)]
pub struct Position {
    pub borrower: Address,
    pub pool: Address,
    /// Health factor in WAD.
    pub health_factor: U256,
    /// Total debt in the oracle numeraire (8 fractional digits).
    pub total_debt_base: U256,
    pub last_observed_block: u64,
}

impl Position {
    pub fn hf(&self) -> f64 {
        math::wad_to_f64(self.health_factor)
    }

    /// HF at or below one with outstanding debt.
    pub fn is_liquidatable(&self) -> bool {
        !self.health_factor.is_zero()
            && self.health_factor <= math::WAD
            && !self.total_debt_base.is_zero()
    }

    pub fn is_warm(&self) -> bool {
        let hf = self.hf();
        (1.0..WARM_HF).contains(&hf)
    }

    pub fn debt_usd(&self) -> f64 {
        math::base_to_usd(self.total_debt_base)
    }

    /// Warm-cohort ordering key: bigger and closer to the edge first.
    pub fn priority_score(&self) -> f64 {
        let hf = self.hf();
        if hf <= 0.0 {
            return 0.0;
        }
        self.debt_usd() / hf
    }
}

/// Scan output split by health.
#[derive(Debug, Default)]
pub struct ScanCohorts {
    /// `0 < HF <= 1`, sorted by total debt descending.
    pub liquidatable: Vec<Position>,
    /// `1 <= HF < 1.10` above the debt floor, sorted by priority score.
    pub warm: Vec<Position>,
    /// Everything observed, for statistics.
    pub scanned: usize,
}

/// The closed set of liquidation strategies, tried in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    StableKittyOverAaveFlash,
    StableKittyOverV3Flash,
    V2FlashSwap,
    V3Flash,
    V2DirectOverAaveFlash,
    V3DirectOverAaveFlash,
    AggregatorOverAaveFlash,
}

impl StrategyKind {
    /// Ascending priority; lower is tried first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::StableKittyOverAaveFlash => 1,
            Self::StableKittyOverV3Flash => 2,
            Self::V2FlashSwap => 3,
            Self::V3Flash => 4,
            Self::V2DirectOverAaveFlash => 5,
            Self::V3DirectOverAaveFlash => 6,
            Self::AggregatorOverAaveFlash => 99,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StableKittyOverAaveFlash => "stable-kitty/aave-flash",
            Self::StableKittyOverV3Flash => "stable-kitty/v3-flash",
            Self::V2FlashSwap => "v2-flash-swap",
            Self::V3Flash => "v3-flash",
            Self::V2DirectOverAaveFlash => "v2-direct/aave-flash",
            Self::V3DirectOverAaveFlash => "v3-direct/aave-flash",
            Self::AggregatorOverAaveFlash => "aggregator/aave-flash",
        }
    }
}

/// Why an attempt failed; drives blacklist attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    NoStrategy,
    NoProfitableSize,
    SimulationRevert,
    ExecutionRevert,
    SwapFailed,
    NegativeReward,
}

impl FailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoStrategy => "no-strategy",
            Self::NoProfitableSize => "no-profitable-size",
            Self::SimulationRevert => "simulation-revert",
            Self::ExecutionRevert => "execution-revert",
            Self::SwapFailed => "swap-failed",
            Self::NegativeReward => "negative-reward",
        }
    }
}

/// Fully-built liquidation, ready to encode and submit within one
/// block-handler activation.
#[derive(Debug, Clone)]
pub struct PreparedLiquidation {
    pub borrower: Address,
    pub pool: Address,
    pub strategy: StrategyKind,
    pub method: ContractMethod,
    pub params: ExecuteParams,
    pub primary_swap: SwapLeg,
    pub residual_swap: SwapLeg,
    pub expected_collateral: U256,
    /// Debt units expected back from the primary swap.
    pub expected_out: U256,
    /// Flash-source fee share of the fee model, in basis points.
    pub flash_fee_bps: u32,
    /// Swap notional, for the slippage tier lookup.
    pub debt_to_cover_usd: f64,
    pub estimated_profit_usd: f64,
    pub created_at: Instant,
}

impl PreparedLiquidation {
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Flash repayment floor the primary swap must clear.
    pub fn repayment_floor(&self) -> U256 {
        self.params.debt_to_cover
            + self.params.debt_to_cover * U256::from(self.flash_fee_bps) / U256::from(10_000u64)
    }
}

/// Candidate handed to the executor.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub position: Position,
    pub prepared: Option<PreparedLiquidation>,
}

/// Executor state machine, terminal states drive attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    Considered,
    Simulated,
    Submitted,
    Confirmed,
    Reverted,
    LostRace,
}
