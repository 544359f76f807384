//! Core liquidation pipeline.
//!
//! This crate provides:
//! - Asset registry resolved from the protocol data provider
//! - Price and reserve-config caches with batched refresh
//! - Hot-position tracking over the warm health-factor band
//! - Prepared-liquidation cache with background batched preparation
//! - Strategy registry routing over stable, V2 and V3 venues
//! - Adaptive close-fraction sizing
//! - Full scanner, block trigger, executor and coordinator

mod assets;
mod blacklist;
mod caches;
pub mod config;
mod coordinator;
mod executor;
pub mod math;
mod prepared;
mod scanner;
mod sizer;
mod strategy;
mod tracker;
mod trigger;
mod types;

pub use assets::{AssetRegistry, ReserveAsset};
pub use blacklist::{Blacklist, BlacklistEntry};
pub use caches::{PriceCache, ReserveConfigCache};
pub use config::{Config, CONFIG_PATH_ENV, PRIVATE_KEY_ENV};
pub use coordinator::Coordinator;
pub use executor::{ExecutionReport, Executor};
pub use prepared::{BuildOutcome, PrepareSettings, PreparedCache, Preparer, Venues};
pub use scanner::FullScanner;
pub use sizer::{pick_size, plan_profit_usd, SizedCandidate};
pub use strategy::{
    find_stable_pool, Strategy, StrategyCtx, StrategyPlan, StrategyRegistry, VenueBook,
};
pub use tracker::{HotEntry, HotTracker};
pub use trigger::BlockTrigger;
pub use types::{
    Candidate, CandidateState, FailReason, Position, PreparedLiquidation, ScanCohorts,
    StrategyKind, PREPARE_HF, WARM_HF,
};
