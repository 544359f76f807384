//! Liquidator chain interaction layer.
//!
//! This crate provides:
//! - Dual-endpoint RPC gateway with retry, failover and block subscription
//! - Contract bindings for the pool, oracle, DEXes and liquidation contract
//! - Batched reads through the Multicall3 aggregator
//! - Batched swap quoting across V2, V3 and stable venues
//! - Profit-tiered gas pricing and dynamic slippage
//! - Transaction signing and sending

pub mod contracts;
pub mod gas;
mod gateway;
mod multicall;
mod quotes;
mod sender;

pub use contracts::{
    encode_execute, encode_pair_path, encode_v2_path, encode_v3_path, AccountHealth,
    ContractMethod, ExecuteParams, ReserveConfig, SwapKind, SwapLeg,
};
pub use gas::{apply_gas_multiplier, escalated_slippage_bps, TierTable, SLIPPAGE_ESCALATION};
pub use gateway::{retry_delay, RpcErrorKind, RpcGateway};
pub use multicall::{roundtrips, Multicall, SubCall, SubResult, CALL_CHUNK};
pub use quotes::{
    v3_output_from_sqrt_price, LiquidityProbe, PoolRef, Quote, QuoteRequest, Venue,
};
pub use sender::TransactionSender;
