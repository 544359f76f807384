//! Agent configuration, loaded from TOML at startup.
//!
//! Any parse or validation failure is fatal: the process must exit nonzero
//! before touching the chain. Transient runtime errors never re-enter here.

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use liquidator_chain::{PoolRef, TierTable, Venue};

/// Environment variable holding the signing key. Never in the config file.
pub const PRIVATE_KEY_ENV: &str = "LIQUIDATOR_PRIVATE_KEY";

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "LIQUIDATOR_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // RPC endpoints
    pub read_rpc_url: String,
    pub tx_rpc_url: String,
    pub ws_url: String,
    pub chain_id: u64,

    // External services
    pub indexer_url: String,
    #[serde(default)]
    pub aggregator_url: Option<String>,
    #[serde(default)]
    pub aggregator_api_key: Option<String>,
    #[serde(default)]
    pub alert_webhook_url: Option<String>,
    #[serde(default)]
    pub info_webhook_url: Option<String>,

    // On-chain addresses
    pub pools: Vec<Address>,
    /// Liquidation contract per pool.
    pub liquidation_contracts: HashMap<Address, Address>,
    pub multicall_address: Address,
    pub oracle_address: Address,
    pub reserve_data_provider_address: Address,
    pub v2_router: Address,
    pub v3_router: Address,
    pub profit_receiver: Address,

    // Venue whitelists
    #[serde(default)]
    pub stable_assets: Vec<Address>,
    /// Named stable pools; BTreeMap keeps the canonical lookup order stable.
    #[serde(default)]
    pub stable_pools: BTreeMap<String, StablePoolConfig>,
    #[serde(default)]
    pub v2_pairs: Vec<V2PairConfig>,
    #[serde(default)]
    pub v3_pools: Vec<V3PoolConfig>,
    /// Intermediate tokens for multi-hop V2 paths.
    #[serde(default)]
    pub v2_hop_tokens: Vec<Address>,

    // Thresholds and cadences
    #[serde(default = "default_min_debt_usd")]
    pub min_debt_usd: f64,
    #[serde(default = "default_loop_interval")]
    pub loop_interval_seconds: u64,
    #[serde(default = "default_report_interval")]
    pub report_interval_hours: u64,
    #[serde(default = "default_executor_pause")]
    pub executor_pause_seconds: u64,
    #[serde(default = "default_block_poll_ms")]
    pub block_poll_interval_ms: u64,

    // Cache TTLs
    #[serde(default = "default_price_ttl_ms")]
    pub price_cache_ttl_ms: u64,
    #[serde(default = "default_reserve_cfg_ttl_ms")]
    pub reserve_cfg_ttl_ms: u64,
    #[serde(default = "default_prepared_ttl_ms")]
    pub prepared_ttl_ms: u64,
    #[serde(default = "default_blacklist_ttl_ms")]
    pub blacklist_ttl_ms: u64,

    // Liquidation economics
    #[serde(default = "default_close_factor_pct")]
    pub close_factor_pct: u8,
    #[serde(default = "default_interest_buffer_bps")]
    pub interest_buffer_bps: u16,
    #[serde(default = "default_conservative_factor_pct")]
    pub conservative_factor_pct: u8,
    #[serde(default = "default_ladder")]
    pub liquidation_ladder_pct: Vec<u8>,
    #[serde(default = "default_gas_cost_usd")]
    pub estimated_gas_cost_usd: f64,

    // Tier ladders; defaults match the built-in tables
    #[serde(default)]
    pub gas_tiers: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub gas_tier_top: Option<f64>,
    #[serde(default)]
    pub slippage_tiers: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub slippage_tier_top: Option<f64>,

    // Operator surface
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StablePoolConfig {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    #[serde(default)]
    pub idx0: i64,
    #[serde(default = "default_idx1")]
    pub idx1: i64,
    #[serde(default = "default_stable_fee_micro")]
    pub fee_micro: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V2PairConfig {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct V3PoolConfig {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee_micro: u32,
}

fn default_min_debt_usd() -> f64 {
    1.0
}
fn default_loop_interval() -> u64 {
    60
}
fn default_report_interval() -> u64 {
    1
}
fn default_executor_pause() -> u64 {
    5
}
fn default_block_poll_ms() -> u64 {
    2_000
}
fn default_price_ttl_ms() -> u64 {
    5_000
}
fn default_reserve_cfg_ttl_ms() -> u64 {
    60_000
}
fn default_prepared_ttl_ms() -> u64 {
    30_000
}
fn default_blacklist_ttl_ms() -> u64 {
    300_000
}
fn default_close_factor_pct() -> u8 {
    50
}
fn default_interest_buffer_bps() -> u16 {
    10
}
fn default_conservative_factor_pct() -> u8 {
    99
}
fn default_ladder() -> Vec<u8> {
    vec![10, 25, 50]
}
fn default_gas_cost_usd() -> f64 {
    0.05
}
fn default_state_file() -> String {
    "liquidator-state.json".to_string()
}
fn default_idx1() -> i64 {
    1
}
fn default_stable_fee_micro() -> u32 {
    400
}

impl Config {
    /// Load from the path in `LIQUIDATOR_CONFIG`, defaulting to `config.toml`.
    pub fn load_from_env() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.toml".to_string());
        Self::load(&path)
    }

    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {path}"))?;
        let config: Self = toml::from_str(&raw).context("config parse error")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pools.is_empty() {
            bail!("no pools configured");
        }
        for pool in &self.pools {
            if !self.liquidation_contracts.contains_key(pool) {
                bail!("pool {pool} has no liquidation contract configured");
            }
        }
        if !(5..=10_000).contains(&self.price_cache_ttl_ms) {
            bail!(
                "price_cache_ttl_ms {} outside 5..=10000",
                self.price_cache_ttl_ms
            );
        }
        if self.close_factor_pct == 0 || self.close_factor_pct > 100 {
            bail!("close_factor_pct {} outside 1..=100", self.close_factor_pct);
        }
        if self.liquidation_ladder_pct.is_empty() {
            bail!("liquidation_ladder_pct is empty");
        }
        let max_rung = self.liquidation_ladder_pct.iter().max().copied().unwrap_or(0);
        if max_rung > self.close_factor_pct {
            bail!(
                "ladder rung {}% exceeds close factor {}%",
                max_rung,
                self.close_factor_pct
            );
        }
        for url in [&self.read_rpc_url, &self.tx_rpc_url, &self.indexer_url] {
            if url.is_empty() {
                bail!("empty endpoint URL in config");
            }
        }
        Ok(())
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval_seconds)
    }
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_hours * 3600)
    }
    pub fn executor_pause(&self) -> Duration {
        Duration::from_secs(self.executor_pause_seconds)
    }
    pub fn block_poll_interval(&self) -> Duration {
        Duration::from_millis(self.block_poll_interval_ms)
    }
    pub fn price_ttl(&self) -> Duration {
        Duration::from_millis(self.price_cache_ttl_ms)
    }
    pub fn reserve_cfg_ttl(&self) -> Duration {
        Duration::from_millis(self.reserve_cfg_ttl_ms)
    }
    pub fn prepared_ttl(&self) -> Duration {
        Duration::from_millis(self.prepared_ttl_ms)
    }
    pub fn blacklist_ttl(&self) -> Duration {
        Duration::from_millis(self.blacklist_ttl_ms)
    }

    pub fn gas_tier_table(&self) -> TierTable {
        match (&self.gas_tiers, self.gas_tier_top) {
            (Some(rows), Some(top)) => {
                TierTable::new(rows.iter().map(|r| (r[0], r[1])).collect(), top)
            }
            _ => TierTable::default_gas(),
        }
    }

    pub fn slippage_tier_table(&self) -> TierTable {
        match (&self.slippage_tiers, self.slippage_tier_top) {
            (Some(rows), Some(top)) => {
                TierTable::new(rows.iter().map(|r| (r[0], r[1])).collect(), top)
            }
            _ => TierTable::default_slippage(),
        }
    }

    pub fn is_stable(&self, asset: &Address) -> bool {
        self.stable_assets.contains(asset)
    }

    /// Whitelisted stable pools as venue refs, in config iteration order.
    pub fn stable_pool_refs(&self) -> Vec<PoolRef> {
        self.stable_pools
            .values()
            .map(|p| PoolRef {
                venue: Venue::Stable,
                address: p.address,
                token0: p.token0,
                token1: p.token1,
                fee_micro: p.fee_micro,
                index0: p.idx0 as i128,
                index1: p.idx1 as i128,
            })
            .collect()
    }

    pub fn v2_pair_refs(&self) -> Vec<PoolRef> {
        self.v2_pairs
            .iter()
            .map(|p| PoolRef {
                venue: Venue::V2,
                address: p.address,
                token0: p.token0,
                token1: p.token1,
                fee_micro: 3_000,
                index0: 0,
                index1: 1,
            })
            .collect()
    }

    pub fn v3_pool_refs(&self) -> Vec<PoolRef> {
        self.v3_pools
            .iter()
            .map(|p| PoolRef {
                venue: Venue::V3,
                address: p.address,
                token0: p.token0,
                token1: p.token1,
                fee_micro: p.fee_micro,
                index0: 0,
                index1: 1,
            })
            .collect()
    }

    pub fn log_config(&self) {
        tracing::info!(
            chain_id = self.chain_id,
            pools = self.pools.len(),
            stable_pools = self.stable_pools.len(),
            v2_pairs = self.v2_pairs.len(),
            v3_pools = self.v3_pools.len(),
            aggregator = self.aggregator_api_key.is_some(),
            "Configuration loaded"
        );
        tracing::info!(
            min_debt_usd = self.min_debt_usd,
            loop_interval_s = self.loop_interval_seconds,
            close_factor_pct = self.close_factor_pct,
            interest_buffer_bps = self.interest_buffer_bps,
            ladder = ?self.liquidation_ladder_pct,
            "Liquidation parameters"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> String {
        r#"
            read_rpc_url = "http://localhost:8545"
            tx_rpc_url = "http://localhost:8546"
            ws_url = "ws://localhost:8547"
            chain_id = 1
            indexer_url = "http://localhost:8000/subgraph"
            pools = ["0x00000000000000000000000000000000000000aa"]
            multicall_address = "0xcA11bde05977b3631167028862bE2a173976CA11"
            oracle_address = "0x00000000000000000000000000000000000000bb"
            reserve_data_provider_address = "0x00000000000000000000000000000000000000cc"
            v2_router = "0x00000000000000000000000000000000000000dd"
            v3_router = "0x00000000000000000000000000000000000000de"
            profit_receiver = "0x00000000000000000000000000000000000000ee"

            [liquidation_contracts]
            "0x00000000000000000000000000000000000000aa" = "0x00000000000000000000000000000000000000ff"
        "#
        .to_string()
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = toml::from_str(&minimal_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.min_debt_usd, 1.0);
        assert_eq!(config.loop_interval_seconds, 60);
        assert_eq!(config.close_factor_pct, 50);
        assert_eq!(config.interest_buffer_bps, 10);
        assert_eq!(config.conservative_factor_pct, 99);
        assert_eq!(config.liquidation_ladder_pct, vec![10, 25, 50]);
        assert_eq!(config.prepared_ttl_ms, 30_000);
        assert_eq!(config.blacklist_ttl_ms, 300_000);
    }

    #[test]
    fn test_missing_contract_is_fatal() {
        let toml = minimal_toml().replace(
            "\"0x00000000000000000000000000000000000000aa\" = ",
            "\"0x00000000000000000000000000000000000000ab\" = ",
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_price_ttl_bounds() {
        let mut config: Config = toml::from_str(&minimal_toml()).unwrap();
        config.price_cache_ttl_ms = 60_000;
        assert!(config.validate().is_err());
        config.price_cache_ttl_ms = 8_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ladder_cannot_exceed_close_factor() {
        let mut config: Config = toml::from_str(&minimal_toml()).unwrap();
        config.liquidation_ladder_pct = vec![10, 25, 75];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tier_table_overrides() {
        let mut config: Config = toml::from_str(&minimal_toml()).unwrap();
        assert_eq!(config.gas_tier_table().lookup(1.0), 1.5);

        config.gas_tiers = Some(vec![[10.0, 2.0]]);
        config.gas_tier_top = Some(3.0);
        let table = config.gas_tier_table();
        assert_eq!(table.lookup(5.0), 2.0);
        assert_eq!(table.lookup(50.0), 3.0);
    }
}
