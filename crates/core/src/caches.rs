//! Time-windowed caches for oracle prices and reserve configuration.
//!
//! Misses are coalesced into a single aggregator-call read. When the oracle
//! itself is failing, the price cache serves the last known value rather than
//! stalling the pipeline; a candidate priced off stale data is still gated by
//! simulation before any transaction is sent.

use alloy::primitives::{Address, U256};
use anyhow::{bail, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use liquidator_chain::contracts::pool as pool_abi;
use liquidator_chain::{Multicall, ReserveConfig, SubCall};

#[derive(Clone)]
struct Timed<T> {
    value: T,
    observed_at: Instant,
}

/// Oracle price cache keyed by asset, values in the 8-digit numeraire.
pub struct PriceCache {
    oracle: Address,
    multicall: Multicall,
    entries: DashMap<Address, Timed<U256>>,
    ttl: Duration,
}

impl PriceCache {
    pub fn new(oracle: Address, multicall: Multicall, ttl: Duration) -> Self {
        Self {
            oracle,
            multicall,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh cached value, if any.
    pub fn peek(&self, asset: &Address) -> Option<U256> {
        self.entries
            .get(asset)
            .filter(|e| e.observed_at.elapsed() < self.ttl)
            .map(|e| e.value)
    }

    /// Cached-or-read price. On oracle failure, falls back to the last cached
    /// value regardless of age; errors only when nothing was ever seen.
    pub async fn get(&self, asset: Address) -> Result<U256> {
        if let Some(price) = self.peek(&asset) {
            return Ok(price);
        }
        match self.read_many(&[asset]).await {
            Ok(prices) if prices.contains_key(&asset) => Ok(prices[&asset]),
            Ok(_) | Err(_) => {
                if let Some(stale) = self.entries.get(&asset) {
                    warn!(asset = %asset, age_ms = stale.observed_at.elapsed().as_millis() as u64, "Serving stale price");
                    return Ok(stale.value);
                }
                bail!("no price available for {asset}")
            }
        }
    }

    /// Batch variant: all misses go out in one aggregate3 pass.
    pub async fn get_many(&self, assets: &[Address]) -> Result<HashMap<Address, U256>> {
        let mut out = HashMap::with_capacity(assets.len());
        let mut misses = Vec::new();
        for asset in assets {
            match self.peek(asset) {
                Some(price) => {
                    out.insert(*asset, price);
                }
                None => misses.push(*asset),
            }
        }
        if misses.is_empty() {
            return Ok(out);
        }

        match self.read_many(&misses).await {
            Ok(read) => out.extend(read),
            Err(e) => {
                warn!(error = %e, misses = misses.len(), "Oracle batch read failed, trying stale values");
            }
        }

        for asset in &misses {
            if !out.contains_key(asset) {
                if let Some(stale) = self.entries.get(asset) {
                    out.insert(*asset, stale.value);
                }
            }
        }
        Ok(out)
    }

    async fn read_many(&self, assets: &[Address]) -> Result<HashMap<Address, U256>> {
        let calls: Vec<SubCall> = assets
            .iter()
            .map(|a| SubCall::new(self.oracle, pool_abi::asset_price_call(*a)))
            .collect();
        let results = self.multicall.aggregate(&calls).await?;

        let mut out = HashMap::with_capacity(assets.len());
        let now = Instant::now();
        for (asset, result) in assets.iter().zip(results) {
            if !result.success {
                debug!(asset = %asset, "Oracle sub-call failed");
                continue;
            }
            if let Ok(price) = pool_abi::decode_price(&result.return_data) {
                self.entries.insert(
                    *asset,
                    Timed {
                        value: price,
                        observed_at: now,
                    },
                );
                out.insert(*asset, price);
            }
        }
        Ok(out)
    }

    /// Seed a price directly (tests and oracle push paths).
    pub fn put(&self, asset: Address, price: U256) {
        self.entries.insert(
            asset,
            Timed {
                value: price,
                observed_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reserve configuration cache, 60 s window.
pub struct ReserveConfigCache {
    data_provider: Address,
    multicall: Multicall,
    entries: DashMap<Address, Timed<ReserveConfig>>,
    ttl: Duration,
}

impl ReserveConfigCache {
    pub fn new(data_provider: Address, multicall: Multicall, ttl: Duration) -> Self {
        Self {
            data_provider,
            multicall,
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn peek(&self, asset: &Address) -> Option<ReserveConfig> {
        self.entries
            .get(asset)
            .filter(|e| e.observed_at.elapsed() < self.ttl)
            .map(|e| e.value)
    }

    pub async fn get(&self, asset: Address) -> Result<ReserveConfig> {
        if let Some(config) = self.peek(&asset) {
            return Ok(config);
        }
        let read = self.get_many(&[asset]).await?;
        read.get(&asset)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no reserve config for {asset}"))
    }

    pub async fn get_many(&self, assets: &[Address]) -> Result<HashMap<Address, ReserveConfig>> {
        let mut out = HashMap::with_capacity(assets.len());
        let mut misses = Vec::new();
        for asset in assets {
            match self.peek(asset) {
                Some(config) => {
                    out.insert(*asset, config);
                }
                None => misses.push(*asset),
            }
        }
        if misses.is_empty() {
            return Ok(out);
        }

        let calls: Vec<SubCall> = misses
            .iter()
            .map(|a| SubCall::new(self.data_provider, pool_abi::reserve_config_call(*a)))
            .collect();
        let results = self.multicall.aggregate(&calls).await?;

        let now = Instant::now();
        for (asset, result) in misses.iter().zip(results) {
            if !result.success {
                continue;
            }
            if let Ok(config) = ReserveConfig::decode(&result.return_data) {
                self.entries.insert(
                    *asset,
                    Timed {
                        value: config,
                        observed_at: now,
                    },
                );
                out.insert(*asset, config);
            }
        }
        Ok(out)
    }

    pub fn put(&self, asset: Address, config: ReserveConfig) {
        self.entries.insert(
            asset,
            Timed {
                value: config,
                observed_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquidator_chain::RpcGateway;
    use std::sync::Arc;

    fn test_multicall() -> Multicall {
        let gateway = Arc::new(RpcGateway::new(
            "http://localhost:1",
            "http://localhost:2",
            "ws://localhost:3",
            Duration::from_secs(2),
        ));
        Multicall::new(Address::repeat_byte(0xCA), gateway)
    }

    #[test]
    fn test_price_put_peek_ttl() {
        let cache = PriceCache::new(
            Address::repeat_byte(1),
            test_multicall(),
            Duration::from_millis(50),
        );
        let asset = Address::repeat_byte(0xAA);
        assert!(cache.peek(&asset).is_none());

        cache.put(asset, U256::from(100_000_000u64));
        assert_eq!(cache.peek(&asset), Some(U256::from(100_000_000u64)));

        std::thread::sleep(Duration::from_millis(60));
        // Expired entries are invisible to peek
        assert!(cache.peek(&asset).is_none());
    }

    #[test]
    fn test_reserve_config_peek() {
        let cache = ReserveConfigCache::new(
            Address::repeat_byte(2),
            test_multicall(),
            Duration::from_secs(60),
        );
        let asset = Address::repeat_byte(0xBB);
        cache.put(
            asset,
            ReserveConfig {
                decimals: 6,
                ltv_bps: 8_000,
                liquidation_threshold_bps: 8_500,
                liquidation_bonus: 10_500,
                active: true,
                frozen: false,
            },
        );
        let config = cache.peek(&asset).unwrap();
        assert_eq!(config.liquidation_bonus, 10_500);
    }
}
