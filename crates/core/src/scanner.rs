//! Pool-wide scanner.
//!
//! Long-cadence sweep of the entire borrower universe: pulls the borrower
//! list from the indexer, batch-reads account health for every configured
//! pool, and splits the results into liquidatable and warm cohorts. The hot
//! tracker is refreshed from the warm cohort.

use alloy::primitives::Address;
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use liquidator_api::IndexerClient;
use liquidator_chain::contracts::pool as pool_abi;
use liquidator_chain::{AccountHealth, Multicall, RpcGateway, SubCall};

use crate::tracker::HotTracker;
use crate::types::{Position, ScanCohorts};

pub struct FullScanner {
    indexer: Arc<IndexerClient>,
    gateway: Arc<RpcGateway>,
    multicall: Multicall,
    pools: Vec<Address>,
    tracker: Arc<HotTracker>,
    min_debt_usd: f64,
}

impl FullScanner {
    pub fn new(
        indexer: Arc<IndexerClient>,
        gateway: Arc<RpcGateway>,
        multicall: Multicall,
        pools: Vec<Address>,
        tracker: Arc<HotTracker>,
        min_debt_usd: f64,
    ) -> Self {
        Self {
            indexer,
            gateway,
            multicall,
            pools,
            tracker,
            min_debt_usd,
        }
    }

    /// One full sweep. Indexer failure skips the cycle; per-borrower read
    /// failures only drop that borrower.
    #[instrument(skip(self))]
    pub async fn run_scan(&self) -> Result<ScanCohorts> {
        let started = Instant::now();
        let borrowers = self.indexer.fetch_all_borrowers().await?;
        let block = self.gateway.block_number().await.unwrap_or(0);

        let mut cohorts = ScanCohorts::default();
        for pool in &self.pools {
            let positions = self.read_pool_health(*pool, &borrowers, block).await?;
            cohorts.scanned += positions.len();

            for position in positions {
                // The tracker admits the warm band and forgets everyone else.
                self.tracker.observe(&position);

                if position.is_liquidatable() {
                    cohorts.liquidatable.push(position);
                } else if position.is_warm() && position.debt_usd() >= self.min_debt_usd {
                    cohorts.warm.push(position);
                }
            }
        }

        self.tracker.evict_stale();

        cohorts
            .liquidatable
            .sort_by(|a, b| b.total_debt_base.cmp(&a.total_debt_base));
        cohorts.warm.sort_by(|a, b| {
            b.priority_score()
                .partial_cmp(&a.priority_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        info!(
            scanned = cohorts.scanned,
            liquidatable = cohorts.liquidatable.len(),
            warm = cohorts.warm.len(),
            tracked = self.tracker.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Full scan complete"
        );
        Ok(cohorts)
    }

    async fn read_pool_health(
        &self,
        pool: Address,
        borrowers: &[Address],
        block: u64,
    ) -> Result<Vec<Position>> {
        let calls: Vec<SubCall> = borrowers
            .iter()
            .map(|b| SubCall::new(pool, pool_abi::user_account_data_call(*b)))
            .collect();
        let results = self.multicall.aggregate(&calls).await?;

        let mut positions = Vec::with_capacity(borrowers.len());
        let mut failed = 0usize;
        for (borrower, result) in borrowers.iter().zip(results) {
            if !result.success {
                failed += 1;
                continue;
            }
            match AccountHealth::decode(&result.return_data) {
                Ok(health) => positions.push(Position {
                    borrower: *borrower,
                    pool,
                    health_factor: health.health_factor,
                    total_debt_base: health.total_debt_base,
                    last_observed_block: block,
                }),
                Err(_) => failed += 1,
            }
        }
        if failed > 0 {
            warn!(pool = %pool, failed, "Some account reads failed during scan");
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math;
    use alloy::primitives::U256;

    fn position(hf_milli: u64, debt_base: u64) -> Position {
        Position {
            borrower: Address::repeat_byte((hf_milli % 251) as u8),
            pool: Address::repeat_byte(0xF0),
            health_factor: math::WAD * U256::from(hf_milli) / U256::from(1_000u64),
            total_debt_base: U256::from(debt_base),
            last_observed_block: 7,
        }
    }

    #[test]
    fn test_cohort_split_rules() {
        // Liquidatable: 0 < HF <= 1
        assert!(position(900, 100_00000000).is_liquidatable());
        assert!(position(1_000, 100_00000000).is_liquidatable());
        // Warm band
        assert!(position(1_005, 100_00000000).is_warm());
        assert!(!position(1_100, 100_00000000).is_warm());
        // Healthy is neither
        let healthy = position(1_500, 100_00000000);
        assert!(!healthy.is_liquidatable() && !healthy.is_warm());
    }

    #[test]
    fn test_liquidatable_ordering_by_debt() {
        let mut cohort = vec![
            position(900, 10_00000000),
            position(950, 900_00000000),
            position(990, 50_00000000),
        ];
        cohort.sort_by(|a, b| b.total_debt_base.cmp(&a.total_debt_base));
        assert_eq!(cohort[0].total_debt_base, U256::from(900_00000000u64));
        assert_eq!(cohort[2].total_debt_base, U256::from(10_00000000u64));
    }

    #[test]
    fn test_warm_ordering_by_priority() {
        let mut cohort = vec![position(1_090, 100_00000000), position(1_010, 100_00000000)];
        cohort.sort_by(|a, b| {
            b.priority_score()
                .partial_cmp(&a.priority_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        // Closer to the edge first at equal debt
        assert!(cohort[0].hf() < cohort[1].hf());
    }
}
