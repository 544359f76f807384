//! Block-driven quick check of hot positions.
//!
//! Each new block triggers one batched health re-read of every tracked
//! borrower. Handlers are strictly serialized per block number; when blocks
//! queue up behind a slow handler, only the newest is processed and the
//! lagged ones are dropped. Handler errors are swallowed with logging so the
//! subscription never dies to a bad read.

use alloy::primitives::Address;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use liquidator_chain::contracts::pool as pool_abi;
use liquidator_chain::{AccountHealth, Multicall, RpcGateway, SubCall};

use crate::prepared::PreparedCache;
use crate::tracker::HotTracker;
use crate::types::{Candidate, Position, PREPARE_HF};

pub struct BlockTrigger {
    gateway: Arc<RpcGateway>,
    multicall: Multicall,
    tracker: Arc<HotTracker>,
    prepared: Arc<PreparedCache>,
    /// Liquidatable borrowers, promoted toward the executor.
    candidate_tx: mpsc::Sender<Candidate>,
    /// Borrowers needing background preparation: `(borrower, pool)`.
    prepare_tx: mpsc::Sender<(Address, Address)>,
}

impl BlockTrigger {
    pub fn new(
        gateway: Arc<RpcGateway>,
        multicall: Multicall,
        tracker: Arc<HotTracker>,
        prepared: Arc<PreparedCache>,
        candidate_tx: mpsc::Sender<Candidate>,
        prepare_tx: mpsc::Sender<(Address, Address)>,
    ) -> Self {
        Self {
            gateway,
            multicall,
            tracker,
            prepared,
            candidate_tx,
            prepare_tx,
        }
    }

    /// Consume the block stream until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut blocks = self.gateway.clone().subscribe_blocks();
        let mut last_handled = 0u64;
        info!("Block trigger running");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Block trigger stopping");
                    return;
                }
                maybe_block = blocks.recv() => {
                    let Some(mut block) = maybe_block else {
                        warn!("Block stream closed");
                        return;
                    };
                    // Drain the queue; only the newest block matters.
                    while let Ok(newer) = blocks.try_recv() {
                        block = block.max(newer);
                    }
                    if block <= last_handled {
                        debug!(block, last_handled, "Dropping lagged block");
                        continue;
                    }
                    last_handled = block;

                    if let Err(e) = self.quick_check(block).await {
                        warn!(block, error = %e, "Quick check failed");
                    }
                }
            }
        }
    }

    /// Re-read every tracked borrower's health in one batch per pool and
    /// route the results: crossed-below-one to the executor (fast path when
    /// prepared), near-threshold to the preparer.
    pub async fn quick_check(&self, block: u64) -> Result<()> {
        let by_pool = self.tracker.borrowers_by_pool();
        if by_pool.is_empty() {
            return Ok(());
        }

        for (pool, borrowers) in by_pool {
            let calls: Vec<SubCall> = borrowers
                .iter()
                .map(|b| SubCall::new(pool, pool_abi::user_account_data_call(*b)))
                .collect();
            let results = self.multicall.aggregate(&calls).await?;

            for (borrower, result) in borrowers.iter().zip(results) {
                if !result.success {
                    continue;
                }
                let Ok(health) = AccountHealth::decode(&result.return_data) else {
                    continue;
                };
                let position = Position {
                    borrower: *borrower,
                    pool,
                    health_factor: health.health_factor,
                    total_debt_base: health.total_debt_base,
                    last_observed_block: block,
                };
                self.tracker.observe(&position);

                if position.is_liquidatable() {
                    let prepared = self.prepared.get_valid(borrower);
                    info!(
                        borrower = %borrower,
                        block,
                        hf = position.hf(),
                        fast_path = prepared.is_some(),
                        "Borrower crossed liquidation threshold"
                    );
                    let _ = self
                        .candidate_tx
                        .send(Candidate { position, prepared })
                        .await;
                } else if position.hf() < PREPARE_HF && !self.prepared.has_valid(borrower) {
                    let _ = self.prepare_tx.send((*borrower, pool)).await;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_lag_drop_rule() {
        // The handler loop's guard: a block at or below the last handled
        // number is dropped, so each number is checked at most once.
        let mut last_handled = 0u64;
        let mut handled = Vec::new();
        for block in [5u64, 6, 6, 4, 7] {
            if block <= last_handled {
                continue;
            }
            last_handled = block;
            handled.push(block);
        }
        assert_eq!(handled, vec![5, 6, 7]);
    }
}
