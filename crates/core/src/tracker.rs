//! Hot-position tracker.
//!
//! Holds every borrower whose last observation put them in the warm band
//! `[1.0, 1.10)` with enough debt to matter. Entries are refreshed by full
//! scans and block-triggered re-checks, and evicted when stale.

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::math;
use crate::types::Position;

#[derive(Debug, Clone, Copy)]
pub struct HotEntry {
    /// Health factor in WAD at last observation.
    pub health_factor: U256,
    pub debt_value_usd: f64,
    /// Collateral-price drop that would pull HF to one. Reporting only.
    pub price_drop_to_liquidate_pct: f64,
    pub last_seen_at: Instant,
    pub pool: Address,
}

pub struct HotTracker {
    entries: DashMap<Address, HotEntry>,
    max_age: Duration,
    min_debt_usd: f64,
    warm_hf: f64,
}

impl HotTracker {
    pub fn new(max_age: Duration, min_debt_usd: f64, warm_hf: f64) -> Self {
        Self {
            entries: DashMap::new(),
            max_age,
            min_debt_usd,
            warm_hf,
        }
    }

    /// Insert or refresh from a scan observation. Only warm positions above
    /// the debt floor are admitted; anything else is dropped (and removed if
    /// previously tracked, covering HF recovery).
    pub fn observe(&self, position: &Position) {
        let hf = position.hf();
        let debt_usd = position.debt_usd();
        let in_band = (1.0..self.warm_hf).contains(&hf) && debt_usd >= self.min_debt_usd;

        if !in_band {
            if self.entries.remove(&position.borrower).is_some() {
                debug!(borrower = %position.borrower, hf, "Borrower left the warm band");
            }
            return;
        }

        self.entries.insert(
            position.borrower,
            HotEntry {
                health_factor: position.health_factor,
                debt_value_usd: debt_usd,
                price_drop_to_liquidate_pct: math::price_drop_to_liquidate(position.health_factor),
                last_seen_at: Instant::now(),
                pool: position.pool,
            },
        );
    }

    pub fn remove(&self, borrower: &Address) {
        self.entries.remove(borrower);
    }

    pub fn get(&self, borrower: &Address) -> Option<HotEntry> {
        self.entries.get(borrower).map(|e| *e)
    }

    pub fn contains(&self, borrower: &Address) -> bool {
        self.entries.contains_key(borrower)
    }

    /// All tracked borrowers grouped by pool, for batched re-checks.
    pub fn borrowers_by_pool(&self) -> Vec<(Address, Vec<Address>)> {
        let mut by_pool: std::collections::HashMap<Address, Vec<Address>> =
            std::collections::HashMap::new();
        for entry in self.entries.iter() {
            by_pool.entry(entry.pool).or_default().push(*entry.key());
        }
        by_pool.into_iter().collect()
    }

    /// Snapshot ordered by descending priority (debt / HF).
    pub fn snapshot(&self) -> Vec<(Address, HotEntry)> {
        let mut all: Vec<(Address, HotEntry)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), *e.value()))
            .collect();
        all.sort_by(|a, b| {
            let score = |e: &HotEntry| {
                let hf = math::wad_to_f64(e.health_factor);
                if hf <= 0.0 {
                    0.0
                } else {
                    e.debt_value_usd / hf
                }
            };
            score(&b.1)
                .partial_cmp(&score(&a.1))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        all
    }

    /// Drop entries not refreshed within the staleness window.
    pub fn evict_stale(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.last_seen_at.elapsed() < self.max_age);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Evicted stale hot entries");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> HotTracker {
        HotTracker::new(Duration::from_secs(300), 1.0, 1.10)
    }

    fn position(borrower_byte: u8, hf_milli: u64, debt_usd: u64) -> Position {
        Position {
            borrower: Address::repeat_byte(borrower_byte),
            pool: Address::repeat_byte(0xF0),
            health_factor: math::WAD * U256::from(hf_milli) / U256::from(1_000u64),
            total_debt_base: U256::from(debt_usd) * U256::from(100_000_000u64),
            last_observed_block: 1,
        }
    }

    #[test]
    fn test_warm_band_admission() {
        let tracker = tracker();

        tracker.observe(&position(1, 1_050, 500));
        assert!(tracker.contains(&Address::repeat_byte(1)));

        // Below one: liquidatable, not warm-tracked
        tracker.observe(&position(2, 990, 500));
        assert!(!tracker.contains(&Address::repeat_byte(2)));

        // Above the band
        tracker.observe(&position(3, 1_200, 500));
        assert!(!tracker.contains(&Address::repeat_byte(3)));

        // Dust debt
        tracker.observe(&position(4, 1_050, 0));
        assert!(!tracker.contains(&Address::repeat_byte(4)));
    }

    #[test]
    fn test_recovery_removes_entry() {
        let tracker = tracker();
        tracker.observe(&position(1, 1_050, 500));
        assert_eq!(tracker.len(), 1);

        tracker.observe(&position(1, 1_500, 500));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_price_drop_recorded() {
        let tracker = tracker();
        tracker.observe(&position(1, 1_050, 500));
        let entry = tracker.get(&Address::repeat_byte(1)).unwrap();
        // (1 - 1/1.05) * 100 ≈ 4.76%
        assert!((entry.price_drop_to_liquidate_pct - 4.7619).abs() < 0.01);
    }

    #[test]
    fn test_snapshot_priority_order() {
        let tracker = tracker();
        tracker.observe(&position(1, 1_080, 100));
        tracker.observe(&position(2, 1_010, 100_000));
        tracker.observe(&position(3, 1_050, 5_000));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot[0].0, Address::repeat_byte(2));
        assert_eq!(snapshot[2].0, Address::repeat_byte(1));
    }

    #[test]
    fn test_stale_eviction() {
        let tracker = HotTracker::new(Duration::from_millis(30), 1.0, 1.10);
        tracker.observe(&position(1, 1_050, 500));
        assert_eq!(tracker.evict_stale(), 0);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(tracker.evict_stale(), 1);
        assert!(tracker.is_empty());
    }
}
