//! Per-borrower failure blacklist.
//!
//! Repeatedly losing candidates are suppressed so the agent does not burn
//! gas and latency re-simulating the same dead opportunity every block.

use alloy::primitives::Address;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::FailReason;

/// Failures within the TTL window before a borrower is skipped.
const MAX_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct BlacklistEntry {
    pub failures: u32,
    pub last_attempt_at: Instant,
    pub reason: FailReason,
}

pub struct Blacklist {
    entries: DashMap<Address, BlacklistEntry>,
    ttl: Duration,
}

impl Blacklist {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Record a failed attempt. Counters reset when the previous entry has
    /// aged out.
    pub fn record(&self, borrower: Address, reason: FailReason) {
        let mut entry = self.entries.entry(borrower).or_insert(BlacklistEntry {
            failures: 0,
            last_attempt_at: Instant::now(),
            reason,
        });
        if entry.last_attempt_at.elapsed() >= self.ttl {
            entry.failures = 0;
        }
        entry.failures += 1;
        entry.last_attempt_at = Instant::now();
        entry.reason = reason;
        debug!(
            borrower = %borrower,
            failures = entry.failures,
            reason = reason.as_str(),
            "Blacklist entry updated"
        );
    }

    /// A borrower is blocked after `MAX_FAILURES` failures within the window.
    pub fn is_blocked(&self, borrower: &Address) -> bool {
        self.entries
            .get(borrower)
            .map(|e| e.failures >= MAX_FAILURES && e.last_attempt_at.elapsed() < self.ttl)
            .unwrap_or(false)
    }

    /// A successful execution clears the borrower entirely.
    pub fn purge(&self, borrower: &Address) {
        self.entries.remove(borrower);
    }

    pub fn get(&self, borrower: &Address) -> Option<BlacklistEntry> {
        self.entries.get(borrower).map(|e| *e)
    }

    /// Drop expired entries; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.last_attempt_at.elapsed() < self.ttl);
        before - self.entries.len()
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

    #[test]
    fn test_blocks_after_three_failures() {
        let blacklist = Blacklist::new(Duration::from_secs(300));
        let borrower = Address::repeat_byte(1);

        blacklist.record(borrower, FailReason::SimulationRevert);
        assert!(!blacklist.is_blocked(&borrower));
        blacklist.record(borrower, FailReason::SwapFailed);
        assert!(!blacklist.is_blocked(&borrower));
        blacklist.record(borrower, FailReason::SwapFailed);
        assert!(blacklist.is_blocked(&borrower));

        let entry = blacklist.get(&borrower).unwrap();
        assert_eq!(entry.failures, 3);
        assert_eq!(entry.reason, FailReason::SwapFailed);
    }

    #[test]
    fn test_success_purges() {
        let blacklist = Blacklist::new(Duration::from_secs(300));
        let borrower = Address::repeat_byte(2);
        for _ in 0..3 {
            blacklist.record(borrower, FailReason::ExecutionRevert);
        }
        assert!(blacklist.is_blocked(&borrower));

        blacklist.purge(&borrower);
        assert!(!blacklist.is_blocked(&borrower));
        assert!(blacklist.get(&borrower).is_none());
    }

    #[test]
    fn test_ttl_expiry_unblocks() {
        let blacklist = Blacklist::new(Duration::from_millis(30));
        let borrower = Address::repeat_byte(3);
        for _ in 0..3 {
            blacklist.record(borrower, FailReason::NoProfitableSize);
        }
        assert!(blacklist.is_blocked(&borrower));

        std::thread::sleep(Duration::from_millis(40));
        assert!(!blacklist.is_blocked(&borrower));
        assert_eq!(blacklist.sweep(), 1);
        assert!(blacklist.is_empty());
    }

    #[test]
    fn test_counter_resets_after_window() {
        let blacklist = Blacklist::new(Duration::from_millis(30));
        let borrower = Address::repeat_byte(4);
        blacklist.record(borrower, FailReason::SwapFailed);
        blacklist.record(borrower, FailReason::SwapFailed);

        std::thread::sleep(Duration::from_millis(40));
        // Stale streak does not carry into the new window
        blacklist.record(borrower, FailReason::SwapFailed);
        assert_eq!(blacklist.get(&borrower).unwrap().failures, 1);
        assert!(!blacklist.is_blocked(&borrower));
    }
}
