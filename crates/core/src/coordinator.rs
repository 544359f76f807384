//! Long-running supervisor.
//!
//! Owns all shared state, launches the scanner cadence, the block trigger,
//! the background preparer and the executor consumption loop, and emits the
//! periodic status report. All loops stop on the shutdown signal; in-flight
//! submissions drain on their own.

use alloy::primitives::Address;
use anyhow::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use liquidator_api::Notifier;
use liquidator_chain::{LiquidityProbe, RpcGateway, TransactionSender};

use crate::blacklist::Blacklist;
use crate::config::Config;
use crate::executor::Executor;
use crate::math;
use crate::prepared::{PreparedCache, Preparer, Venues};
use crate::scanner::FullScanner;
use crate::tracker::HotTracker;
use crate::trigger::BlockTrigger;
use crate::types::Candidate;

/// Silent scan failures before an alert is raised.
const MAX_SILENT_ERRORS: u32 = 3;

/// Persistent operator state, written atomically next to the process.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct PersistentState {
    #[serde(rename = "lastReportAt")]
    last_report_at: u64,
}

pub struct Coordinator {
    config: Config,
    gateway: Arc<RpcGateway>,
    probe: LiquidityProbe,
    scanner: Arc<FullScanner>,
    trigger: Arc<BlockTrigger>,
    executor: Arc<Executor>,
    preparer: Arc<Preparer>,
    tracker: Arc<HotTracker>,
    prepared: Arc<PreparedCache>,
    blacklist: Arc<Blacklist>,
    notifier: Arc<dyn Notifier>,
    sender: Arc<TransactionSender>,
    venues: Venues,
    candidate_rx: mpsc::Receiver<Candidate>,
    candidate_tx: mpsc::Sender<Candidate>,
    prepare_rx: mpsc::Receiver<(Address, Address)>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        gateway: Arc<RpcGateway>,
        probe: LiquidityProbe,
        scanner: Arc<FullScanner>,
        trigger: Arc<BlockTrigger>,
        executor: Arc<Executor>,
        preparer: Arc<Preparer>,
        tracker: Arc<HotTracker>,
        prepared: Arc<PreparedCache>,
        blacklist: Arc<Blacklist>,
        notifier: Arc<dyn Notifier>,
        sender: Arc<TransactionSender>,
        venues: Venues,
        candidate_tx: mpsc::Sender<Candidate>,
        candidate_rx: mpsc::Receiver<Candidate>,
        prepare_rx: mpsc::Receiver<(Address, Address)>,
    ) -> Self {
        Self {
            config,
            gateway,
            probe,
            scanner,
            trigger,
            executor,
            preparer,
            tracker,
            prepared,
            blacklist,
            notifier,
            sender,
            venues,
            candidate_rx,
            candidate_tx,
            prepare_rx,
        }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Coordinator starting");

        // Block trigger.
        let trigger = self.trigger.clone();
        let trigger_shutdown = shutdown.clone();
        tokio::spawn(async move {
            trigger.run(trigger_shutdown).await;
        });

        // Background preparer, draining requests in batches.
        let preparer = self.preparer.clone();
        let mut prepare_rx =
            std::mem::replace(&mut self.prepare_rx, mpsc::channel(1).1);
        let prepare_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut shutdown = prepare_shutdown;
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    maybe = prepare_rx.recv() => {
                        let Some(first) = maybe else { return };
                        let mut batch = vec![first];
                        while batch.len() < 50 {
                            match prepare_rx.try_recv() {
                                Ok(next) => batch.push(next),
                                Err(_) => break,
                            }
                        }
                        batch.sort();
                        batch.dedup();
                        preparer.prepare_batch(&batch).await;
                    }
                }
            }
        });

        // Scanner cadence.
        let scan_handle = self.spawn_scan_loop(shutdown.clone());

        // Housekeeping cadence: expiry sweeps.
        let prepared = self.prepared.clone();
        let blacklist = self.blacklist.clone();
        let sweep_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut shutdown = sweep_shutdown;
            let mut ticker = tokio::time::interval(Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = ticker.tick() => {
                        prepared.purge_expired();
                        blacklist.sweep();
                    }
                }
            }
        });

        // Executor consumption + status reporting on the main task.
        let mut report_ticker = tokio::time::interval(self.config.report_interval());
        report_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        report_ticker.tick().await; // first tick fires immediately; skip it

        let mut candidate_rx =
            std::mem::replace(&mut self.candidate_rx, mpsc::channel(1).1);
        let mut shutdown_rx = shutdown;
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("Coordinator stopping");
                    break;
                }
                _ = report_ticker.tick() => {
                    if let Err(e) = self.emit_status().await {
                        warn!(error = %e, "Status report failed");
                    }
                }
                maybe = candidate_rx.recv() => {
                    let Some(candidate) = maybe else { break };
                    let report = self.executor.execute(candidate).await;
                    debug!(
                        borrower = %report.borrower,
                        state = ?report.state,
                        detail = %report.detail,
                        "Candidate finished"
                    );
                    // Keep the tx endpoint breathing between attempts.
                    tokio::time::sleep(self.config.executor_pause()).await;
                }
            }
        }

        scan_handle.abort();
        Ok(())
    }

    fn spawn_scan_loop(&self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let scanner = self.scanner.clone();
        let gateway = self.gateway.clone();
        let prepared = self.prepared.clone();
        let blacklist = self.blacklist.clone();
        let candidate_tx = self.candidate_tx.clone();
        let notifier = self.notifier.clone();
        let interval = self.config.loop_interval();
        let errors = Arc::new(AtomicU32::new(0));

        tokio::spawn(async move {
            let mut shutdown = shutdown;
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = ticker.tick() => {}
                }

                match scanner.run_scan().await {
                    Ok(cohorts) => {
                        errors.store(0, Ordering::Relaxed);
                        // A clean pass through the public path ends failover.
                        gateway.restore_read_endpoint();

                        for position in cohorts.liquidatable {
                            if blacklist.is_blocked(&position.borrower) {
                                continue;
                            }
                            let prepared_entry = prepared.get_valid(&position.borrower);
                            let _ = candidate_tx
                                .send(Candidate {
                                    position,
                                    prepared: prepared_entry,
                                })
                                .await;
                        }
                    }
                    Err(e) => {
                        let n = errors.fetch_add(1, Ordering::Relaxed) + 1;
                        error!(error = %e, consecutive = n, "Scan cycle failed");
                        if n == MAX_SILENT_ERRORS {
                            notifier
                                .alert(&format!("scanner failing: {n} consecutive errors, last: {e}"))
                                .await;
                        }
                    }
                }
            }
        })
    }

    /// Hourly operator report: tracker stats, warmest borrowers, balances
    /// and a venue liquidity snapshot. Also persists `lastReportAt`.
    async fn emit_status(&self) -> Result<()> {
        let mut lines = Vec::new();
        lines.push(format!(
            "tracked={} prepared={} blacklisted={} rpc={}",
            self.tracker.len(),
            self.prepared.len(),
            self.blacklist.len(),
            if self.gateway.is_failed_over() {
                "failover"
            } else {
                "public"
            }
        ));

        for (borrower, entry) in self.tracker.snapshot().into_iter().take(5) {
            lines.push(format!(
                "warm {borrower}: hf={:.4} debt=${:.0} drop_to_liq={:.2}%",
                math::wad_to_f64(entry.health_factor),
                entry.debt_value_usd,
                entry.price_drop_to_liquidate_pct,
            ));
        }

        if let Ok(balance) = self.sender.native_balance().await {
            lines.push(format!(
                "liquidator balance: {:.4} native",
                math::wad_to_f64(balance)
            ));
        }

        // Venue depth snapshot for the whitelisted flash sources.
        let pair_addrs: Vec<Address> =
            self.venues.v2_pairs.iter().map(|p| p.address).collect();
        if !pair_addrs.is_empty() {
            if let Ok(reserves) = self.probe.v2_reserves(&pair_addrs).await {
                let live = reserves.iter().filter(|r| r.is_some()).count();
                lines.push(format!("v2 pairs live: {live}/{}", pair_addrs.len()));
            }
        }
        let pool_addrs: Vec<Address> =
            self.venues.v3_pools.iter().map(|p| p.address).collect();
        if !pool_addrs.is_empty() {
            if let Ok(liquidity) = self.probe.v3_liquidity(&pool_addrs).await {
                let live = liquidity.iter().filter(|l| l.is_some()).count();
                lines.push(format!("v3 pools live: {live}/{}", pool_addrs.len()));
            }
        }

        let report = lines.join("\n");
        info!("Status report:\n{report}");
        self.notifier.info(&report).await;

        self.write_state_file()?;
        Ok(())
    }

    fn write_state_file(&self) -> Result<()> {
        let state = PersistentState {
            last_report_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };
        write_state_atomically(&self.config.state_file, &state)
    }
}

fn write_state_atomically(path: &str, state: &PersistentState) -> Result<()> {
    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
