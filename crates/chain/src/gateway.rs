//! Dual-endpoint RPC gateway with retry, failover and block subscription.
//!
//! Reads go to the public endpoint by default and fail over to the
//! transaction endpoint after a burst of network errors; transactions
//! always go to the transaction endpoint.

use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use alloy::primitives::Bytes;
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::TransactionRequest;
use anyhow::{anyhow, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Attempts per call, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Base backoff between attempts; doubles each retry (1s, 2s, 4s).
const RETRY_BASE: Duration = Duration::from_secs(1);

/// Consecutive network errors before reads fail over to the tx endpoint.
const FAILOVER_THRESHOLD: u32 = 2;

/// WebSocket reconnect backoff cap and attempt cap before degrading to polling.
const WS_BACKOFF_CAP: Duration = Duration::from_secs(30);
const WS_MAX_RECONNECTS: u32 = 10;

/// Per-call deadline.
const CALL_DEADLINE: Duration = Duration::from_secs(15);

/// Classification of an RPC failure, driving the recovery decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcErrorKind {
    /// Timeouts, missing revert data, malformed responses. Retried.
    Transient,
    /// Connection refused, DNS, reset. Retried; counts toward failover.
    Network,
    /// Explicit revert with reason. Never retried.
    Revert(String),
    /// Bad arguments or unsupported method. Never retried.
    InvalidInput,
}

impl RpcErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient | Self::Network)
    }

    /// Classify a transport/provider error from its display text.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("revert") && !lower.contains("missing revert data") {
            // Pull out the revert reason if one is present.
            let reason = lower
                .split("reverted")
                .nth(1)
                .or_else(|| lower.split("revert:").nth(1))
                .unwrap_or(&lower)
                .trim()
                .trim_start_matches(':')
                .trim()
                .to_string();
            return Self::Revert(reason);
        }
        if lower.contains("invalid argument")
            || lower.contains("invalid params")
            || lower.contains("method not found")
        {
            return Self::InvalidInput;
        }
        if lower.contains("connection refused")
            || lower.contains("connection reset")
            || lower.contains("dns")
            || lower.contains("error sending request")
            || lower.contains("connect")
        {
            return Self::Network;
        }
        // missing revert data, timeouts, error-processing-response all land here
        Self::Transient
    }
}

/// Backoff before retry attempt `n` (0-based): 1s, 2s, 4s.
pub fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE * (1u32 << attempt.min(2))
}

/// Dual-endpoint gateway: public read node + private transaction node.
pub struct RpcGateway {
    read_url: String,
    tx_url: String,
    ws_url: String,
    /// When set, reads are served by the tx endpoint.
    failed_over: AtomicBool,
    consecutive_net_errors: AtomicU32,
    /// Polling cadence when the subscription has degraded.
    poll_interval: Duration,
}

impl RpcGateway {
    pub fn new(read_url: &str, tx_url: &str, ws_url: &str, poll_interval: Duration) -> Self {
        Self {
            read_url: read_url.to_string(),
            tx_url: tx_url.to_string(),
            ws_url: ws_url.to_string(),
            failed_over: AtomicBool::new(false),
            consecutive_net_errors: AtomicU32::new(0),
            poll_interval,
        }
    }

    /// Verify both endpoints answer before the agent starts.
    pub async fn check_connectivity(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().connect_http(self.read_url.parse()?);
        let block = provider.get_block_number().await?;
        let tx_provider = ProviderBuilder::new().connect_http(self.tx_url.parse()?);
        tx_provider.get_chain_id().await?;
        info!(block, "RPC endpoints verified");
        Ok(block)
    }

    /// URL currently serving reads.
    pub fn active_read_url(&self) -> &str {
        if self.failed_over.load(Ordering::Relaxed) {
            &self.tx_url
        } else {
            &self.read_url
        }
    }

    pub fn tx_url(&self) -> &str {
        &self.tx_url
    }

    pub fn is_failed_over(&self) -> bool {
        self.failed_over.load(Ordering::Relaxed)
    }

    /// Manually restore reads to the public endpoint (coordinator calls this
    /// after a clean cycle).
    pub fn restore_read_endpoint(&self) {
        if self.failed_over.swap(false, Ordering::Relaxed) {
            info!(url = %self.read_url, "Read endpoint restored to public node");
        }
    }

    fn note_success(&self) {
        self.consecutive_net_errors.store(0, Ordering::Relaxed);
        if self.failed_over.swap(false, Ordering::Relaxed) {
            info!(url = %self.read_url, "Read endpoint restored to public node");
        }
    }

    fn note_network_error(&self) {
        let n = self.consecutive_net_errors.fetch_add(1, Ordering::Relaxed) + 1;
        if n >= FAILOVER_THRESHOLD && !self.failed_over.swap(true, Ordering::Relaxed) {
            warn!(
                errors = n,
                url = %self.tx_url,
                "Read endpoint failing, switching reads to tx endpoint"
            );
        }
    }

    /// `eth_call` against the active read endpoint, with the retry policy.
    pub async fn call(&self, tx: &TransactionRequest) -> Result<Bytes> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(retry_delay(attempt - 1)).await;
            }
            let url = self.active_read_url().to_string();
            let result = async {
                let provider = ProviderBuilder::new().connect_http(url.parse()?);
                let out =
                    tokio::time::timeout(CALL_DEADLINE, provider.call(tx.clone()).into_future())
                        .await
                        .map_err(|_| anyhow!("timeout after {:?}", CALL_DEADLINE))??;
                Ok::<Bytes, anyhow::Error>(out)
            }
            .await;

            match result {
                Ok(bytes) => {
                    self.note_success();
                    return Ok(bytes);
                }
                Err(e) => {
                    let kind = RpcErrorKind::classify(&e.to_string());
                    if matches!(kind, RpcErrorKind::Network) {
                        self.note_network_error();
                    }
                    if !kind.is_retryable() {
                        return Err(e);
                    }
                    debug!(attempt, error = %e, ?kind, "Retryable RPC error");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("RPC call failed")))
    }

    /// Current block number from the active read endpoint.
    pub async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().connect_http(self.active_read_url().parse()?);
        Ok(provider.get_block_number().await?)
    }

    /// Current gas price from the tx endpoint (the one that prices inclusion).
    pub async fn gas_price(&self) -> Result<u128> {
        let provider = ProviderBuilder::new().connect_http(self.tx_url.parse()?);
        Ok(provider.get_gas_price().await?)
    }

    /// Subscribe to new block numbers. Reconnects with doubling backoff up to
    /// 30s; after ten failed reconnects, degrades to fixed-interval polling of
    /// `eth_blockNumber`. The returned channel never closes on its own.
    pub fn subscribe_blocks(self: std::sync::Arc<Self>) -> mpsc::Receiver<u64> {
        let (tx, rx) = mpsc::channel(64);
        let gateway = self;
        tokio::spawn(async move {
            let mut reconnects = 0u32;
            let mut backoff = Duration::from_secs(1);
            loop {
                match gateway.run_ws_stream(&tx).await {
                    Ok(()) => {
                        warn!("Block subscription ended, reconnecting");
                    }
                    Err(e) => {
                        warn!(error = %e, "Block subscription failed");
                    }
                }
                reconnects += 1;
                if reconnects >= WS_MAX_RECONNECTS {
                    warn!(
                        reconnects,
                        interval_ms = gateway.poll_interval.as_millis() as u64,
                        "WebSocket exhausted, degrading to block polling"
                    );
                    gateway.run_poll_stream(&tx).await;
                    return;
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(WS_BACKOFF_CAP);
            }
        });
        rx
    }

    async fn run_ws_stream(&self, tx: &mpsc::Sender<u64>) -> Result<()> {
        let ws = WsConnect::new(self.ws_url.clone());
        let provider = ProviderBuilder::new().connect_ws(ws).await?;
        let sub = provider.subscribe_blocks().await?;
        let mut stream = sub.into_stream();
        info!(url = %self.ws_url, "Block subscription active");
        while let Some(header) = stream.next().await {
            if tx.send(header.number).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }

    async fn run_poll_stream(&self, tx: &mpsc::Sender<u64>) {
        let mut last = 0u64;
        loop {
            tokio::time::sleep(self.poll_interval).await;
            match self.block_number().await {
                Ok(block) if block > last => {
                    last = block;
                    if tx.send(block).await.is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Block poll failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delays() {
        assert_eq!(retry_delay(0), Duration::from_secs(1));
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(2), Duration::from_secs(4));
        // Capped past the schedule
        assert_eq!(retry_delay(9), Duration::from_secs(4));
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(
            RpcErrorKind::classify("error sending request for url"),
            RpcErrorKind::Network
        );
        assert_eq!(
            RpcErrorKind::classify("Connection refused (os error 111)"),
            RpcErrorKind::Network
        );
        assert_eq!(
            RpcErrorKind::classify("missing revert data in call exception"),
            RpcErrorKind::Transient
        );
        assert_eq!(
            RpcErrorKind::classify("timeout after 15s"),
            RpcErrorKind::Transient
        );
        assert!(matches!(
            RpcErrorKind::classify("execution reverted: SwapFailed"),
            RpcErrorKind::Revert(_)
        ));
        assert_eq!(
            RpcErrorKind::classify("invalid argument 0: json"),
            RpcErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_non_retryable_kinds() {
        assert!(!RpcErrorKind::Revert("SwapFailed".into()).is_retryable());
        assert!(!RpcErrorKind::InvalidInput.is_retryable());
        assert!(RpcErrorKind::Transient.is_retryable());
        assert!(RpcErrorKind::Network.is_retryable());
    }

    #[test]
    fn test_failover_threshold() {
        let gw = std::sync::Arc::new(RpcGateway::new(
            "http://localhost:1",
            "http://localhost:2",
            "ws://localhost:3",
            Duration::from_secs(2),
        ));
        assert!(!gw.is_failed_over());
        gw.note_network_error();
        assert!(!gw.is_failed_over());
        gw.note_network_error();
        assert!(gw.is_failed_over());
        assert_eq!(gw.active_read_url(), "http://localhost:2");

        gw.note_success();
        assert!(!gw.is_failed_over());
        assert_eq!(gw.active_read_url(), "http://localhost:1");
    }
}
