//! Notification channel with alert and info destinations.
//!
//! Delivery failures are logged and swallowed; a notification must never take
//! the agent down. Repeated identical payloads within the dedup window are
//! dropped to prevent spam during error storms.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long an identical payload is suppressed after delivery.
const DEDUP_WINDOW: Duration = Duration::from_secs(300);

#[async_trait]
pub trait Notifier: Send + Sync {
    /// High-signal events: liquidation found, executed, execution reverted.
    async fn alert(&self, text: &str);
    /// Operational chatter: status summaries, RPC mode changes.
    async fn info(&self, text: &str);
}

/// Webhook-backed notifier posting preformatted text to two destinations.
pub struct WebhookNotifier {
    client: reqwest::Client,
    alert_url: String,
    info_url: String,
    recent: DashMap<u64, Instant>,
}

impl WebhookNotifier {
    pub fn new(alert_url: impl Into<String>, info_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            alert_url: alert_url.into(),
            info_url: info_url.into(),
            recent: DashMap::new(),
        }
    }

    fn is_duplicate(&self, text: &str) -> bool {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let key = hasher.finish();

        if let Some(sent_at) = self.recent.get(&key) {
            if sent_at.elapsed() < DEDUP_WINDOW {
                return true;
            }
        }
        self.recent.insert(key, Instant::now());
        self.recent.retain(|_, at| at.elapsed() < DEDUP_WINDOW);
        false
    }

    async fn post(&self, url: &str, text: &str) {
        if self.is_duplicate(text) {
            debug!("Suppressing duplicate notification");
            return;
        }
        let body = serde_json::json!({ "text": text });
        match self.client.post(url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!(status = %resp.status(), "Notification rejected"),
            Err(e) => warn!(error = %e, "Notification delivery failed"),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn alert(&self, text: &str) {
        self.post(&self.alert_url, text).await;
    }

    async fn info(&self, text: &str) {
        self.post(&self.info_url, text).await;
    }
}

/// No-op notifier for when no channel is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn alert(&self, _text: &str) {}
    async fn info(&self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_window() {
        let notifier = WebhookNotifier::new("http://localhost/a", "http://localhost/i");
        assert!(!notifier.is_duplicate("scan failed: timeout"));
        assert!(notifier.is_duplicate("scan failed: timeout"));
        assert!(!notifier.is_duplicate("scan failed: connection refused"));
    }

    #[tokio::test]
    async fn test_noop_notifier() {
        let notifier = NoopNotifier;
        notifier.alert("nothing happens").await;
        notifier.info("nothing happens").await;
    }
}
