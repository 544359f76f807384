//! Off-chain HTTP clients for external services.
//!
//! This crate provides:
//! - Subgraph indexer: the borrower universe, paginated
//! - External swap aggregator: fallback routing for collateral exits
//! - Notification channel: alert and info destinations

mod aggregator;
mod indexer;
mod notify;

pub use aggregator::{AggregatorClient, AggregatorQuote, AggregatorRequest};
pub use indexer::IndexerClient;
pub use notify::{NoopNotifier, Notifier, WebhookNotifier};
