//! External swap-aggregator client, the fallback venue when no direct pool
//! can absorb the collateral.
//!
//! The aggregator returns ready-made calldata which the on-chain contract
//! executes as an `ExternalAggregator` swap leg.

use alloy::primitives::{Address, Bytes, U256};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const QUOTE_DEADLINE: Duration = Duration::from_secs(10);

/// Quote request sent to the aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorRequest {
    pub chain_id: u64,
    pub from_token: Address,
    pub to_token: Address,
    pub from_amount: U256,
    pub from_address: Address,
    pub to_address: Address,
    /// Tolerance as a decimal fraction, e.g. 0.03.
    pub slippage: f64,
}

/// Quote returned by the aggregator.
#[derive(Debug, Clone)]
pub struct AggregatorQuote {
    /// Target contract to call.
    pub to: Address,
    /// Opaque calldata for the swap.
    pub data: Bytes,
    pub to_amount: U256,
    pub to_amount_min: U256,
    pub from_amount_usd: f64,
    pub to_amount_usd: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    transaction_request: TxRequest,
    estimate: Estimate,
}

#[derive(Debug, Deserialize)]
struct TxRequest {
    to: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Estimate {
    to_amount: String,
    to_amount_min: String,
    #[serde(default, rename = "fromAmountUSD")]
    from_amount_usd: Option<String>,
    #[serde(default, rename = "toAmountUSD")]
    to_amount_usd: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AggregatorClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AggregatorClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(QUOTE_DEADLINE)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    #[instrument(skip(self, req), fields(from = %req.from_token, to = %req.to_token))]
    pub async fn quote(&self, req: &AggregatorRequest) -> Result<AggregatorQuote> {
        let url = format!("{}/quote", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[
                ("chainId", req.chain_id.to_string()),
                ("fromToken", format!("{:?}", req.from_token)),
                ("toToken", format!("{:?}", req.to_token)),
                ("fromAmount", req.from_amount.to_string()),
                ("fromAddress", format!("{:?}", req.from_address)),
                ("toAddress", format!("{:?}", req.to_address)),
                ("slippage", format!("{}", req.slippage)),
            ])
            .send()
            .await
            .context("aggregator request failed")?
            .error_for_status()
            .context("aggregator rejected quote request")?;

        let parsed: QuoteResponse = response.json().await.context("aggregator response malformed")?;
        let quote = AggregatorQuote {
            to: parsed.transaction_request.to.parse()?,
            data: parsed.transaction_request.data.parse::<Bytes>()?,
            to_amount: U256::from_str_radix(&parsed.estimate.to_amount, 10)?,
            to_amount_min: U256::from_str_radix(&parsed.estimate.to_amount_min, 10)?,
            from_amount_usd: parse_usd(parsed.estimate.from_amount_usd),
            to_amount_usd: parse_usd(parsed.estimate.to_amount_usd),
        };

        debug!(
            to_amount = %quote.to_amount,
            to_amount_min = %quote.to_amount_min,
            "Aggregator quote"
        );
        Ok(quote)
    }
}

fn parse_usd(raw: Option<String>) -> f64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_response_parsing() {
        let raw = r#"{
            "transactionRequest": {
                "to": "0x1231deb6f5749ef6ce6943a275a1d3e7486f4eae",
                "data": "0xdeadbeef"
            },
            "estimate": {
                "toAmount": "525800000",
                "toAmountMin": "520000000",
                "fromAmountUSD": "526.10",
                "toAmountUSD": "525.80"
            }
        }"#;
        let parsed: QuoteResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.estimate.to_amount, "525800000");
        assert_eq!(parsed.estimate.to_amount_min, "520000000");
        assert_eq!(parse_usd(parsed.estimate.to_amount_usd), 525.80);
    }

    #[test]
    fn test_quote_response_missing_usd() {
        let raw = r#"{
            "transactionRequest": {"to": "0x0", "data": "0x"},
            "estimate": {"toAmount": "1", "toAmountMin": "1"}
        }"#;
        let parsed: QuoteResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parse_usd(parsed.estimate.from_amount_usd), 0.0);
    }
}
