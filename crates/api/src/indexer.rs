//! Subgraph indexer client supplying the borrower universe.
//!
//! The indexer exposes a GraphQL `users { id }` query; pages are pulled with
//! `(first, skip)` until a page shorter than `first` arrives.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Borrowers per page.
const PAGE_SIZE: usize = 100;

/// Deadline per page request.
const PAGE_DEADLINE: Duration = Duration::from_secs(30);

const USERS_QUERY: &str = "query($first: Int!, $skip: Int!) { users(first: $first, skip: $skip) { id } }";

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<UsersData>,
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UsersData {
    users: Vec<UserRow>,
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: String,
}

#[derive(Debug, Clone)]
pub struct IndexerClient {
    client: reqwest::Client,
    url: String,
    page_size: usize,
}

impl IndexerClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(PAGE_DEADLINE)
                .build()
                .unwrap_or_default(),
            url: url.into(),
            page_size: PAGE_SIZE,
        }
    }

    /// Pull the full borrower list, page by page, until exhaustion.
    #[instrument(skip(self))]
    pub async fn fetch_all_borrowers(&self) -> Result<Vec<Address>> {
        let mut borrowers = Vec::new();
        let mut skip = 0usize;

        loop {
            let page = self.fetch_page(self.page_size, skip).await?;
            let fetched = page.len();
            borrowers.extend(page);

            debug!(skip, fetched, total = borrowers.len(), "Indexer page");
            if fetched < self.page_size {
                break;
            }
            skip += self.page_size;
        }

        info!(total = borrowers.len(), "Borrower universe fetched");
        Ok(borrowers)
    }

    async fn fetch_page(&self, first: usize, skip: usize) -> Result<Vec<Address>> {
        let body = json!({
            "query": USERS_QUERY,
            "variables": { "first": first, "skip": skip },
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("indexer request failed")?;

        let parsed: GraphResponse = response.json().await.context("indexer response malformed")?;
        if let Some(errors) = parsed.errors {
            anyhow::bail!("indexer returned errors: {errors}");
        }

        let rows = parsed
            .data
            .map(|d| d.users)
            .unwrap_or_default();

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match row.id.parse::<Address>() {
                Ok(addr) => out.push(addr),
                Err(_) => warn!(id = %row.id, "Skipping unparseable borrower id"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"data":{"users":[
            {"id":"0x1111111111111111111111111111111111111111"},
            {"id":"0x2222222222222222222222222222222222222222"}
        ]}}"#;
        let parsed: GraphResponse = serde_json::from_str(raw).unwrap();
        let users = parsed.data.unwrap().users;
        assert_eq!(users.len(), 2);
        assert!(users[0].id.parse::<Address>().is_ok());
    }

    #[test]
    fn test_error_response_parsing() {
        let raw = r#"{"data":null,"errors":[{"message":"rate limited"}]}"#;
        let parsed: GraphResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.errors.is_some());
        assert!(parsed.data.is_none());
    }
}
