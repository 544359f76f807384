//! Transaction signing and submission through the private endpoint.
//!
//! The nonce is tracked locally with an atomic counter so the hot path never
//! pays an extra RPC roundtrip; it resyncs from the chain after a revert.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Gas limit budgeted for a flash-loan liquidation with two swaps.
const DEFAULT_GAS_LIMIT: u64 = 1_900_000;

pub struct TransactionSender {
    tx_url: String,
    wallet: EthereumWallet,
    pub address: Address,
    chain_id: u64,
    nonce: AtomicU64,
    gas_limit: u64,
}

impl TransactionSender {
    pub async fn new(private_key: &str, tx_url: &str, chain_id: u64) -> Result<Self> {
        let signer: PrivateKeySigner = private_key.trim_start_matches("0x").parse()?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new().connect_http(tx_url.parse()?);
        let initial_nonce = provider.get_transaction_count(address).await?;

        info!(
            address = %address,
            chain_id,
            nonce = initial_nonce,
            "Transaction sender initialized"
        );

        Ok(Self {
            tx_url: tx_url.to_string(),
            wallet,
            address,
            chain_id,
            nonce: AtomicU64::new(initial_nonce),
            gas_limit: DEFAULT_GAS_LIMIT,
        })
    }

    /// Sign, submit and wait for inclusion. Returns the tx hash on success;
    /// resyncs the nonce and errors if the transaction reverted.
    pub async fn send(
        &self,
        to: Address,
        calldata: Bytes,
        gas_price: u128,
    ) -> Result<B256> {
        let started = Instant::now();
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);

        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata)
            .with_nonce(nonce)
            .with_gas_limit(self.gas_limit)
            .with_gas_price(gas_price)
            .with_chain_id(self.chain_id);

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .connect_http(self.tx_url.parse()?);

        let pending = provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = %tx_hash, nonce, "Transaction broadcast, awaiting receipt");

        let receipt = pending.get_receipt().await?;
        if receipt.status() {
            info!(
                tx_hash = %tx_hash,
                block = receipt.block_number.unwrap_or(0),
                gas_used = receipt.gas_used,
                total_ms = started.elapsed().as_millis() as u64,
                "Transaction confirmed"
            );
            Ok(tx_hash)
        } else {
            warn!(tx_hash = %tx_hash, "Transaction reverted, resyncing nonce");
            self.sync_nonce().await;
            anyhow::bail!("transaction reverted: {tx_hash}")
        }
    }

    pub async fn sync_nonce(&self) {
        let Ok(url) = self.tx_url.parse() else { return };
        let provider = ProviderBuilder::new().connect_http(url);
        match provider.get_transaction_count(self.address).await {
            Ok(chain_nonce) => {
                self.nonce.store(chain_nonce, Ordering::SeqCst);
                debug!(nonce = chain_nonce, "Nonce resynced");
            }
            Err(e) => warn!(error = %e, "Nonce resync failed"),
        }
    }

    pub fn current_nonce(&self) -> u64 {
        self.nonce.load(Ordering::SeqCst)
    }

    /// Native balance of the signing account.
    pub async fn native_balance(&self) -> Result<U256> {
        let provider = ProviderBuilder::new().connect_http(self.tx_url.parse()?);
        Ok(provider.get_balance(self.address).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_sender_creation() {
        // Well-known test key; never funded on mainnet.
        let key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let sender = TransactionSender::new(key, "http://localhost:8545", 31337).await;
        if let Ok(sender) = sender {
            assert_eq!(
                format!("{:?}", sender.address).to_lowercase(),
                "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
            );
        }
    }
}
