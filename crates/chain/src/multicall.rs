//! Batched reads through the chain's Multicall3 aggregator contract.
//!
//! Every sub-call runs with `allowFailure = true` so one bad target never
//! poisons the batch; callers get per-call success flags back in input order.

use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::debug;

use crate::gateway::RpcGateway;

sol! {
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

/// Soft limit of sub-calls per aggregate3 roundtrip.
pub const CALL_CHUNK: usize = 50;

/// A single sub-call to batch.
#[derive(Debug, Clone)]
pub struct SubCall {
    pub target: Address,
    pub call_data: Bytes,
}

impl SubCall {
    pub fn new(target: Address, call_data: impl Into<Bytes>) -> Self {
        Self {
            target,
            call_data: call_data.into(),
        }
    }
}

/// Per-call outcome, in input order.
#[derive(Debug, Clone)]
pub struct SubResult {
    pub success: bool,
    pub return_data: Bytes,
}

/// Number of aggregate3 roundtrips needed for `n` sub-calls.
pub fn roundtrips(n: usize) -> usize {
    n.div_ceil(CALL_CHUNK)
}

/// Multicall3 wrapper issuing chunked aggregate3 calls via the gateway.
#[derive(Clone)]
pub struct Multicall {
    address: Address,
    gateway: Arc<RpcGateway>,
}

impl Multicall {
    pub fn new(address: Address, gateway: Arc<RpcGateway>) -> Self {
        Self { address, gateway }
    }

    /// Execute all sub-calls, chunked at [`CALL_CHUNK`], preserving order.
    pub async fn aggregate(&self, calls: &[SubCall]) -> Result<Vec<SubResult>> {
        let mut out = Vec::with_capacity(calls.len());
        for chunk in calls.chunks(CALL_CHUNK) {
            out.extend(self.aggregate_chunk(chunk).await?);
        }
        Ok(out)
    }

    async fn aggregate_chunk(&self, chunk: &[SubCall]) -> Result<Vec<SubResult>> {
        let calls: Vec<IMulticall3::Call3> = chunk
            .iter()
            .map(|c| IMulticall3::Call3 {
                target: c.target,
                allowFailure: true,
                callData: c.call_data.clone(),
            })
            .collect();

        let calldata = IMulticall3::aggregate3Call { calls }.abi_encode();
        let tx = TransactionRequest::default()
            .to(self.address)
            .input(calldata.into());

        let raw = self.gateway.call(&tx).await?;
        let decoded = IMulticall3::aggregate3Call::abi_decode_returns(&raw)?;
        if decoded.len() != chunk.len() {
            bail!(
                "aggregate3 returned {} results for {} calls",
                decoded.len(),
                chunk.len()
            );
        }

        let failures = decoded.iter().filter(|r| !r.success).count();
        if failures > 0 {
            debug!(total = chunk.len(), failures, "aggregate3 partial failures");
        }

        Ok(decoded
            .into_iter()
            .map(|r| SubResult {
                success: r.success,
                return_data: r.returnData,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_count() {
        assert_eq!(roundtrips(0), 0);
        assert_eq!(roundtrips(1), 1);
        assert_eq!(roundtrips(50), 1);
        assert_eq!(roundtrips(51), 2);
        assert_eq!(roundtrips(100), 2);
        assert_eq!(roundtrips(101), 3);
    }

    #[test]
    fn test_aggregate3_encoding() {
        let call = IMulticall3::aggregate3Call {
            calls: vec![IMulticall3::Call3 {
                target: Address::repeat_byte(0xAA),
                allowFailure: true,
                callData: Bytes::from(vec![0x01, 0x02]),
            }],
        };
        let encoded = call.abi_encode();
        // 4-byte selector + ABI payload
        assert!(encoded.len() > 4);
        assert_eq!(&encoded[..4], &IMulticall3::aggregate3Call::SELECTOR);
    }
}
