//! Batched swap quoting across V2, V3 and stable venues.
//!
//! All quote requests for one decision are packed into a single aggregate3
//! roundtrip (chunked at the multicall limit). V3 output is computed locally
//! from `slot0`'s sqrt price; that figure is for candidate ranking only and
//! never becomes a transaction's `minOut`.

use alloy::primitives::{Address, U256, U512};
use anyhow::Result;
use tracing::debug;

use crate::contracts::dex;
use crate::multicall::{Multicall, SubCall};

/// DEX topology of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    V2,
    V3,
    Stable,
}

impl Venue {
    pub fn name(&self) -> &'static str {
        match self {
            Self::V2 => "v2",
            Self::V3 => "v3",
            Self::Stable => "stable",
        }
    }
}

/// A concrete pool the agent may quote or flash against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRef {
    pub venue: Venue,
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    /// Fee in millionths (V3 tier / V2 30_000 / stable pool fee).
    pub fee_micro: u32,
    /// Coin indices for stable pools; unused elsewhere.
    pub index0: i128,
    pub index1: i128,
}

impl PoolRef {
    pub fn carries(&self, token: Address) -> bool {
        self.token0 == token || self.token1 == token
    }

    pub fn pairs(&self, a: Address, b: Address) -> bool {
        (self.token0 == a && self.token1 == b) || (self.token0 == b && self.token1 == a)
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_micro / 100
    }
}

/// One quote to resolve.
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub pool: PoolRef,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
}

/// A resolved quote.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    pub venue: Venue,
    pub pool: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee_bps: u32,
}

impl Quote {
    /// A quote is usable when it returns more than it consumes after fees.
    pub fn is_usable(&self) -> bool {
        let fees = self.amount_in * U256::from(self.fee_bps) / U256::from(10_000u64);
        self.amount_out > self.amount_in + fees
    }
}

/// Output estimate from a V3 sqrt price: `amountIn * (sqrtP^2 / 2^192)`
/// for token0 -> token1, reciprocal otherwise, less the fee tier.
/// Valid only for sizes small relative to in-tick liquidity.
pub fn v3_output_from_sqrt_price(
    amount_in: U256,
    sqrt_price_x96: U256,
    fee_micro: u32,
    zero_for_one: bool,
) -> U256 {
    if sqrt_price_x96.is_zero() {
        return U256::ZERO;
    }
    let amount = U512::from(amount_in);
    let sqrt = U512::from(sqrt_price_x96);
    let gross = if zero_for_one {
        (amount * sqrt * sqrt) >> 192
    } else {
        (amount << 192) / (sqrt * sqrt)
    };
    let net: U512 = gross * U512::from(1_000_000u64 - fee_micro as u64) / U512::from(1_000_000u64);
    net.saturating_to::<U256>()
}

/// Batched quoting over the aggregator-call contract.
#[derive(Clone)]
pub struct LiquidityProbe {
    multicall: Multicall,
    v2_router: Address,
}

impl LiquidityProbe {
    pub fn new(multicall: Multicall, v2_router: Address) -> Self {
        Self {
            multicall,
            v2_router,
        }
    }

    /// Resolve all requests in one aggregate3 pass (chunked internally).
    /// Failed sub-calls yield `None` in their slot; order is preserved.
    pub async fn quote_batch(&self, requests: &[QuoteRequest]) -> Result<Vec<Option<Quote>>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let calls: Vec<SubCall> = requests.iter().map(|r| self.build_call(r)).collect();
        let results = self.multicall.aggregate(&calls).await?;

        let quotes = requests
            .iter()
            .zip(results)
            .map(|(req, res)| {
                if !res.success {
                    debug!(pool = %req.pool.address, venue = req.pool.venue.name(), "Quote sub-call failed");
                    return None;
                }
                self.decode_quote(req, &res.return_data)
            })
            .collect();
        Ok(quotes)
    }

    fn build_call(&self, req: &QuoteRequest) -> SubCall {
        match req.pool.venue {
            Venue::V2 => SubCall::new(
                self.v2_router,
                dex::amounts_out_call(req.amount_in, vec![req.token_in, req.token_out]),
            ),
            Venue::V3 => SubCall::new(req.pool.address, dex::slot0_call()),
            Venue::Stable => {
                let (i, j) = if req.token_in == req.pool.token0 {
                    (req.pool.index0, req.pool.index1)
                } else {
                    (req.pool.index1, req.pool.index0)
                };
                SubCall::new(req.pool.address, dex::get_dy_call(i, j, req.amount_in))
            }
        }
    }

    fn decode_quote(&self, req: &QuoteRequest, data: &[u8]) -> Option<Quote> {
        let amount_out = match req.pool.venue {
            Venue::V2 => dex::decode_amounts_out(data).ok()?.last().copied()?,
            Venue::V3 => {
                let sqrt_price = dex::decode_sqrt_price(data).ok()?;
                v3_output_from_sqrt_price(
                    req.amount_in,
                    sqrt_price,
                    req.pool.fee_micro,
                    req.token_in == req.pool.token0,
                )
            }
            Venue::Stable => dex::decode_dy(data).ok()?,
        };
        Some(Quote {
            venue: req.pool.venue,
            pool: req.pool.address,
            amount_in: req.amount_in,
            amount_out,
            fee_bps: req.pool.fee_bps(),
        })
    }

    /// Read V2 reserves for a set of pairs in one batch; results keyed by
    /// input order, `(reserve0, reserve1)`.
    pub async fn v2_reserves(&self, pairs: &[Address]) -> Result<Vec<Option<(U256, U256)>>> {
        let calls: Vec<SubCall> = pairs
            .iter()
            .map(|p| SubCall::new(*p, dex::get_reserves_call()))
            .collect();
        let results = self.multicall.aggregate(&calls).await?;
        Ok(results
            .into_iter()
            .map(|r| {
                if r.success {
                    dex::decode_reserves(&r.return_data).ok()
                } else {
                    None
                }
            })
            .collect())
    }

    /// Read in-range liquidity for a set of V3 pools in one batch.
    pub async fn v3_liquidity(&self, pools: &[Address]) -> Result<Vec<Option<U256>>> {
        let calls: Vec<SubCall> = pools
            .iter()
            .map(|p| SubCall::new(*p, dex::v3_liquidity_call()))
            .collect();
        let results = self.multicall.aggregate(&calls).await?;
        Ok(results
            .into_iter()
            .map(|r| {
                if r.success {
                    dex::decode_v3_liquidity(&r.return_data).ok()
                } else {
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// sqrtPriceX96 = 2^96 encodes price 1.0.
    const SQRT_ONE: u128 = 1u128 << 96;

    #[test]
    fn test_v3_output_at_unit_price() {
        let amount = U256::from(1_000_000u64);
        // No fee: output equals input at price 1.0
        let out = v3_output_from_sqrt_price(amount, U256::from(SQRT_ONE), 0, true);
        assert_eq!(out, amount);

        // 0.3% fee tier
        let out = v3_output_from_sqrt_price(amount, U256::from(SQRT_ONE), 3000, true);
        assert_eq!(out, U256::from(997_000u64));

        // Reciprocal direction is symmetric at unit price
        let out = v3_output_from_sqrt_price(amount, U256::from(SQRT_ONE), 3000, false);
        assert_eq!(out, U256::from(997_000u64));
    }

    #[test]
    fn test_v3_output_price_four() {
        // sqrtP = 2 * 2^96 encodes price 4.0 for token0 -> token1
        let sqrt = U256::from(SQRT_ONE) * U256::from(2u64);
        let amount = U256::from(1_000u64);
        let out = v3_output_from_sqrt_price(amount, sqrt, 0, true);
        assert_eq!(out, U256::from(4_000u64));

        let back = v3_output_from_sqrt_price(out, sqrt, 0, false);
        assert_eq!(back, amount);
    }

    #[test]
    fn test_v3_zero_price_yields_zero() {
        assert_eq!(
            v3_output_from_sqrt_price(U256::from(1000u64), U256::ZERO, 3000, true),
            U256::ZERO
        );
    }

    #[test]
    fn test_quote_usability() {
        let quote = Quote {
            venue: Venue::Stable,
            pool: Address::ZERO,
            amount_in: U256::from(1_000_000u64),
            amount_out: U256::from(1_010_000u64),
            fee_bps: 4,
        };
        assert!(quote.is_usable());

        let breakeven = Quote {
            amount_out: U256::from(1_000_400u64),
            ..quote
        };
        assert!(!breakeven.is_usable());
    }

    #[test]
    fn test_pool_ref_pairing() {
        let pool = PoolRef {
            venue: Venue::Stable,
            address: Address::repeat_byte(9),
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            fee_micro: 400,
            index0: 0,
            index1: 1,
        };
        assert!(pool.pairs(Address::repeat_byte(1), Address::repeat_byte(2)));
        assert!(pool.pairs(Address::repeat_byte(2), Address::repeat_byte(1)));
        assert!(!pool.pairs(Address::repeat_byte(1), Address::repeat_byte(3)));
        assert_eq!(pool.fee_bps(), 4);
    }
}
