//! On-chain liquidation contract interface.
//!
//! The contract is the execution primitive: it flash-borrows the debt asset,
//! performs `liquidationCall`, swaps seized collateral back and repays the
//! flash source in one transaction. The agent addresses it through three
//! overloads distinguished by flash source.
//!
//! A residual swap with `amountIn = 0` tells the contract to swap its
//! observed post-liquidation balance; the builder never predicts the residual.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};
use anyhow::{bail, Result};

sol! {
    struct LiquidationParams {
        address collateralAsset;
        address debtAsset;
        address user;
        uint256 amount;
        uint256 transferAmount;
        uint256 debtToCover;
    }

    struct SwapParams {
        uint8 swapKind;
        address router;
        bytes path;
        uint256 amountIn;
        uint256 amountOutMin;
        address[] adapters;
    }

    interface ILiquidationExecutor {
        function executeWithFlashPool(
            LiquidationParams calldata params,
            SwapParams calldata primarySwap,
            SwapParams calldata residualSwap,
            address receiver
        ) external;

        function executeWithV2FlashSwap(
            address pair,
            LiquidationParams calldata params,
            SwapParams calldata primarySwap,
            SwapParams calldata residualSwap,
            address receiver
        ) external;

        function executeWithV3Flash(
            address pool,
            LiquidationParams calldata params,
            SwapParams calldata primarySwap,
            SwapParams calldata residualSwap,
            address receiver
        ) external;
    }
}

/// Swap venue discriminant understood by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SwapKind {
    V2 = 0,
    V3 = 1,
    NativeAggregator = 2,
    ExternalAggregator = 3,
}

impl SwapKind {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::V2),
            1 => Some(Self::V3),
            2 => Some(Self::NativeAggregator),
            3 => Some(Self::ExternalAggregator),
            _ => None,
        }
    }
}

/// One swap leg of a liquidation, pre-encoded for the contract.
#[derive(Debug, Clone)]
pub struct SwapLeg {
    pub kind: SwapKind,
    pub router: Address,
    pub path: Bytes,
    pub amount_in: U256,
    pub amount_out_min: U256,
}

impl SwapLeg {
    /// A residual leg: the contract swaps whatever balance it observes.
    pub fn residual(kind: SwapKind, router: Address, path: Bytes) -> Self {
        Self {
            kind,
            router,
            path,
            amount_in: U256::ZERO,
            amount_out_min: U256::ZERO,
        }
    }

    fn to_sol(&self) -> SwapParams {
        SwapParams {
            swapKind: self.kind as u8,
            router: self.router,
            path: self.path.clone(),
            amountIn: self.amount_in,
            amountOutMin: self.amount_out_min,
            adapters: Vec::new(),
        }
    }
}

/// Which contract overload to call, carrying the flash source when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractMethod {
    /// Money-market flash loan.
    FlashPool,
    /// Constant-product flash-swap against the given pair.
    V2FlashSwap(Address),
    /// Concentrated-liquidity flash against the given pool.
    V3Flash(Address),
}

impl ContractMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FlashPool => "executeWithFlashPool",
            Self::V2FlashSwap(_) => "executeWithV2FlashSwap",
            Self::V3Flash(_) => "executeWithV3Flash",
        }
    }
}

/// Liquidation parameters for the contract call.
#[derive(Debug, Clone)]
pub struct ExecuteParams {
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub user: Address,
    /// Flash-borrowed amount.
    pub amount: U256,
    /// Amount forwarded into `liquidationCall`.
    pub transfer_amount: U256,
    pub debt_to_cover: U256,
}

impl ExecuteParams {
    fn to_sol(&self) -> LiquidationParams {
        LiquidationParams {
            collateralAsset: self.collateral_asset,
            debtAsset: self.debt_asset,
            user: self.user,
            amount: self.amount,
            transferAmount: self.transfer_amount,
            debtToCover: self.debt_to_cover,
        }
    }
}

/// Encode the full calldata for the chosen overload.
pub fn encode_execute(
    method: ContractMethod,
    params: &ExecuteParams,
    primary: &SwapLeg,
    residual: &SwapLeg,
    receiver: Address,
) -> Bytes {
    let encoded = match method {
        ContractMethod::FlashPool => ILiquidationExecutor::executeWithFlashPoolCall {
            params: params.to_sol(),
            primarySwap: primary.to_sol(),
            residualSwap: residual.to_sol(),
            receiver,
        }
        .abi_encode(),
        ContractMethod::V2FlashSwap(pair) => ILiquidationExecutor::executeWithV2FlashSwapCall {
            pair,
            params: params.to_sol(),
            primarySwap: primary.to_sol(),
            residualSwap: residual.to_sol(),
            receiver,
        }
        .abi_encode(),
        ContractMethod::V3Flash(pool) => ILiquidationExecutor::executeWithV3FlashCall {
            pool,
            params: params.to_sol(),
            primarySwap: primary.to_sol(),
            residualSwap: residual.to_sol(),
            receiver,
        }
        .abi_encode(),
    };
    Bytes::from(encoded)
}

// ---- swap path codecs ----
//
// V2:    concatenated 20-byte token addresses
// V3:    token ++ uint24 fee ++ token, byte-packed
// Stable/aggregator: abi.encode(token0, token1, innerCalldata)

pub fn encode_v2_path(tokens: &[Address]) -> Bytes {
    let mut out = Vec::with_capacity(tokens.len() * 20);
    for token in tokens {
        out.extend_from_slice(token.as_slice());
    }
    Bytes::from(out)
}

pub fn decode_v2_path(path: &Bytes) -> Result<Vec<Address>> {
    if path.is_empty() || path.len() % 20 != 0 {
        bail!("malformed V2 path length {}", path.len());
    }
    Ok(path
        .chunks_exact(20)
        .map(Address::from_slice)
        .collect())
}

pub fn encode_v3_path(token_in: Address, fee_micro: u32, token_out: Address) -> Bytes {
    let mut out = Vec::with_capacity(43);
    out.extend_from_slice(token_in.as_slice());
    out.extend_from_slice(&fee_micro.to_be_bytes()[1..]); // uint24
    out.extend_from_slice(token_out.as_slice());
    Bytes::from(out)
}

pub fn decode_v3_path(path: &Bytes) -> Result<(Address, u32, Address)> {
    if path.len() != 43 {
        bail!("malformed V3 path length {}", path.len());
    }
    let token_in = Address::from_slice(&path[..20]);
    let fee = u32::from_be_bytes([0, path[20], path[21], path[22]]);
    let token_out = Address::from_slice(&path[23..43]);
    Ok((token_in, fee, token_out))
}

pub fn encode_pair_path(token0: Address, token1: Address, inner: Bytes) -> Bytes {
    Bytes::from((token0, token1, inner).abi_encode())
}

pub fn decode_pair_path(path: &Bytes) -> Result<(Address, Address, Bytes)> {
    Ok(<(Address, Address, Bytes)>::abi_decode(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_path_roundtrip() {
        let tokens = vec![
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            Address::repeat_byte(0x33),
        ];
        let path = encode_v2_path(&tokens);
        assert_eq!(path.len(), 60);
        assert_eq!(decode_v2_path(&path).unwrap(), tokens);
    }

    #[test]
    fn test_v3_path_roundtrip() {
        let a = Address::repeat_byte(0xAA);
        let b = Address::repeat_byte(0xBB);
        let path = encode_v3_path(a, 3000, b);
        assert_eq!(path.len(), 43);
        assert_eq!(decode_v3_path(&path).unwrap(), (a, 3000, b));
    }

    #[test]
    fn test_pair_path_roundtrip() {
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        let inner = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);
        let path = encode_pair_path(a, b, inner.clone());
        assert_eq!(decode_pair_path(&path).unwrap(), (a, b, inner));
    }

    #[test]
    fn test_malformed_paths_rejected() {
        assert!(decode_v2_path(&Bytes::from(vec![0u8; 19])).is_err());
        assert!(decode_v2_path(&Bytes::new()).is_err());
        assert!(decode_v3_path(&Bytes::from(vec![0u8; 42])).is_err());
    }

    #[test]
    fn test_residual_leg_zero_amounts() {
        let leg = SwapLeg::residual(
            SwapKind::V2,
            Address::repeat_byte(0x99),
            encode_v2_path(&[Address::repeat_byte(1), Address::repeat_byte(2)]),
        );
        assert_eq!(leg.amount_in, U256::ZERO);
        assert_eq!(leg.amount_out_min, U256::ZERO);
    }

    #[test]
    fn test_encode_execute_selectors_differ() {
        let params = ExecuteParams {
            collateral_asset: Address::repeat_byte(1),
            debt_asset: Address::repeat_byte(2),
            user: Address::repeat_byte(3),
            amount: U256::from(1000u64),
            transfer_amount: U256::from(1000u64),
            debt_to_cover: U256::from(1000u64),
        };
        let leg = SwapLeg::residual(SwapKind::V2, Address::ZERO, Bytes::new());

        let a = encode_execute(ContractMethod::FlashPool, &params, &leg, &leg, Address::ZERO);
        let b = encode_execute(
            ContractMethod::V2FlashSwap(Address::repeat_byte(4)),
            &params,
            &leg,
            &leg,
            Address::ZERO,
        );
        let c = encode_execute(
            ContractMethod::V3Flash(Address::repeat_byte(5)),
            &params,
            &leg,
            &leg,
            Address::ZERO,
        );
        assert_ne!(&a[..4], &b[..4]);
        assert_ne!(&b[..4], &c[..4]);
        assert_ne!(&a[..4], &c[..4]);
    }
}
