//! DEX interfaces: V2 router/pair, V3 pool, Curve-style stable pool.

use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{bail, Result};

sol! {
    interface IUniswapV2Router {
        function getAmountsOut(uint256 amountIn, address[] calldata path)
            external view returns (uint256[] memory amounts);
    }

    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }

    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );
        function liquidity() external view returns (uint128);
        function fee() external view returns (uint24);
    }

    interface ICurvePool {
        function get_dy(int128 i, int128 j, uint256 dx) external view returns (uint256);
        function balances(uint256 i) external view returns (uint256);
    }
}

pub fn amounts_out_call(amount_in: U256, path: Vec<Address>) -> Vec<u8> {
    IUniswapV2Router::getAmountsOutCall {
        amountIn: amount_in,
        path,
    }
    .abi_encode()
}

pub fn get_reserves_call() -> Vec<u8> {
    IUniswapV2Pair::getReservesCall {}.abi_encode()
}

pub fn slot0_call() -> Vec<u8> {
    IUniswapV3Pool::slot0Call {}.abi_encode()
}

pub fn v3_liquidity_call() -> Vec<u8> {
    IUniswapV3Pool::liquidityCall {}.abi_encode()
}

pub fn get_dy_call(i: i128, j: i128, dx: U256) -> Vec<u8> {
    ICurvePool::get_dyCall { i, j, dx }.abi_encode()
}

pub fn decode_amounts_out(data: &[u8]) -> Result<Vec<U256>> {
    if data.is_empty() {
        bail!("empty getAmountsOut return");
    }
    Ok(IUniswapV2Router::getAmountsOutCall::abi_decode_returns(data)?)
}

pub fn decode_reserves(data: &[u8]) -> Result<(U256, U256)> {
    if data.is_empty() {
        bail!("empty getReserves return");
    }
    let ret = IUniswapV2Pair::getReservesCall::abi_decode_returns(data)?;
    Ok((ret.reserve0.to::<U256>(), ret.reserve1.to::<U256>()))
}

pub fn decode_sqrt_price(data: &[u8]) -> Result<U256> {
    if data.is_empty() {
        bail!("empty slot0 return");
    }
    let ret = IUniswapV3Pool::slot0Call::abi_decode_returns(data)?;
    Ok(ret.sqrtPriceX96.to::<U256>())
}

pub fn decode_v3_liquidity(data: &[u8]) -> Result<U256> {
    if data.is_empty() {
        bail!("empty liquidity return");
    }
    Ok(U256::from(IUniswapV3Pool::liquidityCall::abi_decode_returns(
        data,
    )?))
}

pub fn decode_dy(data: &[u8]) -> Result<U256> {
    if data.is_empty() {
        bail!("empty get_dy return");
    }
    Ok(ICurvePool::get_dyCall::abi_decode_returns(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolValue;

    #[test]
    fn test_decode_dy() {
        let encoded = U256::from(525_800_000u64).abi_encode();
        assert_eq!(decode_dy(&encoded).unwrap(), U256::from(525_800_000u64));
    }

    #[test]
    fn test_decode_amounts_out() {
        let encoded = vec![U256::from(100u64), U256::from(99u64)].abi_encode();
        let amounts = decode_amounts_out(&encoded).unwrap();
        assert_eq!(amounts.last().copied(), Some(U256::from(99u64)));
    }
}
