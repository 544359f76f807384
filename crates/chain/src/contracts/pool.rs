//! Money-market pool, oracle and data-provider interfaces.

use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{bail, Result};

sol! {
    interface IPool {
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );
    }

    interface IAaveOracle {
        function getAssetPrice(address asset) external view returns (uint256);
        function getSourceOfAsset(address asset) external view returns (address);
    }

    interface IProtocolDataProvider {
        function getReserveConfigurationData(address asset) external view returns (
            uint256 decimals,
            uint256 ltv,
            uint256 liquidationThreshold,
            uint256 liquidationBonus,
            uint256 reserveFactor,
            bool usageAsCollateralEnabled,
            bool borrowingEnabled,
            bool stableBorrowRateEnabled,
            bool isActive,
            bool isFrozen
        );

        function getReserveTokensAddresses(address asset) external view returns (
            address aTokenAddress,
            address stableDebtTokenAddress,
            address variableDebtTokenAddress
        );
    }

    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string memory);
    }
}

/// Health snapshot for one borrower, base values in the oracle numeraire
/// (8 fractional digits), health factor in WAD.
#[derive(Debug, Clone, Copy)]
pub struct AccountHealth {
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub health_factor: U256,
}

impl AccountHealth {
    /// Decode an `getUserAccountData` multicall return payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            bail!("empty getUserAccountData return");
        }
        let ret = IPool::getUserAccountDataCall::abi_decode_returns(data)?;
        Ok(Self {
            total_collateral_base: ret.totalCollateralBase,
            total_debt_base: ret.totalDebtBase,
            health_factor: ret.healthFactor,
        })
    }
}

/// Reserve configuration as read from the data provider.
#[derive(Debug, Clone, Copy)]
pub struct ReserveConfig {
    pub decimals: u8,
    pub ltv_bps: u32,
    pub liquidation_threshold_bps: u32,
    /// Bonus factor over 10 000, e.g. 10 500 = 5% bonus.
    pub liquidation_bonus: u32,
    pub active: bool,
    pub frozen: bool,
}

impl ReserveConfig {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            bail!("empty getReserveConfigurationData return");
        }
        let ret = IProtocolDataProvider::getReserveConfigurationDataCall::abi_decode_returns(data)?;
        Ok(Self {
            decimals: ret.decimals.to::<u8>(),
            ltv_bps: ret.ltv.to::<u32>(),
            liquidation_threshold_bps: ret.liquidationThreshold.to::<u32>(),
            liquidation_bonus: ret.liquidationBonus.to::<u32>(),
            active: ret.isActive,
            frozen: ret.isFrozen,
        })
    }
}

/// Calldata builders used by the batched readers.
pub fn user_account_data_call(user: Address) -> Vec<u8> {
    IPool::getUserAccountDataCall { user }.abi_encode()
}

pub fn asset_price_call(asset: Address) -> Vec<u8> {
    IAaveOracle::getAssetPriceCall { asset }.abi_encode()
}

pub fn reserve_config_call(asset: Address) -> Vec<u8> {
    IProtocolDataProvider::getReserveConfigurationDataCall { asset }.abi_encode()
}

pub fn reserve_tokens_call(asset: Address) -> Vec<u8> {
    IProtocolDataProvider::getReserveTokensAddressesCall { asset }.abi_encode()
}

pub fn balance_of_call(account: Address) -> Vec<u8> {
    IERC20::balanceOfCall { account }.abi_encode()
}

pub fn decode_price(data: &[u8]) -> Result<U256> {
    if data.is_empty() {
        bail!("empty getAssetPrice return");
    }
    Ok(IAaveOracle::getAssetPriceCall::abi_decode_returns(data)?)
}

pub fn decode_balance(data: &[u8]) -> Result<U256> {
    if data.is_empty() {
        bail!("empty balanceOf return");
    }
    Ok(IERC20::balanceOfCall::abi_decode_returns(data)?)
}

pub fn decode_reserve_tokens(data: &[u8]) -> Result<(Address, Address, Address)> {
    if data.is_empty() {
        bail!("empty getReserveTokensAddresses return");
    }
    let ret = IProtocolDataProvider::getReserveTokensAddressesCall::abi_decode_returns(data)?;
    Ok((
        ret.aTokenAddress,
        ret.stableDebtTokenAddress,
        ret.variableDebtTokenAddress,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolValue;

    #[test]
    fn test_account_health_roundtrip() {
        let encoded = (
            U256::from(1_000_00000000u64),
            U256::from(800_00000000u64),
            U256::ZERO,
            U256::from(8250u64),
            U256::from(8000u64),
            U256::from(950_000_000_000_000_000u128), // HF 0.95
        )
            .abi_encode();

        let health = AccountHealth::decode(&encoded).unwrap();
        assert_eq!(health.total_debt_base, U256::from(800_00000000u64));
        assert_eq!(
            health.health_factor,
            U256::from(950_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_empty_return_is_error() {
        assert!(AccountHealth::decode(&[]).is_err());
        assert!(decode_price(&[]).is_err());
    }
}
