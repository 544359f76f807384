//! Reserve asset registry.
//!
//! Resolved once at startup from the protocol data provider: receipt-token
//! addresses, decimals and the stable flag for every reserve of every
//! configured pool.

use alloy::primitives::Address;
use anyhow::{bail, Result};
use std::collections::HashMap;
use tracing::info;

use liquidator_chain::contracts::pool as pool_abi;
use liquidator_chain::{Multicall, SubCall};

/// One reserve of the money market.
#[derive(Debug, Clone)]
pub struct ReserveAsset {
    pub address: Address,
    pub decimals: u8,
    pub stable: bool,
    /// Receipt token for supplied collateral.
    pub a_token: Address,
    /// Receipt token for variable-rate debt.
    pub variable_debt_token: Address,
}

#[derive(Debug, Default)]
pub struct AssetRegistry {
    by_address: HashMap<Address, ReserveAsset>,
}

impl AssetRegistry {
    /// Resolve receipt tokens and decimals for all reserves in one batched
    /// read against the data provider.
    pub async fn load(
        reserves: &[Address],
        stable_assets: &[Address],
        data_provider: Address,
        multicall: &Multicall,
    ) -> Result<Self> {
        if reserves.is_empty() {
            bail!("no reserves configured");
        }

        let mut calls = Vec::with_capacity(reserves.len() * 2);
        for asset in reserves {
            calls.push(SubCall::new(
                data_provider,
                pool_abi::reserve_tokens_call(*asset),
            ));
            calls.push(SubCall::new(
                data_provider,
                pool_abi::reserve_config_call(*asset),
            ));
        }
        let results = multicall.aggregate(&calls).await?;

        let mut by_address = HashMap::with_capacity(reserves.len());
        for (i, asset) in reserves.iter().enumerate() {
            let tokens = &results[i * 2];
            let config = &results[i * 2 + 1];
            if !tokens.success || !config.success {
                bail!("reserve {asset} metadata read failed");
            }
            let (a_token, _, variable_debt_token) =
                pool_abi::decode_reserve_tokens(&tokens.return_data)?;
            let reserve_config = pool_abi::ReserveConfig::decode(&config.return_data)?;

            by_address.insert(
                *asset,
                ReserveAsset {
                    address: *asset,
                    decimals: reserve_config.decimals,
                    stable: stable_assets.contains(asset),
                    a_token,
                    variable_debt_token,
                },
            );
        }

        info!(reserves = by_address.len(), "Asset registry resolved");
        Ok(Self { by_address })
    }

    pub fn from_assets(assets: Vec<ReserveAsset>) -> Self {
        Self {
            by_address: assets.into_iter().map(|a| (a.address, a)).collect(),
        }
    }

    pub fn get(&self, address: &Address) -> Option<&ReserveAsset> {
        self.by_address.get(address)
    }

    pub fn all(&self) -> impl Iterator<Item = &ReserveAsset> {
        self.by_address.values()
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let usdc = Address::repeat_byte(0x01);
        let registry = AssetRegistry::from_assets(vec![ReserveAsset {
            address: usdc,
            decimals: 6,
            stable: true,
            a_token: Address::repeat_byte(0x11),
            variable_debt_token: Address::repeat_byte(0x21),
        }]);

        let asset = registry.get(&usdc).unwrap();
        assert_eq!(asset.decimals, 6);
        assert!(asset.stable);
        assert!(registry.get(&Address::repeat_byte(0x99)).is_none());
    }
}
