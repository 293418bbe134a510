//! Aave-style pool + data provider implementation of [`ProtocolClient`].

use alloy::primitives::Address;
use alloy::providers::ProviderBuilder;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tracing::debug;

use super::{AccountSnapshot, ProtocolClient, ReserveDebt};
use crate::contracts::{ILendingPool, IProtocolDataProvider};
use crate::error::FetchError;

/// Protocol client reading the pool's `getUserAccountData` and the data
/// provider's `getUserReserveData` over HTTP.
#[derive(Debug, Clone)]
pub struct AaveProtocolClient {
    rpc_url: Url,
    pool: Address,
    data_provider: Address,
}

impl AaveProtocolClient {
    /// Create a client for the given pool and data provider.
    pub fn new(rpc_url: &str, pool: Address, data_provider: Address) -> Result<Self, FetchError> {
        let rpc_url = rpc_url.parse::<Url>().map_err(|e| FetchError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            rpc_url,
            pool,
            data_provider,
        })
    }
}

#[async_trait]
impl ProtocolClient for AaveProtocolClient {
    async fn get_account_health(&self, user: Address) -> Result<AccountSnapshot, FetchError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let pool = ILendingPool::new(self.pool, &provider);

        let data = pool
            .getUserAccountData(user)
            .call()
            .await
            .map_err(|e| FetchError::contract("getUserAccountData", e))?;

        debug!(
            user = %user,
            health_factor = %data.healthFactor,
            total_debt = %data.totalDebtBase,
            "Account data fetched"
        );

        Ok(AccountSnapshot {
            user,
            total_collateral: data.totalCollateralBase,
            total_debt: data.totalDebtBase,
            available_borrows: data.availableBorrowsBase,
            liquidation_threshold: data.currentLiquidationThreshold,
            loan_to_value: data.ltv,
            health_factor: data.healthFactor,
        })
    }

    async fn get_user_reserve_debt(
        &self,
        user: Address,
        asset: Address,
    ) -> Result<ReserveDebt, FetchError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let data_provider = IProtocolDataProvider::new(self.data_provider, &provider);

        let data = data_provider
            .getUserReserveData(asset, user)
            .call()
            .await
            .map_err(|e| FetchError::contract("getUserReserveData", e))?;

        Ok(ReserveDebt {
            stable_debt: data.currentStableDebt,
            variable_debt: data.currentVariableDebt,
        })
    }
}
