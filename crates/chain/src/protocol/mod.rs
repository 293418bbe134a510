//! Read-only lending protocol access.
//!
//! The pipeline only ever needs two reads from the protocol: a user's
//! aggregate account health and the user's debt in one reserve. Both are
//! behind [`ProtocolClient`] so the pipeline can run against any backend.

mod aave;

pub use aave::AaveProtocolClient;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::error::FetchError;

/// Account health as reported by the protocol at read time.
///
/// Amounts are in the protocol's base currency units, ratios in basis points,
/// and `health_factor` is WAD-scaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub user: Address,
    pub total_collateral: U256,
    pub total_debt: U256,
    pub available_borrows: U256,
    /// Weighted liquidation threshold (bps)
    pub liquidation_threshold: U256,
    /// Weighted loan-to-value (bps)
    pub loan_to_value: U256,
    /// Health factor (WAD)
    pub health_factor: U256,
}

/// A user's outstanding debt in a single reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReserveDebt {
    pub stable_debt: U256,
    pub variable_debt: U256,
}

impl ReserveDebt {
    /// Total debt across both rate modes (saturating).
    pub fn total(&self) -> U256 {
        self.stable_debt.saturating_add(self.variable_debt)
    }
}

/// Read-only accessor for a lending protocol.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Fetch the current account-health snapshot for a user.
    async fn get_account_health(&self, user: Address) -> Result<AccountSnapshot, FetchError>;

    /// Fetch the user's stable and variable debt in `asset`.
    async fn get_user_reserve_debt(
        &self,
        user: Address,
        asset: Address,
    ) -> Result<ReserveDebt, FetchError>;
}
