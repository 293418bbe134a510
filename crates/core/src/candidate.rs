//! Liquidation candidate produced by the health evaluator.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};

/// A (user, debt asset) pair that was eligible for liquidation when observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationCandidate {
    /// Borrower whose health factor fell below 1.0
    pub user: Address,

    /// Debt reserve that could be repaid
    pub asset: Address,

    /// Stable + variable debt in `asset` (asset base units)
    pub debt_to_cover: U256,

    /// Heuristic: `debt_to_cover * 110%`. Not protocol-accurate.
    pub estimated_collateral_seized: U256,

    /// Block whose transactions triggered the evaluation
    pub detected_at_block: u64,

    /// Wall-clock detection time
    pub detected_at_time: DateTime<Utc>,
}

impl LiquidationCandidate {
    /// Key used for alert deduplication.
    pub fn key(&self) -> (Address, Address) {
        (self.user, self.asset)
    }
}
