//! Health evaluation: turns a protocol account snapshot into a liquidation
//! verdict and per-asset candidates.
//!
//! The eligibility check and the collateral estimate are pure functions.
//! [`HealthEvaluator::evaluate`] wraps them with the protocol reads, retrying
//! each read on its own. A read that still fails is returned as
//! [`FetchError`]; it is never reported as "not eligible".

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use sentinel_chain::{AccountSnapshot, FetchError, ProtocolClient};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::candidate::LiquidationCandidate;
use crate::retry::RetryPolicy;
use crate::u256_math::{apply_basis_points_up, is_liquidatable_wad, wad_to_f64};

/// Placeholder liquidation bonus applied to the collateral estimate (10%).
/// Heuristic only; real bonuses are set per reserve by the protocol.
pub const ESTIMATED_BONUS_BPS: u16 = 1000;

/// Result of evaluating one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Health factor at or above 1.0
    NotEligible { health_factor: U256 },
    /// Health factor below 1.0. `candidates` holds one entry per monitored
    /// asset with non-zero debt and may be empty.
    Eligible {
        snapshot: AccountSnapshot,
        candidates: Vec<LiquidationCandidate>,
    },
}

impl Evaluation {
    pub fn candidates(&self) -> &[LiquidationCandidate] {
        match self {
            Self::NotEligible { .. } => &[],
            Self::Eligible { candidates, .. } => candidates,
        }
    }
}

/// Strict `health_factor < 1.0`; exactly 1.0 is not eligible.
#[inline]
pub fn is_eligible(snapshot: &AccountSnapshot) -> bool {
    is_liquidatable_wad(snapshot.health_factor)
}

/// Heuristic collateral estimate: `debt * 11000 / 10000`.
#[inline]
pub fn estimate_seized_collateral(debt_to_cover: U256) -> U256 {
    apply_basis_points_up(debt_to_cover, ESTIMATED_BONUS_BPS)
}

/// Build a candidate for one asset. Zero debt yields nothing.
pub fn candidate_for(
    user: Address,
    asset: Address,
    debt_to_cover: U256,
    block: u64,
    detected_at: DateTime<Utc>,
) -> Option<LiquidationCandidate> {
    if debt_to_cover.is_zero() {
        return None;
    }
    Some(LiquidationCandidate {
        user,
        asset,
        debt_to_cover,
        estimated_collateral_seized: estimate_seized_collateral(debt_to_cover),
        detected_at_block: block,
        detected_at_time: detected_at,
    })
}

/// Evaluates users against the protocol.
pub struct HealthEvaluator {
    protocol: Arc<dyn ProtocolClient>,
    retry: RetryPolicy,
}

impl HealthEvaluator {
    pub fn new(protocol: Arc<dyn ProtocolClient>, retry: RetryPolicy) -> Self {
        Self { protocol, retry }
    }

    /// Read the user's snapshot and, if eligible, their debt in each asset.
    #[instrument(skip_all, fields(user = %user, block = block))]
    pub async fn evaluate(
        &self,
        user: Address,
        assets: &[Address],
        block: u64,
        detected_at: DateTime<Utc>,
    ) -> Result<Evaluation, FetchError> {
        let snapshot = self
            .retry
            .run(
                "get_account_health",
                || self.protocol.get_account_health(user),
                FetchError::is_retryable,
            )
            .await?;

        if !is_eligible(&snapshot) {
            debug!(hf = wad_to_f64(snapshot.health_factor), "Position healthy");
            return Ok(Evaluation::NotEligible {
                health_factor: snapshot.health_factor,
            });
        }

        let mut candidates = Vec::with_capacity(assets.len());
        for &asset in assets {
            let debt = self
                .retry
                .run(
                    "get_user_reserve_debt",
                    || self.protocol.get_user_reserve_debt(user, asset),
                    FetchError::is_retryable,
                )
                .await?;

            if let Some(candidate) = candidate_for(user, asset, debt.total(), block, detected_at) {
                candidates.push(candidate);
            }
        }

        debug!(
            hf = wad_to_f64(snapshot.health_factor),
            candidates = candidates.len(),
            "Position eligible for liquidation"
        );

        Ok(Evaluation::Eligible {
            snapshot,
            candidates,
        })
    }
}
