//! Opportunity filter: minimum amount, then cooldown.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::candidate::LiquidationCandidate;
use crate::config::ConfigHandle;
use crate::dedup::AlertDedupState;

/// Outcome of filtering one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// Passed both checks; the alert has been recorded.
    Accept,
    /// `debt_to_cover` below the configured minimum
    BelowMinimum { minimum: U256 },
    /// Alerted for the same (user, asset) within the cooldown window
    CoolingDown {
        last_alerted: DateTime<Utc>,
        last_block: u64,
    },
}

/// Decides whether a candidate becomes an alert.
#[derive(Debug, Clone)]
pub struct OpportunityFilter {
    config: ConfigHandle,
    dedup: Arc<AlertDedupState>,
}

impl OpportunityFilter {
    pub fn new(config: ConfigHandle, dedup: Arc<AlertDedupState>) -> Self {
        Self { config, dedup }
    }

    /// Thresholds come from the configuration snapshot at call time.
    pub fn decide(&self, candidate: &LiquidationCandidate) -> FilterDecision {
        let config = self.config.current();

        if candidate.debt_to_cover < config.min_liquidation_amount {
            return FilterDecision::BelowMinimum {
                minimum: config.min_liquidation_amount,
            };
        }

        match self.dedup.try_record(
            candidate.key(),
            candidate.detected_at_time,
            candidate.detected_at_block,
            config.cooldown_window(),
        ) {
            Ok(()) => FilterDecision::Accept,
            Err(previous) => FilterDecision::CoolingDown {
                last_alerted: previous.alerted_at,
                last_block: previous.block,
            },
        }
    }
}
