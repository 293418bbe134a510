//! Liquidation sentinel core logic.
//!
//! This crate provides the detection-and-alert pipeline:
//! - Health evaluation of protocol account snapshots
//! - Block cursor with reorg detection by (height, hash)
//! - Selector-based candidate extraction from block transactions
//! - Minimum-amount and cooldown filtering of candidates
//! - Off-path alert dispatch with bounded retry
//! - Monitor loop (backfill + live heads) and durable state

mod candidate;
pub mod config;
mod cursor;
mod dedup;
mod evaluator;
mod extractor;
mod filter;
mod monitor;
mod notifier;
mod retry;
mod state;
mod stats;
pub mod u256_math;

#[cfg(test)]
pub(crate) mod testing;

pub use candidate::LiquidationCandidate;
pub use config::{ConfigError, ConfigHandle, ConfigUpdate, MonitorConfig, StartBlock};
pub use cursor::{Admission, AdmittedBlock, BlockCursor, CursorError};
pub use dedup::{system_clock, AlertDedupState, AlertRecord, Clock, DedupEntry};
pub use evaluator::{
    candidate_for, estimate_seized_collateral, is_eligible, Evaluation, HealthEvaluator,
    ESTIMATED_BONUS_BPS,
};
pub use extractor::CandidateExtractor;
pub use filter::{FilterDecision, OpportunityFilter};
pub use monitor::{BlockOutcome, BlockReport, Monitor};
pub use notifier::{format_alert, Notifier};
pub use retry::RetryPolicy;
pub use state::{PersistedBlock, PersistedState, StateError, StateStore};
pub use stats::{MonitorStats, StatsSnapshot};
