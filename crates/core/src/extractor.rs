//! Candidate extraction from block transactions.
//!
//! Selector-based heuristic: a sender calling a known user action on one of
//! the protocol contracts gets re-evaluated. Health changes caused by price
//! moves or third-party liquidations are not visible here.

use alloy::primitives::Address;
use sentinel_chain::{BlockData, TxSummary, UserAction};
use std::collections::HashSet;
use tracing::trace;

/// Picks the users touched by protocol calls in a block.
#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    contracts: HashSet<Address>,
}

impl CandidateExtractor {
    pub fn new(contracts: HashSet<Address>) -> Self {
        Self { contracts }
    }

    /// Recognised action for a single transaction, if any.
    pub fn classify(&self, tx: &TxSummary) -> Option<UserAction> {
        let to = tx.to?;
        if !self.contracts.contains(&to) {
            return None;
        }
        UserAction::from_calldata(&tx.input)
    }

    /// Unique senders of recognised protocol interactions.
    pub fn extract(&self, block: &BlockData) -> HashSet<Address> {
        let mut users = HashSet::new();
        for tx in &block.transactions {
            if let Some(action) = self.classify(tx) {
                trace!(
                    tx = %tx.hash,
                    user = %tx.from,
                    action = action.name(),
                    "Protocol interaction"
                );
                users.insert(tx.from);
            }
        }
        users
    }
}
