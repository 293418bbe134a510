//! Processing cursor with reorg detection.
//!
//! Tracks the highest fully processed block, at most one in-flight block,
//! and the hashes of the most recent committed heights. A block is identified
//! by `(height, hash)`: a committed height seen again with a different hash
//! is a reorganization and gets re-run.

use alloy::primitives::B256;
use sentinel_chain::BlockRef;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a block was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Height above the cursor
    New,
    /// Committed height whose canonical hash changed
    Reorg { previous: B256 },
}

/// Ticket for a block admitted for processing. Hand it back to
/// [`BlockCursor::complete`] or [`BlockCursor::abandon`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct AdmittedBlock {
    pub number: u64,
    pub hash: B256,
    pub admission: Admission,
}

impl AdmittedBlock {
    pub fn is_reorg(&self) -> bool {
        matches!(self.admission, Admission::Reorg { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("block {number} already processed (cursor at {cursor})")]
    AlreadyProcessed { number: u64, cursor: u64 },

    #[error("block {in_flight} is still being processed")]
    Busy { in_flight: u64 },
}

/// Monotonic, exactly-once block cursor.
#[derive(Debug, Clone)]
pub struct BlockCursor {
    last_processed: u64,
    in_flight: Option<u64>,
    hashes: BTreeMap<u64, B256>,
    window: usize,
}

impl BlockCursor {
    /// Cursor positioned so that `last_processed + 1` is the next block.
    pub fn new(last_processed: u64, window: usize) -> Self {
        Self {
            last_processed,
            in_flight: None,
            hashes: BTreeMap::new(),
            window: window.max(1),
        }
    }

    /// Rebuild a cursor from persisted state.
    pub fn restore(
        last_processed: u64,
        recent: impl IntoIterator<Item = BlockRef>,
        window: usize,
    ) -> Self {
        let mut cursor = Self::new(last_processed, window);
        for block in recent {
            if block.number <= last_processed {
                cursor.hashes.insert(block.number, block.hash);
            }
        }
        cursor.prune();
        cursor
    }

    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Recorded hash of a committed height still inside the window.
    pub fn hash_at(&self, number: u64) -> Option<B256> {
        self.hashes.get(&number).copied()
    }

    /// Whether `(number, hash)` contradicts a recorded committed block.
    pub fn is_reorg(&self, number: u64, hash: B256) -> bool {
        self.hash_at(number).is_some_and(|recorded| recorded != hash)
    }

    /// Admit a block for processing.
    pub fn admit(&mut self, number: u64, hash: B256) -> Result<AdmittedBlock, CursorError> {
        if self.in_flight == Some(number) {
            return Err(CursorError::AlreadyProcessed {
                number,
                cursor: self.last_processed,
            });
        }

        let admission = if number <= self.last_processed {
            match self.hash_at(number) {
                Some(previous) if previous != hash => Admission::Reorg { previous },
                _ => {
                    return Err(CursorError::AlreadyProcessed {
                        number,
                        cursor: self.last_processed,
                    })
                }
            }
        } else {
            Admission::New
        };

        if let Some(in_flight) = self.in_flight {
            if number < in_flight && admission == Admission::New {
                return Err(CursorError::AlreadyProcessed {
                    number,
                    cursor: self.last_processed,
                });
            }
            return Err(CursorError::Busy { in_flight });
        }

        self.in_flight = Some(number);
        Ok(AdmittedBlock {
            number,
            hash,
            admission,
        })
    }

    /// Commit a block whose candidates were fully extracted.
    pub fn complete(&mut self, block: AdmittedBlock) {
        if self.in_flight == Some(block.number) {
            self.in_flight = None;
        }
        self.last_processed = self.last_processed.max(block.number);
        self.hashes.insert(block.number, block.hash);
        self.prune();
    }

    /// Release a block without advancing.
    pub fn abandon(&mut self, block: AdmittedBlock) {
        if self.in_flight == Some(block.number) {
            self.in_flight = None;
        }
    }

    /// Committed `(height, hash)` pairs, oldest first.
    pub fn recent_hashes(&self) -> Vec<BlockRef> {
        self.hashes
            .iter()
            .map(|(&number, &hash)| BlockRef { number, hash })
            .collect()
    }

    fn prune(&mut self) {
        while self.hashes.len() > self.window {
            self.hashes.pop_first();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> B256 {
        B256::repeat_byte(n)
    }

    #[test]
    fn test_admit_complete_advances() {
        let mut cursor = BlockCursor::new(99, 16);
        let block = cursor.admit(100, hash(1)).unwrap();
        assert_eq!(block.admission, Admission::New);
        assert_eq!(cursor.in_flight(), Some(100));

        cursor.complete(block);
        assert_eq!(cursor.last_processed(), 100);
        assert_eq!(cursor.in_flight(), None);
        assert_eq!(cursor.hash_at(100), Some(hash(1)));
    }

    #[test]
    fn test_same_block_twice_rejected() {
        let mut cursor = BlockCursor::new(99, 16);
        let _block = cursor.admit(100, hash(1)).unwrap();
        assert_eq!(
            cursor.admit(100, hash(1)),
            Err(CursorError::AlreadyProcessed { number: 100, cursor: 99 })
        );
        // Lower while in flight
        assert!(matches!(
            cursor.admit(99, hash(1)),
            Err(CursorError::AlreadyProcessed { number: 99, .. })
        ));
    }

    #[test]
    fn test_committed_block_rejected() {
        let mut cursor = BlockCursor::new(99, 16);
        let block = cursor.admit(100, hash(1)).unwrap();
        cursor.complete(block);

        assert!(matches!(
            cursor.admit(100, hash(1)),
            Err(CursorError::AlreadyProcessed { number: 100, cursor: 100 })
        ));
        assert!(matches!(
            cursor.admit(50, hash(1)),
            Err(CursorError::AlreadyProcessed { .. })
        ));
    }

    #[test]
    fn test_rejection_leaves_state_unchanged() {
        let mut cursor = BlockCursor::new(99, 16);
        let block = cursor.admit(100, hash(1)).unwrap();
        cursor.complete(block);
        let before = cursor.recent_hashes();

        let _ = cursor.admit(100, hash(1));
        assert_eq!(cursor.last_processed(), 100);
        assert_eq!(cursor.in_flight(), None);
        assert_eq!(cursor.recent_hashes(), before);
    }

    #[test]
    fn test_reorg_admitted_with_different_hash() {
        let mut cursor = BlockCursor::new(99, 16);
        for (n, h) in [(100, 1), (101, 2)] {
            let block = cursor.admit(n, hash(h)).unwrap();
            cursor.complete(block);
        }

        assert!(cursor.is_reorg(100, hash(9)));
        assert!(!cursor.is_reorg(100, hash(1)));

        let replay = cursor.admit(100, hash(9)).unwrap();
        assert_eq!(replay.admission, Admission::Reorg { previous: hash(1) });
        assert!(replay.is_reorg());
        cursor.complete(replay);

        // Never regresses
        assert_eq!(cursor.last_processed(), 101);
        assert_eq!(cursor.hash_at(100), Some(hash(9)));
    }

    #[test]
    fn test_busy_while_in_flight() {
        let mut cursor = BlockCursor::new(99, 16);
        let block = cursor.admit(100, hash(1)).unwrap();
        assert_eq!(
            cursor.admit(101, hash(2)),
            Err(CursorError::Busy { in_flight: 100 })
        );
        cursor.abandon(block);
        assert_eq!(cursor.last_processed(), 99);
        assert!(cursor.admit(100, hash(1)).is_ok());
    }

    #[test]
    fn test_window_bounds_reorg_detection() {
        let mut cursor = BlockCursor::new(0, 3);
        for n in 1..=5u64 {
            let block = cursor.admit(n, hash(n as u8)).unwrap();
            cursor.complete(block);
        }
        assert_eq!(cursor.recent_hashes().len(), 3);
        assert_eq!(cursor.hash_at(2), None);
        // Outside the window a differing hash cannot be recognised
        assert!(matches!(
            cursor.admit(2, hash(0xEE)),
            Err(CursorError::AlreadyProcessed { .. })
        ));
        assert!(cursor.admit(4, hash(0xEE)).unwrap().is_reorg());
    }

    #[test]
    fn test_restore() {
        let recent = vec![
            BlockRef { number: 9, hash: hash(9) },
            BlockRef { number: 10, hash: hash(10) },
            BlockRef { number: 11, hash: hash(11) },
        ];
        let cursor = BlockCursor::restore(10, recent, 16);
        assert_eq!(cursor.last_processed(), 10);
        assert_eq!(cursor.hash_at(10), Some(hash(10)));
        // Heights above the cursor are never committed
        assert_eq!(cursor.hash_at(11), None);
    }
}
