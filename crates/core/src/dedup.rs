//! Alert deduplication state.
//!
//! One record per (user, asset). Check-and-record runs under the map's
//! per-key entry lock, so two concurrent detections of the same key can
//! never both pass.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Source of wall-clock time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The system clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Dedup key: (user, debt asset).
pub type AlertKey = (Address, Address);

/// Last alert sent for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub alerted_at: DateTime<Utc>,
    pub block: u64,
}

/// Flat, serializable form of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupEntry {
    pub user: Address,
    pub asset: Address,
    pub alerted_at: DateTime<Utc>,
    pub block: u64,
}

fn to_chrono(window: Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX)
}

/// Cooldown bookkeeping for sent alerts.
#[derive(Debug, Default)]
pub struct AlertDedupState {
    entries: DashMap<AlertKey, AlertRecord>,
}

impl AlertDedupState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an alert for `key` at `at` unless one was recorded less than
    /// `cooldown` earlier. Returns the blocking record on rejection.
    ///
    /// A stored record newer than `at` also blocks.
    pub fn try_record(
        &self,
        key: AlertKey,
        at: DateTime<Utc>,
        block: u64,
        cooldown: Duration,
    ) -> Result<(), AlertRecord> {
        let cooldown = to_chrono(cooldown);
        let record = AlertRecord {
            alerted_at: at,
            block,
        };

        match self.entries.entry(key) {
            Entry::Occupied(mut existing) => {
                let elapsed = at.signed_duration_since(existing.get().alerted_at);
                if elapsed < cooldown {
                    return Err(*existing.get());
                }
                existing.insert(record);
                Ok(())
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Drop records whose cooldown has fully elapsed at `now`.
    pub fn evict_expired(&self, now: DateTime<Utc>, cooldown: Duration) -> usize {
        let cooldown = to_chrono(cooldown);
        let before = self.entries.len();
        self.entries
            .retain(|_, record| now.signed_duration_since(record.alerted_at) < cooldown);
        before.saturating_sub(self.entries.len())
    }

    pub fn get(&self, key: &AlertKey) -> Option<AlertRecord> {
        self.entries.get(key).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of all records, for persistence.
    pub fn snapshot(&self) -> Vec<DedupEntry> {
        self.entries
            .iter()
            .map(|entry| {
                let (user, asset) = *entry.key();
                DedupEntry {
                    user,
                    asset,
                    alerted_at: entry.alerted_at,
                    block: entry.block,
                }
            })
            .collect()
    }

    /// Replace all records with persisted ones.
    pub fn restore(&self, entries: impl IntoIterator<Item = DedupEntry>) {
        self.entries.clear();
        for entry in entries {
            self.entries.insert(
                (entry.user, entry.asset),
                AlertRecord {
                    alerted_at: entry.alerted_at,
                    block: entry.block,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(n: u8) -> AlertKey {
        (Address::repeat_byte(n), Address::repeat_byte(0xA0))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    const COOLDOWN: Duration = Duration::from_secs(300);

    #[test]
    fn test_cooldown_suppresses_repeat() {
        let dedup = AlertDedupState::new();
        assert!(dedup.try_record(key(1), at(0), 10, COOLDOWN).is_ok());

        let blocked = dedup.try_record(key(1), at(120), 11, COOLDOWN).unwrap_err();
        assert_eq!(blocked.block, 10);
        assert_eq!(blocked.alerted_at, at(0));

        // Exactly at the window boundary
        assert!(dedup.try_record(key(1), at(300), 12, COOLDOWN).is_ok());
        assert_eq!(dedup.get(&key(1)).unwrap().block, 12);
    }

    #[test]
    fn test_keys_are_independent() {
        let dedup = AlertDedupState::new();
        assert!(dedup.try_record(key(1), at(0), 1, COOLDOWN).is_ok());
        assert!(dedup.try_record(key(2), at(1), 1, COOLDOWN).is_ok());

        let other_asset = (Address::repeat_byte(1), Address::repeat_byte(0xB0));
        assert!(dedup.try_record(other_asset, at(2), 1, COOLDOWN).is_ok());
        assert_eq!(dedup.len(), 3);
    }

    #[test]
    fn test_clock_going_backwards_blocks() {
        let dedup = AlertDedupState::new();
        assert!(dedup.try_record(key(1), at(1000), 1, COOLDOWN).is_ok());
        assert!(dedup.try_record(key(1), at(0), 2, COOLDOWN).is_err());
    }

    #[test]
    fn test_evict_expired() {
        let dedup = AlertDedupState::new();
        dedup.try_record(key(1), at(0), 1, COOLDOWN).unwrap();
        dedup.try_record(key(2), at(200), 2, COOLDOWN).unwrap();

        assert_eq!(dedup.evict_expired(at(300), COOLDOWN), 1);
        assert!(dedup.get(&key(1)).is_none());
        assert!(dedup.get(&key(2)).is_some());
    }

    #[test]
    fn test_concurrent_record_single_winner() {
        let dedup = Arc::new(AlertDedupState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dedup = dedup.clone();
                std::thread::spawn(move || dedup.try_record(key(7), at(0), 1, COOLDOWN).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_snapshot_restore() {
        let dedup = AlertDedupState::new();
        dedup.try_record(key(1), at(0), 5, COOLDOWN).unwrap();
        dedup.try_record(key(2), at(10), 6, COOLDOWN).unwrap();

        let restored = AlertDedupState::new();
        restored.restore(dedup.snapshot());
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(&key(2)), dedup.get(&key(2)));
        assert!(restored.try_record(key(1), at(60), 7, COOLDOWN).is_err());
    }
}
