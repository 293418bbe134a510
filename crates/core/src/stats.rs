//! Runtime counters for the monitor.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Lock-free pipeline counters, shared between the monitor and the notifier.
#[derive(Debug, Default)]
pub struct MonitorStats {
    blocks_processed: AtomicU64,
    blocks_failed: AtomicU64,
    reorgs: AtomicU64,
    users_evaluated: AtomicU64,
    fetch_errors: AtomicU64,
    candidates: AtomicU64,
    alerts_suppressed: AtomicU64,
    alerts_enqueued: AtomicU64,
    alerts_dispatched: AtomicU64,
    alerts_dropped: AtomicU64,
    head: AtomicU64,
    last_processed: AtomicU64,
}

/// Point-in-time copy of [`MonitorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub blocks_processed: u64,
    pub blocks_failed: u64,
    pub reorgs: u64,
    pub users_evaluated: u64,
    pub fetch_errors: u64,
    pub candidates: u64,
    pub alerts_suppressed: u64,
    pub alerts_enqueued: u64,
    pub alerts_dispatched: u64,
    pub alerts_dropped: u64,
    pub head: u64,
    pub last_processed: u64,
}

impl StatsSnapshot {
    /// Blocks between the chain head and the cursor.
    pub fn lag(&self) -> u64 {
        self.head.saturating_sub(self.last_processed)
    }
}

impl MonitorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_block(&self, number: u64, reorg: bool) {
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
        self.last_processed.fetch_max(number, Ordering::Relaxed);
        if reorg {
            self.reorgs.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Cursor position restored or initialized outside block processing.
    pub fn record_cursor(&self, number: u64) {
        self.last_processed.fetch_max(number, Ordering::Relaxed);
    }

    pub fn record_block_failure(&self) {
        self.blocks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evaluation(&self, candidates: usize) {
        self.users_evaluated.fetch_add(1, Ordering::Relaxed);
        self.candidates.fetch_add(candidates as u64, Ordering::Relaxed);
    }

    pub fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.alerts_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.alerts_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.alerts_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Observe a chain head. Returns the current lag.
    pub fn record_head(&self, number: u64) -> u64 {
        self.head.fetch_max(number, Ordering::Relaxed);
        self.snapshot().lag()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            blocks_failed: self.blocks_failed.load(Ordering::Relaxed),
            reorgs: self.reorgs.load(Ordering::Relaxed),
            users_evaluated: self.users_evaluated.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            candidates: self.candidates.load(Ordering::Relaxed),
            alerts_suppressed: self.alerts_suppressed.load(Ordering::Relaxed),
            alerts_enqueued: self.alerts_enqueued.load(Ordering::Relaxed),
            alerts_dispatched: self.alerts_dispatched.load(Ordering::Relaxed),
            alerts_dropped: self.alerts_dropped.load(Ordering::Relaxed),
            head: self.head.load(Ordering::Relaxed),
            last_processed: self.last_processed.load(Ordering::Relaxed),
        }
    }

    pub fn log(&self) {
        let s = self.snapshot();
        info!(
            blocks = s.blocks_processed,
            failed = s.blocks_failed,
            reorgs = s.reorgs,
            evaluated = s.users_evaluated,
            fetch_errors = s.fetch_errors,
            candidates = s.candidates,
            suppressed = s.alerts_suppressed,
            enqueued = s.alerts_enqueued,
            dispatched = s.alerts_dispatched,
            dropped = s.alerts_dropped,
            head = s.head,
            cursor = s.last_processed,
            lag = s.lag(),
            "Monitor stats"
        );
    }
}
