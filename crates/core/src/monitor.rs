//! Monitor loop.
//!
//! Drives the pipeline one block at a time: fetch, admit through the cursor,
//! extract touched users, evaluate them with bounded parallelism, filter,
//! enqueue alerts, then commit the cursor. Startup backfill closes the gap to
//! the current head before live new-head processing begins.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use sentinel_chain::{BlockData, BlockRef, ChainFeed, FetchError, ProtocolClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::{ConfigHandle, StartBlock};
use crate::cursor::{AdmittedBlock, BlockCursor, CursorError};
use crate::dedup::{system_clock, AlertDedupState, Clock};
use crate::evaluator::{Evaluation, HealthEvaluator};
use crate::extractor::CandidateExtractor;
use crate::filter::{FilterDecision, OpportunityFilter};
use crate::notifier::Notifier;
use crate::retry::RetryPolicy;
use crate::state::{PersistedState, StateStore};
use crate::stats::MonitorStats;

/// Delay before re-establishing a lost head subscription.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// What processing one block produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub number: u64,
    pub reorg: bool,
    pub users: usize,
    pub fetch_errors: usize,
    pub candidates: usize,
    pub alerts: usize,
}

/// Result of offering a block to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Processed(BlockReport),
    /// The cursor refused the block
    Skipped(CursorError),
}

/// Orchestrates detection for one protocol deployment.
pub struct Monitor {
    config: ConfigHandle,
    feed: Arc<dyn ChainFeed>,
    evaluator: HealthEvaluator,
    extractor: CandidateExtractor,
    filter: OpportunityFilter,
    notifier: Notifier,
    dedup: Arc<AlertDedupState>,
    cursor: Mutex<BlockCursor>,
    stats: Arc<MonitorStats>,
    state: Option<StateStore>,
    clock: Clock,
    fetch_retry: RetryPolicy,
}

impl Monitor {
    pub fn new(
        config: ConfigHandle,
        feed: Arc<dyn ChainFeed>,
        protocol: Arc<dyn ProtocolClient>,
        notifier: Notifier,
        stats: Arc<MonitorStats>,
    ) -> Self {
        let current = config.current();
        let fetch_retry = RetryPolicy::new(
            current.pipeline.fetch_retries,
            current.pipeline.fetch_retry_delay(),
        );
        let dedup = Arc::new(AlertDedupState::new());

        Self {
            evaluator: HealthEvaluator::new(protocol, fetch_retry),
            extractor: CandidateExtractor::new(current.protocol.interaction_contracts()),
            filter: OpportunityFilter::new(config.clone(), dedup.clone()),
            cursor: Mutex::new(BlockCursor::new(0, current.pipeline.reorg_window)),
            state: current.state_file.clone().map(StateStore::new),
            config,
            feed,
            notifier,
            dedup,
            stats,
            clock: system_clock(),
            fetch_retry,
        }
    }

    /// Replace the wall clock used for detection timestamps.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Persist cursor and dedup state to `store` (overrides `state_file`).
    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.state = Some(store);
        self
    }

    pub fn stats(&self) -> &Arc<MonitorStats> {
        &self.stats
    }

    pub fn dedup(&self) -> &Arc<AlertDedupState> {
        &self.dedup
    }

    /// Last fully processed block.
    pub fn last_processed(&self) -> u64 {
        self.cursor.lock().last_processed()
    }

    /// Position the cursor: persisted state first, then `start_block`.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Result<()> {
        let config = self.config.current();
        let window = config.pipeline.reorg_window;

        if let Some(store) = &self.state {
            let persisted = store
                .load()
                .await
                .with_context(|| format!("failed to load state from {}", store.path().display()))?;

            if let Some(state) = persisted {
                let recent = state.recent_hashes.iter().copied().map(BlockRef::from);
                *self.cursor.lock() = BlockCursor::restore(state.cursor, recent, window);
                self.dedup.restore(state.dedup);
                self.dedup
                    .evict_expired((self.clock)(), config.cooldown_window());
                self.stats.record_cursor(state.cursor);

                info!(
                    cursor = state.cursor,
                    dedup_entries = self.dedup.len(),
                    path = %store.path().display(),
                    "Resumed from persisted state"
                );
                return Ok(());
            }
        }

        let last_processed = match config.start_block {
            StartBlock::Latest => self
                .current_height()
                .await
                .context("failed to resolve latest block")?,
            StartBlock::Height(first) => first.saturating_sub(1),
        };

        *self.cursor.lock() = BlockCursor::new(last_processed, window);
        self.stats.record_cursor(last_processed);
        info!(cursor = last_processed, start = ?config.start_block, "Cursor initialized");
        Ok(())
    }

    /// Process `max(cursor + 1, head - backfill_depth)..=head` in order.
    /// Returns the number of blocks processed.
    pub async fn backfill(&self) -> Result<u64> {
        self.backfill_until(None).await
    }

    async fn backfill_until(&self, shutdown: Option<&watch::Receiver<bool>>) -> Result<u64> {
        let head = self
            .current_height()
            .await
            .context("failed to read current height for backfill")?;
        self.stats.record_head(head);

        let depth = self.config.current().backfill_depth;
        let from = (self.last_processed() + 1).max(head.saturating_sub(depth));

        if from > head {
            info!(cursor = self.last_processed(), head = head, "Nothing to backfill");
            return Ok(0);
        }

        info!(from = from, to = head, "Starting backfill");
        let processed = self.process_range(from, head, shutdown).await;
        info!(blocks = processed, cursor = self.last_processed(), "Backfill complete");
        Ok(processed)
    }

    /// Backfill, then follow new heads until `shutdown` flips to `true`.
    ///
    /// The block in progress when shutdown is requested is finished first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if let Err(e) = self.backfill_until(Some(&shutdown)).await {
            error!(error = %e, "Backfill failed, continuing with live heads");
        }

        let config = self.config.current();
        let (head_tx, mut head_rx) =
            mpsc::channel::<BlockRef>(config.pipeline.queue_capacity.max(1));

        let producer = tokio::spawn(head_producer(self.feed.clone(), head_tx));

        let stats = self.stats.clone();
        let stats_interval = config.pipeline.stats_interval();
        let reporter = tokio::spawn(async move {
            let mut ticker = interval(stats_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                stats.log();
            }
        });

        info!("Monitor live");

        loop {
            if shutdown_requested(Some(&shutdown)) {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone: nobody can stop us any more, treat as stop
                        break;
                    }
                }
                head = head_rx.recv() => match head {
                    Some(head) => self.on_head(head, Some(&shutdown)).await,
                    None => {
                        warn!("Head producer stopped");
                        break;
                    }
                },
            }
        }

        producer.abort();
        reporter.abort();
        self.persist().await;
        self.stats.log();
        info!(cursor = self.last_processed(), "Monitor stopped");
        Ok(())
    }

    /// Handle one new head: gap-fill up to it, or re-run a reorged height.
    pub async fn on_head(&self, head: BlockRef, shutdown: Option<&watch::Receiver<bool>>) {
        self.stats.record_head(head.number);
        let last_processed = self.last_processed();
        let reorg = self.cursor.lock().is_reorg(head.number, head.hash);

        if head.number > last_processed {
            self.process_range(last_processed + 1, head.number, shutdown).await;
        } else if reorg {
            warn!(block = head.number, hash = %head.hash, "Head replaces a processed block");
            self.process_height(head.number).await;
        } else {
            trace!(block = head.number, cursor = last_processed, "Discarding stale head");
        }

        self.check_lag();
    }

    async fn process_range(
        &self,
        from: u64,
        to: u64,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> u64 {
        let mut processed = 0;
        for number in from..=to {
            if shutdown_requested(shutdown) {
                info!(next = number, "Shutdown requested, stopping between blocks");
                break;
            }
            match self.process_height(number).await {
                Some(BlockOutcome::Processed(_)) => processed += 1,
                Some(BlockOutcome::Skipped(_)) => {}
                // The cursor stays below the failed height; the next head
                // gap-fills from it.
                None => break,
            }
        }
        processed
    }

    /// Fetch and process one height. `None` when the fetch failed after
    /// retries; the cursor is left untouched.
    async fn process_height(&self, number: u64) -> Option<BlockOutcome> {
        match self.fetch_block(number).await {
            Ok(block) => Some(self.process_block(block).await),
            Err(e) => {
                self.stats.record_block_failure();
                warn!(
                    block = number,
                    cursor = self.last_processed(),
                    error = %e,
                    "Failed to fetch block, will retry on next head"
                );
                None
            }
        }
    }

    /// Run the pipeline on a fetched block.
    ///
    /// When the block's parent contradicts a recorded hash, the stale
    /// ancestors inside the reorg window are re-run first.
    #[instrument(skip(self, block), fields(block = block.number))]
    pub async fn process_block(&self, block: BlockData) -> BlockOutcome {
        let mut admitted = match self.admit(&block) {
            Ok(admitted) => admitted,
            Err(e) => return BlockOutcome::Skipped(e),
        };

        if !admitted.is_reorg() && self.parent_mismatch(&block) {
            self.cursor.lock().abandon(admitted);
            warn!(parent = %block.parent_hash, "Parent hash mismatch, replaying ancestors");

            for ancestor in self.stale_ancestors(&block).await {
                if let Ok(ticket) = self.admit(&ancestor) {
                    self.run_admitted(&ancestor, ticket).await;
                }
            }

            admitted = match self.admit(&block) {
                Ok(admitted) => admitted,
                Err(e) => return BlockOutcome::Skipped(e),
            };
        }

        BlockOutcome::Processed(self.run_admitted(&block, admitted).await)
    }

    fn admit(&self, block: &BlockData) -> Result<AdmittedBlock, CursorError> {
        let result = self.cursor.lock().admit(block.number, block.hash);
        match &result {
            Ok(admitted) if admitted.is_reorg() => {
                warn!(block = block.number, hash = %block.hash, "Reorg detected, re-running block");
            }
            Ok(_) => {}
            Err(e) => debug!(block = block.number, reason = %e, "Block not admitted"),
        }
        result
    }

    fn parent_mismatch(&self, block: &BlockData) -> bool {
        let Some(parent) = block.number.checked_sub(1) else {
            return false;
        };
        self.cursor.lock().is_reorg(parent, block.parent_hash)
    }

    /// Ancestors of `block` whose recorded hashes are stale, oldest first.
    async fn stale_ancestors(&self, block: &BlockData) -> Vec<BlockData> {
        let mut stale = Vec::new();
        let mut expected = block.parent_hash;
        let mut number = block.number;

        while let Some(height) = number.checked_sub(1) {
            let replaced = self.cursor.lock().is_reorg(height, expected);
            if !replaced {
                break;
            }
            match self.fetch_block(height).await {
                Ok(ancestor) => {
                    expected = ancestor.parent_hash;
                    stale.push(ancestor);
                }
                Err(e) => {
                    warn!(block = height, error = %e, "Failed to fetch reorged ancestor");
                    break;
                }
            }
            number = height;
        }

        stale.reverse();
        stale
    }

    async fn run_admitted(&self, block: &BlockData, admitted: AdmittedBlock) -> BlockReport {
        let config = self.config.current();
        let users = self.extractor.extract(block);
        let detected_at = (self.clock)();
        let assets = config.protocol.monitored_assets.as_slice();

        let mut report = BlockReport {
            number: block.number,
            reorg: admitted.is_reorg(),
            users: users.len(),
            ..Default::default()
        };

        let evaluations: Vec<(Address, Result<Evaluation, FetchError>)> = stream::iter(users)
            .map(|user| async move {
                let result = self
                    .evaluator
                    .evaluate(user, assets, block.number, detected_at)
                    .await;
                (user, result)
            })
            .buffer_unordered(config.pipeline.evaluation_concurrency.max(1))
            .collect()
            .await;

        for (user, result) in evaluations {
            let evaluation = match result {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    report.fetch_errors += 1;
                    self.stats.record_fetch_error();
                    warn!(user = %user, error = %e, "Health evaluation failed");
                    continue;
                }
            };

            let candidates = evaluation.candidates();
            self.stats.record_evaluation(candidates.len());
            report.candidates += candidates.len();

            for candidate in candidates {
                match self.filter.decide(candidate) {
                    FilterDecision::Accept => {
                        info!(
                            user = %candidate.user,
                            asset = %candidate.asset,
                            debt = %candidate.debt_to_cover,
                            est_collateral = %candidate.estimated_collateral_seized,
                            "Liquidation candidate"
                        );
                        if self.notifier.enqueue(candidate.clone()) {
                            report.alerts += 1;
                        }
                    }
                    FilterDecision::BelowMinimum { minimum } => {
                        debug!(
                            user = %candidate.user,
                            asset = %candidate.asset,
                            debt = %candidate.debt_to_cover,
                            minimum = %minimum,
                            "Below minimum liquidation amount"
                        );
                    }
                    FilterDecision::CoolingDown { last_block, .. } => {
                        self.stats.record_suppressed();
                        debug!(
                            user = %candidate.user,
                            asset = %candidate.asset,
                            last_block = last_block,
                            "Alert suppressed by cooldown"
                        );
                    }
                }
            }
        }

        self.cursor.lock().complete(admitted);
        self.stats.record_block(block.number, report.reorg);

        let evicted = self.dedup.evict_expired(detected_at, config.cooldown_window());
        if evicted > 0 {
            trace!(
                evicted = evicted,
                remaining = self.dedup.len(),
                "Evicted expired dedup records"
            );
        }
        self.persist().await;

        debug!(
            users = report.users,
            candidates = report.candidates,
            alerts = report.alerts,
            fetch_errors = report.fetch_errors,
            "Block processed"
        );
        report
    }

    fn check_lag(&self) {
        let snapshot = self.stats.snapshot();
        let lag = snapshot.lag();
        let threshold = self.config.current().pipeline.lag_warn_blocks;
        if lag > threshold {
            warn!(
                head = snapshot.head,
                cursor = snapshot.last_processed,
                lag = lag,
                threshold = threshold,
                "Processing is lagging behind the chain head"
            );
        }
    }

    /// Save cursor and dedup state. Failures are logged only.
    async fn persist(&self) {
        let Some(store) = &self.state else {
            return;
        };

        let (cursor, recent_hashes) = {
            let cursor = self.cursor.lock();
            (cursor.last_processed(), cursor.recent_hashes())
        };
        let state = PersistedState {
            cursor,
            recent_hashes: recent_hashes.into_iter().map(Into::into).collect(),
            dedup: self.dedup.snapshot(),
        };

        if let Err(e) = store.save(&state).await {
            warn!(error = %e, "Failed to persist state");
        }
    }

    async fn current_height(&self) -> Result<u64, FetchError> {
        self.fetch_retry
            .run(
                "current_height",
                || self.feed.current_height(),
                FetchError::is_retryable,
            )
            .await
    }

    async fn fetch_block(&self, number: u64) -> Result<BlockData, FetchError> {
        self.fetch_retry
            .run(
                "get_block",
                || self.feed.get_block(number),
                FetchError::is_retryable,
            )
            .await
    }
}

fn shutdown_requested(shutdown: Option<&watch::Receiver<bool>>) -> bool {
    shutdown.is_some_and(|rx| *rx.borrow())
}

/// Forward new heads into the bounded queue, resubscribing when the
/// subscription is lost. Blocks while the queue is full.
async fn head_producer(feed: Arc<dyn ChainFeed>, tx: mpsc::Sender<BlockRef>) {
    loop {
        match feed.subscribe_heads().await {
            Ok(mut heads) => {
                info!("Head subscription active");
                while let Some(head) = heads.next().await {
                    if tx.send(head).await.is_err() {
                        return;
                    }
                }
                warn!("Head stream ended, resubscribing in 5s...");
            }
            Err(e) => {
                error!(error = %e, "Head subscription failed, retrying in 5s...");
            }
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}
