//! Alert dispatch.
//!
//! Alerts are handed to a dedicated task through a bounded queue, so a slow
//! or failing channel never stalls block processing. A full queue drops the
//! alert. Dispatch outcomes are counted but never reported back.

use sentinel_api::{NotificationChannel, TransportError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::candidate::LiquidationCandidate;
use crate::config::ConfigHandle;
use crate::retry::RetryPolicy;
use crate::stats::MonitorStats;

/// Human-readable alert text.
pub fn format_alert(candidate: &LiquidationCandidate) -> String {
    format!(
        "Liquidation candidate\n\
         User: {}\n\
         Debt asset: {}\n\
         Debt to cover: {}\n\
         Est. collateral seized: {} (heuristic: debt x 110%, not protocol-exact)\n\
         Block: {}\n\
         Detected: {}",
        candidate.user,
        candidate.asset,
        candidate.debt_to_cover,
        candidate.estimated_collateral_seized,
        candidate.detected_at_block,
        candidate.detected_at_time.to_rfc3339(),
    )
}

/// Producer side of the alert queue.
pub struct Notifier {
    tx: mpsc::Sender<LiquidationCandidate>,
    stats: Arc<MonitorStats>,
}

impl Notifier {
    /// Start the dispatch task.
    ///
    /// The task exits once every `Notifier` is dropped and the queue is
    /// drained; awaiting the returned handle flushes pending alerts.
    pub fn spawn(
        channel: Arc<dyn NotificationChannel>,
        config: ConfigHandle,
        stats: Arc<MonitorStats>,
    ) -> (Self, JoinHandle<()>) {
        let capacity = config.current().notifier.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        let worker_stats = stats.clone();
        let handle = tokio::spawn(async move {
            dispatch_loop(rx, channel, config, worker_stats).await;
        });

        (Self { tx, stats }, handle)
    }

    /// Queue an alert without waiting. Returns `false` if it was dropped.
    pub fn enqueue(&self, candidate: LiquidationCandidate) -> bool {
        match self.tx.try_send(candidate) {
            Ok(()) => {
                self.stats.record_enqueued();
                true
            }
            Err(TrySendError::Full(candidate)) => {
                warn!(
                    user = %candidate.user,
                    asset = %candidate.asset,
                    block = candidate.detected_at_block,
                    "Alert queue full, dropping alert"
                );
                self.stats.record_dropped();
                false
            }
            Err(TrySendError::Closed(candidate)) => {
                error!(user = %candidate.user, "Alert dispatcher stopped, dropping alert");
                self.stats.record_dropped();
                false
            }
        }
    }
}

async fn dispatch_loop(
    mut rx: mpsc::Receiver<LiquidationCandidate>,
    channel: Arc<dyn NotificationChannel>,
    config: ConfigHandle,
    stats: Arc<MonitorStats>,
) {
    info!("Alert dispatcher started");

    while let Some(candidate) = rx.recv().await {
        match dispatch(channel.as_ref(), &config, &candidate).await {
            Ok(()) => {
                stats.record_dispatched();
                info!(
                    user = %candidate.user,
                    asset = %candidate.asset,
                    debt = %candidate.debt_to_cover,
                    block = candidate.detected_at_block,
                    "Alert sent"
                );
            }
            Err(e) => {
                stats.record_dropped();
                error!(
                    user = %candidate.user,
                    asset = %candidate.asset,
                    error = %e,
                    "Alert dropped"
                );
            }
        }
    }

    debug!("Alert queue closed, dispatcher exiting");
}

/// Send one alert with bounded retry on transient failures. Credentials and
/// retry settings are read when the alert is sent.
async fn dispatch(
    channel: &dyn NotificationChannel,
    config: &ConfigHandle,
    candidate: &LiquidationCandidate,
) -> Result<(), TransportError> {
    let settings = config.current();
    let credentials = settings.notifier.credentials();
    let retry = RetryPolicy::new(settings.notifier.max_retries, settings.notifier.retry_delay());
    let text = format_alert(candidate);

    retry
        .run(
            "send_alert",
            || channel.send(&credentials, &text),
            TransportError::is_transient,
        )
        .await
}
