//! Monitor configuration.
//!
//! Loaded once at process start from a TOML file. Every tunable carries a
//! serde default so a minimal file only needs endpoints, protocol addresses
//! and channel credentials.

use alloy::primitives::{Address, U256};
use sentinel_api::ChannelCredentials;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::ConfigError;

/// Main configuration structure containing all monitor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Deployment name (for logging/identification)
    #[serde(default = "default_name")]
    pub name: String,

    /// RPC endpoints
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Protocol contract addresses
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Minimum debt to cover (asset base units) for an alert
    #[serde(default = "default_min_liquidation_amount")]
    pub min_liquidation_amount: U256,

    /// First block to process: "latest" or an explicit height
    #[serde(default)]
    pub start_block: StartBlock,

    /// How many blocks behind the head to re-scan at startup
    #[serde(default = "default_backfill_depth")]
    pub backfill_depth: u64,

    /// Minimum time between alerts for the same (user, asset) (seconds)
    #[serde(default = "default_cooldown_window")]
    pub cooldown_window_secs: u64,

    /// Block pipeline tuning
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Notification channel
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Where to persist cursor and dedup state (disabled when unset)
    #[serde(default)]
    pub state_file: Option<PathBuf>,

    /// Addresses allowed to update configuration at runtime
    #[serde(default)]
    pub admins: HashSet<Address>,
}

fn default_name() -> String {
    "default".to_string()
}
fn default_min_liquidation_amount() -> U256 {
    U256::from(1000u64)
}
fn default_backfill_depth() -> u64 {
    100
}
fn default_cooldown_window() -> u64 {
    300
}

/// Where processing starts when no persisted state exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartBlock {
    /// The chain height at startup
    #[default]
    Latest,
    /// An explicit first block
    #[serde(untagged)]
    Height(u64),
}

/// RPC endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcConfig {
    /// HTTP endpoint for reads
    #[serde(default)]
    pub http_url: String,

    /// WebSocket endpoint for new-head subscriptions
    #[serde(default)]
    pub ws_url: String,
}

/// Lending protocol addresses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Pool contract (account health reads)
    #[serde(default)]
    pub pool: Address,

    /// Protocol data provider (per-reserve debt reads)
    #[serde(default)]
    pub data_provider: Address,

    /// Contracts whose calls count as protocol interactions.
    /// Falls back to `{pool}` when empty.
    #[serde(default)]
    pub contracts: HashSet<Address>,

    /// Debt assets evaluated for each unhealthy user
    #[serde(default)]
    pub monitored_assets: Vec<Address>,
}

impl ProtocolConfig {
    /// Effective protocol contract set.
    pub fn interaction_contracts(&self) -> HashSet<Address> {
        if self.contracts.is_empty() {
            HashSet::from([self.pool])
        } else {
            self.contracts.clone()
        }
    }
}

/// Block pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of recent block hashes kept for reorg detection
    #[serde(default = "default_reorg_window")]
    pub reorg_window: usize,

    /// Maximum concurrent health evaluations within one block
    #[serde(default = "default_evaluation_concurrency")]
    pub evaluation_concurrency: usize,

    /// Capacity of the live new-head queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Processing lag (blocks) above which a warning is logged
    #[serde(default = "default_lag_warn_blocks")]
    pub lag_warn_blocks: u64,

    /// Retries per protocol/chain read
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Base delay between read retries (milliseconds)
    #[serde(default = "default_fetch_retry_delay")]
    pub fetch_retry_delay_ms: u64,

    /// Stats logging interval (seconds)
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

fn default_reorg_window() -> usize {
    128
}
fn default_evaluation_concurrency() -> usize {
    8
}
fn default_queue_capacity() -> usize {
    64
}
fn default_lag_warn_blocks() -> u64 {
    10
}
fn default_fetch_retries() -> u32 {
    3
}
fn default_fetch_retry_delay() -> u64 {
    250
}
fn default_stats_interval() -> u64 {
    60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reorg_window: default_reorg_window(),
            evaluation_concurrency: default_evaluation_concurrency(),
            queue_capacity: default_queue_capacity(),
            lag_warn_blocks: default_lag_warn_blocks(),
            fetch_retries: default_fetch_retries(),
            fetch_retry_delay_ms: default_fetch_retry_delay(),
            stats_interval_secs: default_stats_interval(),
        }
    }
}

impl PipelineConfig {
    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

/// Notification channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Bot token (may also come from `TELEGRAM_BOT_TOKEN`)
    #[serde(default)]
    pub bot_token: String,

    /// Destination chat id
    #[serde(default)]
    pub chat_id: String,

    /// Retries per alert on transient transport failure
    #[serde(default = "default_notifier_retries")]
    pub max_retries: u32,

    /// Base delay between dispatch retries (milliseconds)
    #[serde(default = "default_notifier_retry_delay")]
    pub retry_delay_ms: u64,

    /// Pending alert queue capacity
    #[serde(default = "default_notifier_queue")]
    pub queue_capacity: usize,
}

fn default_notifier_retries() -> u32 {
    3
}
fn default_notifier_retry_delay() -> u64 {
    500
}
fn default_notifier_queue() -> usize {
    256
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            max_retries: default_notifier_retries(),
            retry_delay_ms: default_notifier_retry_delay(),
            queue_capacity: default_notifier_queue(),
        }
    }
}

impl NotifierConfig {
    pub fn credentials(&self) -> ChannelCredentials {
        ChannelCredentials::new(self.bot_token.clone(), self.chat_id.clone())
    }
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Cooldown window as a duration.
    pub fn cooldown_window(&self) -> Duration {
        Duration::from_secs(self.cooldown_window_secs)
    }

    /// Check that every required setting is present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.http_url.trim().is_empty() {
            return Err(ConfigError::Missing("rpc.http_url"));
        }
        if self.rpc.ws_url.trim().is_empty() {
            return Err(ConfigError::Missing("rpc.ws_url"));
        }
        if self.protocol.pool.is_zero() {
            return Err(ConfigError::Missing("protocol.pool"));
        }
        if self.protocol.data_provider.is_zero() {
            return Err(ConfigError::Missing("protocol.data_provider"));
        }
        if self.protocol.monitored_assets.is_empty() {
            return Err(ConfigError::Missing("protocol.monitored_assets"));
        }
        if !self.notifier.credentials().is_complete() {
            return Err(ConfigError::Missing("notifier.bot_token / notifier.chat_id"));
        }
        if self.pipeline.evaluation_concurrency == 0 {
            return Err(ConfigError::invalid(
                "pipeline.evaluation_concurrency",
                "must be at least 1",
            ));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::invalid("pipeline.queue_capacity", "must be at least 1"));
        }
        if self.notifier.queue_capacity == 0 {
            return Err(ConfigError::invalid("notifier.queue_capacity", "must be at least 1"));
        }
        if self.pipeline.reorg_window == 0 {
            return Err(ConfigError::invalid("pipeline.reorg_window", "must be at least 1"));
        }
        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(name = %self.name, "Monitor configuration loaded");
        tracing::info!(
            pool = %self.protocol.pool,
            data_provider = %self.protocol.data_provider,
            contracts = self.protocol.interaction_contracts().len(),
            assets = self.protocol.monitored_assets.len(),
            "Protocol addresses"
        );
        tracing::info!(
            min_liquidation_amount = %self.min_liquidation_amount,
            cooldown_secs = self.cooldown_window_secs,
            start_block = ?self.start_block,
            backfill_depth = self.backfill_depth,
            "Detection thresholds"
        );
        tracing::info!(
            concurrency = self.pipeline.evaluation_concurrency,
            queue_capacity = self.pipeline.queue_capacity,
            reorg_window = self.pipeline.reorg_window,
            fetch_retries = self.pipeline.fetch_retries,
            "Pipeline parameters"
        );
        tracing::info!(
            chat_id = %self.notifier.chat_id,
            max_retries = self.notifier.max_retries,
            state_file = ?self.state_file,
            admins = self.admins.len(),
            "Notifier and persistence"
        );
    }
}
