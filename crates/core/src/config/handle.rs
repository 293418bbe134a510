//! Shared, runtime-updatable configuration.
//!
//! Readers take a cheap `Arc` snapshot per decision. The only mutation path
//! is [`ConfigHandle::update`], which requires the caller to hold the
//! administrator capability.

use alloy::primitives::{Address, U256};
use parking_lot::RwLock;
use sentinel_api::ChannelCredentials;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{ConfigError, MonitorConfig};

/// An explicit runtime change to the configuration.
#[derive(Debug, Clone)]
pub enum ConfigUpdate {
    MinLiquidationAmount(U256),
    CooldownWindow(Duration),
    NotificationChannel(ChannelCredentials),
}

impl ConfigUpdate {
    fn name(&self) -> &'static str {
        match self {
            Self::MinLiquidationAmount(_) => "min_liquidation_amount",
            Self::CooldownWindow(_) => "cooldown_window",
            Self::NotificationChannel(_) => "notification_channel",
        }
    }

    fn apply(self, config: &mut MonitorConfig) {
        match self {
            Self::MinLiquidationAmount(amount) => config.min_liquidation_amount = amount,
            Self::CooldownWindow(window) => config.cooldown_window_secs = window.as_secs(),
            Self::NotificationChannel(credentials) => {
                config.notifier.bot_token = credentials.bot_token;
                config.notifier.chat_id = credentials.chat_id;
            }
        }
    }
}

/// Shared configuration holder.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<MonitorConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// Current configuration snapshot.
    pub fn current(&self) -> Arc<MonitorConfig> {
        self.inner.read().clone()
    }

    /// Whether `caller` holds the administrator capability.
    pub fn is_admin(&self, caller: &Address) -> bool {
        self.inner.read().admins.contains(caller)
    }

    /// Apply `update` on behalf of `caller`.
    ///
    /// The new configuration must still validate; otherwise nothing changes.
    pub fn update(&self, caller: Address, update: ConfigUpdate) -> Result<(), ConfigError> {
        let mut guard = self.inner.write();

        if !guard.admins.contains(&caller) {
            warn!(caller = %caller, setting = update.name(), "Rejected unauthorized config update");
            return Err(ConfigError::Unauthorized(caller));
        }

        let setting = update.name();
        let mut next = MonitorConfig::clone(&guard);
        update.apply(&mut next);
        next.validate()?;

        *guard = Arc::new(next);
        info!(caller = %caller, setting = setting, "Configuration updated");
        Ok(())
    }
}
