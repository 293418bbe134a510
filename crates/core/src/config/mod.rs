//! Configuration for the liquidation sentinel.
//!
//! This module provides:
//! - Monitor configuration (endpoints, protocol addresses, thresholds, timing)
//! - The shared, administrator-guarded runtime configuration handle
//! - Configuration errors

mod error;
mod handle;
mod monitor;

pub use error::ConfigError;
pub use handle::{ConfigHandle, ConfigUpdate};
pub use monitor::{
    MonitorConfig, NotifierConfig, PipelineConfig, ProtocolConfig, RpcConfig, StartBlock,
};
