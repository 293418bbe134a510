//! Chain interaction layer for the liquidation sentinel.
//!
//! This crate provides:
//! - Read-only lending protocol access (account health, reserve debt)
//! - Block fetching and new-head subscriptions
//! - Protocol ABI subsets and user-action selector decoding

mod contracts;
mod error;
mod event_listener;
pub mod protocol;
mod provider;

pub use contracts::{ILendingPool, IProtocolDataProvider, UserAction};
pub use error::FetchError;
pub use event_listener::HeadListener;
pub use protocol::{AaveProtocolClient, AccountSnapshot, ProtocolClient, ReserveDebt};
pub use provider::{BlockData, BlockRef, ChainFeed, HeadStream, RpcChainFeed, TxSummary};
