//! External notification clients for the liquidation sentinel.
//!
//! This crate provides:
//! - The [`NotificationChannel`] transport abstraction
//! - Telegram Bot API client for alert delivery

mod error;
mod telegram;

pub use error::TransportError;
pub use telegram::{ChannelCredentials, NotificationChannel, TelegramClient};
