//! WebSocket listener for new block headers.

use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use futures::stream::StreamExt;
use tracing::info;

use crate::error::FetchError;
use crate::provider::{BlockRef, HeadStream};

/// WebSocket new-heads listener.
pub struct HeadListener {
    ws_url: String,
}

impl HeadListener {
    /// Create a new listener.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
        }
    }

    /// Subscribe to new block headers.
    /// Returns a stream of block references.
    pub async fn subscribe(&self) -> Result<HeadStream, FetchError> {
        info!(ws_url = %self.ws_url, "Subscribing to new block headers");

        let ws = WsConnect::new(&self.ws_url);
        let provider = ProviderBuilder::new()
            .on_ws(ws)
            .await
            .map_err(|e| FetchError::Subscription(e.to_string()))?;
        info!("WebSocket connected for new block headers");

        let sub = provider
            .subscribe_blocks()
            .await
            .map_err(|e| FetchError::Subscription(e.to_string()))?;
        let inner_stream = sub.into_stream();

        // The provider must be kept in the stream's state to prevent WebSocket from closing
        let head_stream = futures::stream::unfold(
            (provider, inner_stream),
            |(provider, mut stream)| async move {
                let header = stream.next().await?;
                let head = BlockRef {
                    number: header.number,
                    hash: header.hash,
                };
                Some((head, (provider, stream)))
            },
        );

        Ok(Box::pin(head_stream))
    }
}
