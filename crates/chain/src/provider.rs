//! Chain access: current height, full block fetch, and new-head subscription.
//! Uses Alloy providers over HTTP for reads and WebSocket for subscriptions.

use alloy::consensus::Transaction as _;
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionResponse as _;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::event_listener::HeadListener;

/// Reference to a block by height and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub number: u64,
    pub hash: B256,
}

/// The subset of a transaction the pipeline inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSummary {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub input: Bytes,
}

/// A block with its transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    /// Unix seconds
    pub timestamp: u64,
    pub transactions: Vec<TxSummary>,
}

impl BlockData {
    /// Height and hash of this block.
    pub fn block_ref(&self) -> BlockRef {
        BlockRef {
            number: self.number,
            hash: self.hash,
        }
    }
}

/// Lazy, non-restartable stream of new heads.
pub type HeadStream = Pin<Box<dyn Stream<Item = BlockRef> + Send>>;

/// Source of blocks for the monitor.
#[async_trait]
pub trait ChainFeed: Send + Sync {
    /// Current chain height.
    async fn current_height(&self) -> Result<u64, FetchError>;

    /// Fetch a block with full transaction objects.
    async fn get_block(&self, number: u64) -> Result<BlockData, FetchError>;

    /// Subscribe to newly confirmed heads.
    async fn subscribe_heads(&self) -> Result<HeadStream, FetchError>;
}

/// RPC-backed chain feed.
#[derive(Debug, Clone)]
pub struct RpcChainFeed {
    /// HTTP URL for reads
    http_url: Url,
    /// WebSocket URL for subscriptions
    ws_url: String,
}

impl RpcChainFeed {
    /// Create a new chain feed.
    pub fn new(http_url: &str, ws_url: &str) -> Result<Self, FetchError> {
        let parsed = http_url.parse::<Url>().map_err(|e| FetchError::InvalidUrl {
            url: http_url.to_string(),
            reason: e.to_string(),
        })?;

        info!(http = http_url, ws = ws_url, "Chain feed configured");

        Ok(Self {
            http_url: parsed,
            ws_url: ws_url.to_string(),
        })
    }

    /// Get chain ID using Alloy provider.
    pub async fn chain_id(&self) -> Result<u64, FetchError> {
        let provider = ProviderBuilder::new().on_http(self.http_url.clone());
        provider.get_chain_id().await.map_err(FetchError::rpc)
    }

    /// Check if provider is healthy.
    pub async fn health_check(&self) -> Result<bool, FetchError> {
        let block = self.current_height().await?;
        debug!(block = block, "Provider health check passed");
        Ok(block > 0)
    }
}

#[async_trait]
impl ChainFeed for RpcChainFeed {
    async fn current_height(&self) -> Result<u64, FetchError> {
        let provider = ProviderBuilder::new().on_http(self.http_url.clone());
        provider.get_block_number().await.map_err(FetchError::rpc)
    }

    async fn get_block(&self, number: u64) -> Result<BlockData, FetchError> {
        let provider = ProviderBuilder::new().on_http(self.http_url.clone());
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await
            .map_err(FetchError::rpc)?
            .ok_or(FetchError::BlockNotFound(number))?;

        let transactions: Vec<TxSummary> = block
            .transactions
            .txns()
            .map(|tx| TxSummary {
                hash: tx.tx_hash(),
                from: tx.from(),
                to: tx.to(),
                input: tx.input().clone(),
            })
            .collect();

        debug!(
            block = number,
            tx_count = transactions.len(),
            "Block fetched"
        );

        Ok(BlockData {
            number: block.header.number,
            hash: block.header.hash,
            parent_hash: block.header.parent_hash,
            timestamp: block.header.timestamp,
            transactions,
        })
    }

    async fn subscribe_heads(&self) -> Result<HeadStream, FetchError> {
        HeadListener::new(&self.ws_url).subscribe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_ref() {
        let block = BlockData {
            number: 42,
            hash: B256::repeat_byte(7),
            parent_hash: B256::repeat_byte(6),
            timestamp: 1_700_000_000,
            transactions: Vec::new(),
        };
        assert_eq!(
            block.block_ref(),
            BlockRef {
                number: 42,
                hash: B256::repeat_byte(7)
            }
        );
    }

    #[test]
    fn test_rejects_invalid_http_url() {
        assert!(RpcChainFeed::new("::", "ws://localhost:8546").is_err());
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_current_height() {
        let feed = RpcChainFeed::new("https://eth.llamarpc.com", "wss://eth.llamarpc.com").unwrap();
        assert!(feed.current_height().await.unwrap() > 0);
    }
}
