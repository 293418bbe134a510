//! Durable cursor and dedup state.
//!
//! Written as a single JSON document. Each save goes to a sibling temp file
//! that is then renamed over the target, so readers only ever see a complete
//! document.

use alloy::primitives::B256;
use sentinel_chain::BlockRef;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::dedup::DedupEntry;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is corrupt: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A committed block in the reorg window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedBlock {
    pub number: u64,
    pub hash: B256,
}

impl From<BlockRef> for PersistedBlock {
    fn from(block: BlockRef) -> Self {
        Self {
            number: block.number,
            hash: block.hash,
        }
    }
}

impl From<PersistedBlock> for BlockRef {
    fn from(block: PersistedBlock) -> Self {
        Self {
            number: block.number,
            hash: block.hash,
        }
    }
}

/// Everything needed to resume after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Last fully processed block
    pub cursor: u64,
    #[serde(default)]
    pub recent_hashes: Vec<PersistedBlock>,
    #[serde(default)]
    pub dedup: Vec<DedupEntry>,
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Load persisted state. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<PersistedState>, StateError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StateError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    /// Replace the stored state.
    pub async fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.temp_path();

        fs::write(&tmp, json).await.map_err(|source| StateError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StateError::Io {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), cursor = state.cursor, "State saved");
        Ok(())
    }
}
