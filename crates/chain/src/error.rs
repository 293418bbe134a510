//! Read-side error type for protocol and chain queries.

use thiserror::Error;

/// A failed read against the chain or the lending protocol.
///
/// Every variant is transient from the pipeline's point of view: the caller
/// retries the individual read and never interprets a failure as "healthy".
#[derive(Debug, Error)]
pub enum FetchError {
    /// The RPC endpoint could not be reached or returned a JSON-RPC error.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A contract call reverted or returned undecodable data.
    #[error("contract call {call} failed: {reason}")]
    Contract { call: &'static str, reason: String },

    /// The node does not (yet) know the requested block.
    #[error("block {0} not found")]
    BlockNotFound(u64),

    /// Subscription could not be established.
    #[error("subscription failed: {0}")]
    Subscription(String),

    /// The configured endpoint URL does not parse.
    #[error("invalid endpoint url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    /// Whether repeating the same read may succeed.
    ///
    /// Only a malformed endpoint is permanent.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidUrl { .. })
    }

    pub(crate) fn rpc(err: impl std::fmt::Display) -> Self {
        Self::Rpc(err.to_string())
    }

    pub(crate) fn contract(call: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Contract {
            call,
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::contract("getUserAccountData", "execution reverted");
        assert_eq!(
            err.to_string(),
            "contract call getUserAccountData failed: execution reverted"
        );
        assert_eq!(FetchError::BlockNotFound(7).to_string(), "block 7 not found");
    }

    #[test]
    fn test_retryable() {
        assert!(FetchError::Rpc("connection reset".into()).is_retryable());
        assert!(FetchError::BlockNotFound(1).is_retryable());
        assert!(!FetchError::InvalidUrl {
            url: "nope".into(),
            reason: "relative URL without a base".into(),
        }
        .is_retryable());
    }
}
