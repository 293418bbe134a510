//! Notification transport errors.

use thiserror::Error;

/// A failed notification dispatch.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request never produced a response (connect, timeout, body).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("channel returned status {status}: {description}")]
    Status { status: u16, description: String },

    /// Endpoint accepted the request but refused the message.
    #[error("channel rejected message: {0}")]
    Rejected(String),

    /// Bot token or destination is empty.
    #[error("channel credentials are not configured")]
    MissingCredentials,
}

impl TransportError {
    /// Whether retrying the same request may succeed.
    ///
    /// Network failures, rate limiting (429) and server errors (5xx) are
    /// transient; other client errors and explicit rejections are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Rejected(_) | Self::MissingCredentials => false,
        }
    }
}
