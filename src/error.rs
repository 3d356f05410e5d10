//! Error types for the content store and the fetcher

use thiserror::Error;

/// Errors raised while talking to the content store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to content store failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("content store returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("failed to decode content store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("missing content store credential: {0}")]
    MissingCredentials(&'static str),
}

/// Errors raised by the content fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("entry {id} ({content_type}) is malformed: {reason}")]
    InvalidEntry {
        id: String,
        content_type: String,
        reason: String,
    },
}

impl FetchError {
    /// Build an `InvalidEntry` error from a schema mismatch
    pub fn invalid(id: &str, content_type: &str, reason: impl ToString) -> Self {
        FetchError::InvalidEntry {
            id: id.to_string(),
            content_type: content_type.to_string(),
            reason: reason.to_string(),
        }
    }
}
