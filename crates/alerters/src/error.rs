//! Error types for alert delivery.

use thiserror::Error;

/// Errors that can occur when sending an alert through a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend rejected the delivery
    #[error("{backend} returned {status}: {body}")]
    Rejected {
        backend: &'static str,
        status: u16,
        body: String,
    },
}
