//! Webhook delivery errors.
//!
//! None of these reach the code that raised an event; they exist for logging
//! and for tests that drive the dispatcher directly.

use jury_core::error::RepoError;

/// Payload signing errors.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

/// Failure of a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The request could not be built; nothing was sent.
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    /// The request could not be signed; nothing was sent.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),
}

impl DeliveryError {
    /// Whether a request actually left the process before failing.
    pub fn was_attempted(&self) -> bool {
        matches!(self, DeliveryError::Timeout(_) | DeliveryError::Network(_))
    }
}

/// Failure of a whole dispatch, before any delivery started.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("No Tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Failed to load webhooks: {0}")]
    Store(#[from] RepoError),

    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}
