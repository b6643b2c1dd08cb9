//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to fan an event out to a user's webhooks.
///
/// `event` is kept as a string here; the server validates it against the known
/// event names and answers 400 for anything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEventRequest {
    /// Owner of the webhooks to notify.
    pub user_id: Uuid,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// Response for an accepted dispatch. Delivery happens in the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchAccepted {
    pub accepted: bool,
    pub event: String,
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub success: bool,
    pub remaining: u32,
}
