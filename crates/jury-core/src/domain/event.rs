//! Webhook events - the notifications fanned out to subscriber endpoints.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::DomainError;

/// Arbitrary JSON object carried alongside an event.
pub type EventPayload = serde_json::Map<String, serde_json::Value>;

/// Domain events a webhook can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventKind {
    #[serde(rename = "vote.created")]
    VoteCreated,
    #[serde(rename = "poll.created")]
    PollCreated,
    #[serde(rename = "poll.updated")]
    PollUpdated,
    #[serde(rename = "poll.deleted")]
    PollDeleted,
}

impl WebhookEventKind {
    pub const ALL: [WebhookEventKind; 4] = [
        WebhookEventKind::VoteCreated,
        WebhookEventKind::PollCreated,
        WebhookEventKind::PollUpdated,
        WebhookEventKind::PollDeleted,
    ];

    /// Wire name, as stored in a webhook's `events` list and sent in `X-Webhook-Event`.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventKind::VoteCreated => "vote.created",
            WebhookEventKind::PollCreated => "poll.created",
            WebhookEventKind::PollUpdated => "poll.updated",
            WebhookEventKind::PollDeleted => "poll.deleted",
        }
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEventKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DomainError::UnknownEvent(s.to_string()))
    }
}

/// A single dispatch of an event.
///
/// The timestamp is fixed when the event is built so every recipient of one
/// dispatch sees the same value. Events are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: WebhookEventKind,
    pub payload: EventPayload,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    /// Create an event stamped with the current time.
    pub fn new(event: WebhookEventKind, payload: EventPayload) -> Self {
        Self::at(event, payload, Utc::now())
    }

    pub fn at(event: WebhookEventKind, payload: EventPayload, timestamp: DateTime<Utc>) -> Self {
        Self {
            event,
            payload,
            timestamp,
        }
    }

    /// Serialize to the JSON body sent to every subscriber.
    ///
    /// Signatures are computed over exactly these bytes.
    pub fn to_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

fn serialize_iso_millis<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
}
