//! Event dispatch port.

use uuid::Uuid;

use crate::domain::{EventPayload, WebhookEventKind};

/// Fans a domain event out to the webhooks a user registered.
///
/// Dispatch is fire-and-forget: it returns immediately and never reports
/// delivery failures to the caller, so notification problems cannot affect
/// the operation that raised the event.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, user_id: Uuid, event: WebhookEventKind, payload: EventPayload);
}
