//! Domain entities - the core business objects.

mod event;
mod webhook;

pub use event::{EventPayload, WebhookEvent, WebhookEventKind};
pub use webhook::Webhook;
