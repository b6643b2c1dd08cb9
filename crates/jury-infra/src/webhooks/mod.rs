//! Webhook fan-out: payload signing and fire-and-forget delivery.

mod dispatcher;
mod error;
mod signing;

pub use dispatcher::{DispatchSummary, DispatcherConfig, WebhookDispatcher};
pub use error::{DeliveryError, DispatchError, SignatureError};
pub use signing::{EVENT_HEADER, SIGNATURE_HEADER, sign_payload, verify_signature};
