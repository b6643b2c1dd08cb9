//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod dispatch;
mod rate_limit;
mod repository;

pub use dispatch::EventDispatcher;
pub use rate_limit::{RateLimitConfig, RateLimitError, RateLimitResult, RateLimiter};
pub use repository::{BaseRepository, WebhookRepository};
