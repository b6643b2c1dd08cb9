//! # Jury Infrastructure
//!
//! Concrete implementations of the ports defined in `jury-core`:
//! token-bucket rate limiters, the webhook dispatcher, and webhook stores.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory only
//! - `postgres` - PostgreSQL webhook store via SeaORM
//! - `redis` - Redis-backed rate limiter shared across instances

pub mod database;
pub mod rate_limit;
pub mod webhooks;

// Re-exports - In-Memory
pub use database::{DatabaseConfig, InMemoryWebhookRepository};
pub use rate_limit::InMemoryRateLimiter;
pub use webhooks::{DispatcherConfig, WebhookDispatcher};

#[cfg(feature = "postgres")]
pub use database::{DatabaseConnections, PostgresWebhookRepository};

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use rate_limit::{RedisRateLimitConfig, RedisRateLimiter};
