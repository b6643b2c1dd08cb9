//! Webhook subscriber store.

mod connections;
mod memory;

#[cfg(feature = "postgres")]
pub mod postgres_repo;

#[cfg(feature = "postgres")]
pub mod entity;

pub use connections::DatabaseConfig;
#[cfg(feature = "postgres")]
pub use connections::DatabaseConnections;
pub use memory::InMemoryWebhookRepository;

#[cfg(feature = "postgres")]
pub use postgres_repo::PostgresWebhookRepository;
