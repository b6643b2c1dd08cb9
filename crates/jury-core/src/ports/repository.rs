use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::Webhook;
use crate::error::RepoError;

/// Generic repository trait defining standard CRUD operations.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;

    /// Save an entity (create or update).
    async fn save(&self, entity: T) -> Result<T, RepoError>;

    /// Delete an entity by its ID.
    async fn delete(&self, id: ID) -> Result<(), RepoError>;
}

/// Webhook subscriber store.
#[async_trait]
pub trait WebhookRepository: BaseRepository<Webhook, Uuid> {
    /// All webhooks owned by `user_id` with `is_active = true`.
    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Vec<Webhook>, RepoError>;

    /// Record that a delivery to this webhook was attempted.
    async fn touch_last_triggered(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepoError>;
}
