//! In-memory webhook repository - used when no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use jury_core::domain::Webhook;
use jury_core::error::RepoError;
use jury_core::ports::{BaseRepository, WebhookRepository};

/// Webhook store held in a `HashMap`.
///
/// Note: Data is lost on process restart.
#[derive(Default)]
pub struct InMemoryWebhookRepository {
    store: RwLock<HashMap<Uuid, Webhook>>,
}

impl InMemoryWebhookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a repository with existing webhooks.
    pub fn with_webhooks(webhooks: impl IntoIterator<Item = Webhook>) -> Self {
        Self {
            store: RwLock::new(webhooks.into_iter().map(|w| (w.id, w)).collect()),
        }
    }
}

#[async_trait]
impl BaseRepository<Webhook, Uuid> for InMemoryWebhookRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Webhook>, RepoError> {
        Ok(self.store.read().await.get(&id).cloned())
    }

    async fn save(&self, entity: Webhook) -> Result<Webhook, RepoError> {
        self.store.write().await.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.store
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl WebhookRepository for InMemoryWebhookRepository {
    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Vec<Webhook>, RepoError> {
        let store = self.store.read().await;
        let mut webhooks: Vec<Webhook> = store
            .values()
            .filter(|w| w.user_id == user_id && w.is_active)
            .cloned()
            .collect();
        webhooks.sort_by_key(|w| w.created_at);
        Ok(webhooks)
    }

    async fn touch_last_triggered(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepoError> {
        let mut store = self.store.write().await;
        let webhook = store.get_mut(&id).ok_or(RepoError::NotFound)?;
        webhook.last_triggered_at = Some(at);
        Ok(())
    }
}
