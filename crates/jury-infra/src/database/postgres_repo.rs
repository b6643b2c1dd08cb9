//! PostgreSQL webhook repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use jury_core::domain::Webhook;
use jury_core::error::RepoError;
use jury_core::ports::{BaseRepository, WebhookRepository};

use super::entity::webhook::{self, Entity as WebhookEntity};

/// PostgreSQL webhook repository.
pub struct PostgresWebhookRepository {
    db: DbConn,
}

impl PostgresWebhookRepository {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }
}

fn query_error(e: DbErr) -> RepoError {
    let err_str = e.to_string();
    if err_str.contains("duplicate") || err_str.contains("unique") {
        RepoError::Constraint("Webhook already exists".to_string())
    } else {
        RepoError::Query(err_str)
    }
}

#[async_trait]
impl BaseRepository<Webhook, Uuid> for PostgresWebhookRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Webhook>, RepoError> {
        let result = WebhookEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.map(Into::into))
    }

    async fn save(&self, entity: Webhook) -> Result<Webhook, RepoError> {
        let exists = WebhookEntity::find_by_id(entity.id)
            .one(&self.db)
            .await
            .map_err(query_error)?
            .is_some();

        let active_model: webhook::ActiveModel = entity.into();
        let model = if exists {
            active_model.update(&self.db).await
        } else {
            active_model.insert(&self.db).await
        }
        .map_err(query_error)?;

        Ok(model.into())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let result = WebhookEntity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(query_error)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }
}

#[async_trait]
impl WebhookRepository for PostgresWebhookRepository {
    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Vec<Webhook>, RepoError> {
        tracing::debug!(%user_id, "Loading active webhooks");

        let result = WebhookEntity::find()
            .filter(webhook::Column::UserId.eq(user_id))
            .filter(webhook::Column::IsActive.eq(true))
            .order_by_asc(webhook::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(query_error)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn touch_last_triggered(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepoError> {
        let at: sea_orm::prelude::DateTimeWithTimeZone = at.into();

        let result = WebhookEntity::update_many()
            .col_expr(webhook::Column::LastTriggeredAt, Expr::value(at))
            .filter(webhook::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(query_error)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }
}
