//! Webhook entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "webhooks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub secret: String,
    pub events: Vec<String>,
    pub is_active: bool,
    pub last_triggered_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Conversion from SeaORM Model to Domain Webhook.
impl From<Model> for jury_core::domain::Webhook {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            url: model.url,
            secret: model.secret,
            events: model.events,
            is_active: model.is_active,
            last_triggered_at: model.last_triggered_at.map(Into::into),
            created_at: model.created_at.into(),
        }
    }
}

/// Conversion from Domain Webhook to SeaORM ActiveModel.
impl From<jury_core::domain::Webhook> for ActiveModel {
    fn from(webhook: jury_core::domain::Webhook) -> Self {
        Self {
            id: Set(webhook.id),
            user_id: Set(webhook.user_id),
            url: Set(webhook.url),
            secret: Set(webhook.secret),
            events: Set(webhook.events),
            is_active: Set(webhook.is_active),
            last_triggered_at: Set(webhook.last_triggered_at.map(Into::into)),
            created_at: Set(webhook.created_at.into()),
        }
    }
}
