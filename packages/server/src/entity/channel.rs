use common::Status;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "channel")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub uuid: Uuid,

    #[sea_orm(indexed)]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Up to ten tags stored as a JSON array of strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: serde_json::Value,
    pub num_tags: i32,
    pub num_views: i64,
    /// Cumulative message creations; soft deletes never decrement it.
    pub num_messages: i64,

    pub workspace_id: i64,
    #[sea_orm(belongs_to, from = "workspace_id", to = "id")]
    pub workspace: HasOne<super::workspace::Entity>,

    #[sea_orm(indexed)]
    pub user_id: i64,

    #[sea_orm(has_many)]
    pub messages: HasMany<super::message::Entity>,

    pub status: Status,
    pub created_at: DateTimeUtc,
    pub created_day: i32,
    pub created_week: i32,
    pub created_month: i32,
    pub created_year: i32,
    pub updated_at: DateTimeUtc,
    pub updated_day: i32,
    pub updated_week: i32,
    pub updated_month: i32,
    pub updated_year: i32,
}

impl ActiveModelBehavior for ActiveModel {}
