use common::Status;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A nestable container of channels. Root workspaces have `level = 0` and
/// `parent_id = 0`; the edge rows in `workspace_chd` enumerate children.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "workspace")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub uuid: Uuid,

    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub num_views: i64,
    /// Cumulative channel creations; soft deletes never decrement it.
    pub num_channels: i64,
    #[sea_orm(indexed)]
    pub level: i32,
    #[sea_orm(indexed)]
    pub parent_id: i64,
    /// Cumulative child creations; recomputable from `workspace_chd`.
    pub num_chd: i64,
    #[sea_orm(indexed)]
    pub user_id: i64,

    #[sea_orm(has_many)]
    pub channels: HasMany<super::channel::Entity>,

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
