use common::Status;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message_attachment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub uuid: Uuid,

    /// Opaque reference to the stored attachment (URL or blob key).
    pub attachment: String,

    pub workspace_id: i64,
    pub channel_id: i64,

    pub message_id: i64,
    #[sea_orm(belongs_to, from = "message_id", to = "id")]
    pub message: HasOne<super::message::Entity>,

    pub user_id: i64,

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
