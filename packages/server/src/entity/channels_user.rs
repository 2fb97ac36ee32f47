use common::Status;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-user read state of a channel.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "channels_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub uuid: Uuid,

    #[sea_orm(indexed)]
    pub channel_id: i64,
    pub user_id: i64,
    /// Channel message count observed on the last view.
    pub num_messages: i64,
    pub num_views: i64,

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
