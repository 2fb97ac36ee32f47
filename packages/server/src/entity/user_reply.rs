use common::Status;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Activity record written once per message creation.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_reply")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub uuid: Uuid,

    #[sea_orm(indexed)]
    pub channel_id: i64,
    #[sea_orm(indexed)]
    pub message_id: i64,
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// `false` for the message that opened the channel.
    pub is_reply: bool,

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
