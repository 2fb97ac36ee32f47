use common::Status;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub uuid: Uuid,

    pub num_likes: i64,
    pub num_upvotes: i64,
    pub num_downvotes: i64,

    #[sea_orm(indexed)]
    pub workspace_id: i64,

    pub channel_id: i64,
    #[sea_orm(belongs_to, from = "channel_id", to = "id")]
    pub channel: HasOne<super::channel::Entity>,

    #[sea_orm(indexed)]
    pub user_id: i64,

    #[sea_orm(has_many)]
    pub texts: HasMany<super::message_text::Entity>,

    #[sea_orm(has_many)]
    pub attachments: HasMany<super::message_attachment::Entity>,

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
