use common::{Status, UserState};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub uuid: Uuid,

    #[sea_orm(unique)]
    pub email: String,
    /// Address awaiting confirmation while the account is `ChangingEmail`.
    pub new_email: Option<String>,
    /// Argon2 PHC string.
    pub password: String,
    pub role: String,
    pub state: UserState,

    #[sea_orm(indexed)]
    pub confirm_selector: Option<String>,
    pub confirm_verifier_hash: Option<Vec<u8>>,
    pub confirm_expires_at: Option<DateTimeUtc>,

    #[sea_orm(indexed)]
    pub reset_selector: Option<String>,
    pub reset_verifier_hash: Option<Vec<u8>>,
    pub reset_expires_at: Option<DateTimeUtc>,

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
