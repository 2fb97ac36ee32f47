#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};

/// Activity status carried by every row. Soft delete flips it to `Inactive`.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "i16", db_type = "SmallInteger")
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 0))]
    Inactive,
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 1))]
    Active,
}

/// Account lifecycle: `Unconfirmed -> Confirmed -> {ChangingEmail -> Confirmed} -> Inactive`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "i16", db_type = "SmallInteger")
)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 0))]
    Unconfirmed,
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 1))]
    Confirmed,
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 2))]
    ChangingEmail,
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 3))]
    Inactive,
}

impl UserState {
    /// Whether the account may obtain a session.
    pub fn can_login(&self) -> bool {
        matches!(self, Self::Confirmed)
    }

    /// Whether a session issued earlier stays usable. An email change in
    /// progress does not log the user out.
    pub fn keeps_session(&self) -> bool {
        matches!(self, Self::Confirmed | Self::ChangingEmail)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(&self, next: UserState) -> bool {
        use UserState::*;
        matches!(
            (*self, next),
            (Unconfirmed, Confirmed)
                | (Confirmed, ChangingEmail)
                | (ChangingEmail, Confirmed)
                | (Confirmed, Inactive)
                | (ChangingEmail, Inactive)
        )
    }
}

/// Direction of a vote on a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")
)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "up"))]
    Up,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "down"))]
    Down,
}
