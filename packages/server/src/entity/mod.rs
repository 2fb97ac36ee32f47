pub mod channel;
pub mod channels_user;
pub mod message;
pub mod message_attachment;
pub mod message_text;
pub mod user;
pub mod user_like;
pub mod user_reply;
pub mod user_vote;
pub mod workspace;
pub mod workspace_chd;

use common::Stamp;
use sea_orm::Set;

/// Writes the shared timestamp tuple into an active model.
pub trait Stamped {
    /// Fill both `created_*` and `updated_*` for a fresh row.
    fn stamp_created(&mut self, stamp: &Stamp);
    /// Refresh `updated_*` only.
    fn stamp_updated(&mut self, stamp: &Stamp);
}

macro_rules! impl_stamped {
    ($($module:ident),* $(,)?) => {
        $(
            impl Stamped for $module::ActiveModel {
                fn stamp_created(&mut self, stamp: &Stamp) {
                    self.created_at = Set(stamp.at);
                    self.created_day = Set(stamp.day);
                    self.created_week = Set(stamp.week);
                    self.created_month = Set(stamp.month);
                    self.created_year = Set(stamp.year);
                    self.stamp_updated(stamp);
                }

                fn stamp_updated(&mut self, stamp: &Stamp) {
                    self.updated_at = Set(stamp.at);
                    self.updated_day = Set(stamp.day);
                    self.updated_week = Set(stamp.week);
                    self.updated_month = Set(stamp.month);
                    self.updated_year = Set(stamp.year);
                }
            }
        )*
    };
}

impl_stamped!(
    channel,
    channels_user,
    message,
    message_attachment,
    message_text,
    user,
    user_like,
    user_reply,
    user_vote,
    workspace,
    workspace_chd,
);

/// Adds `updated_* = stamp` column expressions to an `update_many` query.
#[macro_export]
macro_rules! touch_updated {
    ($query:expr, $module:ident, $stamp:expr) => {{
        let stamp: &common::Stamp = $stamp;
        $query
            .col_expr(
                $module::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(stamp.at),
            )
            .col_expr(
                $module::Column::UpdatedDay,
                sea_orm::sea_query::Expr::value(stamp.day),
            )
            .col_expr(
                $module::Column::UpdatedWeek,
                sea_orm::sea_query::Expr::value(stamp.week),
            )
            .col_expr(
                $module::Column::UpdatedMonth,
                sea_orm::sea_query::Expr::value(stamp.month),
            )
            .col_expr(
                $module::Column::UpdatedYear,
                sea_orm::sea_query::Expr::value(stamp.year),
            )
    }};
}
