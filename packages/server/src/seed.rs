use sea_orm::sea_query::{Index, IntoIndexColumn, IntoTableRef, PostgresQueryBuilder};
use sea_orm::*;
use tracing::{info, warn};

use crate::entity::{
    channels_user, message, message_attachment, message_text, user_like, user_vote, workspace_chd,
};

fn composite<T, C>(
    name: &'static str,
    unique: bool,
    table: T,
    cols: [C; 2],
) -> (&'static str, bool, String)
where
    T: IntoTableRef,
    C: IntoIndexColumn,
{
    let mut stmt = Index::create();
    stmt.if_not_exists().name(name).table(table);
    if unique {
        stmt.unique();
    }
    for col in cols {
        stmt.col(col);
    }
    (name, unique, stmt.to_string(PostgresQueryBuilder))
}

/// Composite indexes schema-sync cannot express, as `(name, unique, sql)`.
fn indexes() -> Vec<(&'static str, bool, String)> {
    vec![
        // One edge per (parent, child).
        composite(
            "uq_workspace_chd_parent_child",
            true,
            workspace_chd::Entity,
            [workspace_chd::Column::ParentId, workspace_chd::Column::ChildId],
        ),
        // One read-state row per (channel, user).
        composite(
            "uq_channels_user_channel_user",
            true,
            channels_user::Entity,
            [channels_user::Column::ChannelId, channels_user::Column::UserId],
        ),
        // WHERE channel_id = ? AND id <= ? ORDER BY id DESC
        composite(
            "idx_message_channel_id",
            false,
            message::Entity,
            [message::Column::ChannelId, message::Column::Id],
        ),
        composite(
            "idx_message_text_message",
            false,
            message_text::Entity,
            [message_text::Column::MessageId, message_text::Column::Id],
        ),
        composite(
            "idx_message_attachment_message",
            false,
            message_attachment::Entity,
            [message_attachment::Column::MessageId, message_attachment::Column::Id],
        ),
        // Not unique: a retired reaction keeps its row.
        composite(
            "idx_user_like_message_user",
            false,
            user_like::Entity,
            [user_like::Column::MessageId, user_like::Column::UserId],
        ),
        composite(
            "idx_user_vote_message_user",
            false,
            user_vote::Entity,
            [user_vote::Column::MessageId, user_vote::Column::UserId],
        ),
    ]
}

/// Ensure required database indexes exist.
///
/// Unique indexes back invariants and must exist; a failure there aborts
/// startup. Lookup indexes are best effort.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    for (name, unique, stmt) in indexes() {
        match db.execute_unprepared(&stmt).await {
            Ok(_) => info!("Ensured index {name} exists"),
            Err(e) if unique => return Err(e),
            Err(e) => warn!("Failed to create index {name}: {e}"),
        }
    }
    Ok(())
}
