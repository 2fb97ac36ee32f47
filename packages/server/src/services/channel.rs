use common::{Stamp, Status, cursor};
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::*;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::entity::{Stamped, channel, channels_user, message, workspace};
use crate::error::AppError;
use crate::models::message::MessageResponse;
use crate::models::shared::EntityRef;
use crate::services::message::{MessageService, NewMessage};
use crate::services::ref_condition;
use crate::services::workspace as workspace_service;
use crate::store::{self, StoreResultExt, guard};

/// Input of [`ChannelService::create`].
#[derive(Clone, Debug)]
pub struct NewChannel<'c> {
    pub workspace: &'c EntityRef,
    pub name: &'c str,
    pub description: &'c str,
    pub tags: &'c [String],
    pub initial_message: Option<&'c str>,
    pub attachment: Option<&'c str>,
}

pub struct ChannelService<'a> {
    db: &'a DatabaseConnection,
    cancel: &'a CancellationToken,
}

fn not_found() -> AppError {
    AppError::NotFound("Channel not found".into())
}

fn active_ref(target: &EntityRef) -> Result<Select<channel::Entity>, AppError> {
    let cond = ref_condition(target, channel::Column::Id, channel::Column::Uuid)?;
    Ok(channel::Entity::find()
        .filter(cond)
        .filter(channel::Column::Status.eq(Status::Active)))
}

fn tags_value(tags: &[String]) -> serde_json::Value {
    serde_json::Value::Array(
        tags.iter()
            .map(|t| serde_json::Value::String(t.trim().to_owned()))
            .collect(),
    )
}

impl<'a> ChannelService<'a> {
    pub fn new(db: &'a DatabaseConnection, cancel: &'a CancellationToken) -> Self {
        Self { db, cancel }
    }

    fn messages(&self) -> MessageService<'a> {
        MessageService::new(self.db, self.cancel)
    }

    /// Create a channel, bump the workspace's channel count, optionally post
    /// the opening message and register the creator's read state. All of it
    /// commits or none of it does.
    pub async fn create(
        &self,
        new: NewChannel<'_>,
        owner_id: i64,
    ) -> Result<channel::Model, AppError> {
        let stamp = Stamp::now();
        let query = workspace_service::active_ref(new.workspace)?;

        let txn = store::begin(self.db, self.cancel).await.at(7001)?;
        let result: Result<channel::Model, AppError> = async {
            let ws = guard(self.cancel, query.one(&txn))
                .await
                .at(7002)?
                .ok_or_else(|| AppError::NotFound("Workspace not found".into()))?;

            let mut model = channel::ActiveModel {
                uuid: Set(common::ids::new_id()),
                name: Set(new.name.trim().to_owned()),
                description: Set(new.description.trim().to_owned()),
                tags: Set(tags_value(new.tags)),
                num_tags: Set(new.tags.len() as i32),
                num_views: Set(0),
                num_messages: Set(0),
                workspace_id: Set(ws.id),
                user_id: Set(owner_id),
                status: Set(Status::Active),
                ..Default::default()
            };
            model.stamp_created(&stamp);
            let channel = guard(self.cancel, model.insert(&txn)).await.at(7003)?;

            let bump = workspace::Entity::update_many()
                .col_expr(
                    workspace::Column::NumChannels,
                    Expr::col(workspace::Column::NumChannels).add(1),
                )
                .filter(workspace::Column::Id.eq(ws.id));
            let bump = crate::touch_updated!(bump, workspace, &stamp);
            guard(self.cancel, bump.exec(&txn)).await.at(7004)?;

            if let Some(body) = new.initial_message {
                self.messages()
                    .create_in(
                        &txn,
                        &stamp,
                        NewMessage {
                            workspace_id: ws.id,
                            channel_id: channel.id,
                            user_id: owner_id,
                            body,
                            attachment: new.attachment,
                            is_reply: false,
                        },
                    )
                    .await?;
            }

            let mut seen = channels_user::ActiveModel {
                uuid: Set(common::ids::new_id()),
                channel_id: Set(channel.id),
                user_id: Set(owner_id),
                num_messages: Set(0),
                num_views: Set(0),
                status: Set(Status::Active),
                ..Default::default()
            };
            seen.stamp_created(&stamp);
            guard(self.cancel, seen.insert(&txn)).await.at(7005)?;

            // Counter bumps above ran as expressions; read back the final row.
            guard(self.cancel, channel::Entity::find_by_id(channel.id).one(&txn))
                .await
                .at(7006)?
                .ok_or_else(not_found)
        }
        .await;
        store::finish(txn, self.cancel, 7007, result).await
    }

    pub async fn get(&self, target: &EntityRef) -> Result<channel::Model, AppError> {
        guard(self.cancel, active_ref(target)?.one(self.db))
            .await
            .at(7010)?
            .ok_or_else(not_found)
    }

    /// Look a channel up by its name inside a workspace. The oldest match
    /// wins when names collide.
    pub async fn get_by_name(
        &self,
        workspace: &EntityRef,
        name: &str,
    ) -> Result<channel::Model, AppError> {
        let ws = guard(self.cancel, workspace_service::active_ref(workspace)?.one(self.db))
            .await
            .at(7011)?
            .ok_or_else(|| AppError::NotFound("Workspace not found".into()))?;
        guard(
            self.cancel,
            channel::Entity::find()
                .filter(channel::Column::WorkspaceId.eq(ws.id))
                .filter(channel::Column::Name.eq(name.trim()))
                .filter(channel::Column::Status.eq(Status::Active))
                .order_by_asc(channel::Column::Id)
                .one(self.db),
        )
        .await
        .at(7012)?
        .ok_or_else(not_found)
    }

    /// Load a channel with its active messages, then record the viewer's
    /// read state. A failed read-state update is logged and the channel is
    /// still returned, with `None` in place of the read state.
    pub async fn show(
        &self,
        target: &EntityRef,
        viewer_id: i64,
    ) -> Result<(channel::Model, Vec<MessageResponse>, Option<channels_user::Model>), AppError>
    {
        let channel = self.get(target).await?;
        let rows = guard(
            self.cancel,
            message::Entity::find()
                .filter(message::Column::ChannelId.eq(channel.id))
                .filter(message::Column::Status.eq(Status::Active))
                .order_by_asc(message::Column::Id)
                .all(self.db),
        )
        .await
        .at(7020)?;
        let messages = self.messages().get_with_bodies(rows).await?;

        let read_state = match self.record_view(&channel, viewer_id).await {
            Ok(row) => Some(row),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                warn!(channel_id = channel.id, user_id = viewer_id, "Read-state update failed: {e}");
                None
            }
        };
        Ok((channel, messages, read_state))
    }

    /// Upsert the viewer's read state: one more view, and a snapshot of the
    /// channel's current message count.
    async fn record_view(
        &self,
        channel: &channel::Model,
        user_id: i64,
    ) -> Result<channels_user::Model, AppError> {
        let stamp = Stamp::now();
        let txn = store::begin(self.db, self.cancel).await.at(7021)?;
        let result: Result<channels_user::Model, AppError> = async {
            let current = guard(
                self.cancel,
                channel::Entity::find_by_id(channel.id).one(&txn),
            )
            .await
            .at(7022)?
            .ok_or_else(not_found)?;
            let existing = guard(
                self.cancel,
                channels_user::Entity::find()
                    .filter(channels_user::Column::ChannelId.eq(channel.id))
                    .filter(channels_user::Column::UserId.eq(user_id))
                    .filter(channels_user::Column::Status.eq(Status::Active))
                    .one(&txn),
            )
            .await
            .at(7023)?;

            match existing {
                Some(row) => {
                    let views = row.num_views;
                    let mut active: channels_user::ActiveModel = row.into();
                    active.num_views = Set(views + 1);
                    active.num_messages = Set(current.num_messages);
                    active.stamp_updated(&stamp);
                    guard(self.cancel, active.update(&txn)).await.at(7024)
                }
                None => {
                    let mut row = channels_user::ActiveModel {
                        uuid: Set(common::ids::new_id()),
                        channel_id: Set(channel.id),
                        user_id: Set(user_id),
                        num_messages: Set(current.num_messages),
                        num_views: Set(1),
                        status: Set(Status::Active),
                        ..Default::default()
                    };
                    row.stamp_created(&stamp);
                    guard(self.cancel, row.insert(&txn)).await.at(7025)
                }
            }
        }
        .await;
        store::finish(txn, self.cancel, 7026, result).await
    }

    /// One page of active channels, newest first.
    pub async fn list(
        &self,
        limit: u64,
        after: &str,
    ) -> Result<(Vec<channel::Model>, String), AppError> {
        let upper = cursor::decode(after)?;
        let rows = guard(
            self.cancel,
            channel::Entity::find()
                .filter(channel::Column::Id.lte(upper))
                .filter(channel::Column::Status.eq(Status::Active))
                .order_by_desc(channel::Column::Id)
                .limit(limit)
                .all(self.db),
        )
        .await
        .at(7030)?;
        let next = cursor::next(rows.last().map(|c| c.id));
        Ok((rows, next))
    }

    /// One page of a channel's messages, hydrated.
    pub async fn list_messages(
        &self,
        target: &EntityRef,
        limit: u64,
        after: &str,
    ) -> Result<(Vec<MessageResponse>, String), AppError> {
        let channel = self.get(target).await?;
        self.messages().list(Some(channel.id), limit, after).await
    }

    pub async fn update(
        &self,
        target: &EntityRef,
        name: &str,
        description: &str,
        tags: Option<&[String]>,
    ) -> Result<channel::Model, AppError> {
        let stamp = Stamp::now();
        let query = active_ref(target)?;
        let txn = store::begin(self.db, self.cancel).await.at(7040)?;
        let result: Result<channel::Model, AppError> = async {
            let channel = guard(self.cancel, query.one(&txn))
                .await
                .at(7041)?
                .ok_or_else(not_found)?;
            let mut active: channel::ActiveModel = channel.into();
            active.name = Set(name.trim().to_owned());
            active.description = Set(description.trim().to_owned());
            if let Some(tags) = tags {
                active.tags = Set(tags_value(tags));
                active.num_tags = Set(tags.len() as i32);
            }
            active.stamp_updated(&stamp);
            guard(self.cancel, active.update(&txn)).await.at(7042)
        }
        .await;
        store::finish(txn, self.cancel, 7043, result).await
    }

    /// Soft delete. The workspace's channel count is left alone.
    pub async fn delete(&self, target: &EntityRef) -> Result<(), AppError> {
        let stamp = Stamp::now();
        let channel = self.get(target).await?;
        let query = channel::Entity::update_many()
            .col_expr(channel::Column::Status, Expr::value(Status::Inactive))
            .filter(channel::Column::Id.eq(channel.id))
            .filter(channel::Column::Status.eq(Status::Active));
        let query = crate::touch_updated!(query, channel, &stamp);
        let res = guard(self.cancel, query.exec(self.db)).await.at(7050)?;
        if res.rows_affected == 0 {
            return Err(not_found());
        }
        Ok(())
    }
}
