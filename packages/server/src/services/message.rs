use std::collections::HashMap;

use common::{Stamp, Status, VoteDirection, cursor};
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::*;
use tokio_util::sync::CancellationToken;

use crate::entity::{
    Stamped, channel, message, message_attachment, message_text, user_like, user_reply, user_vote,
};
use crate::error::AppError;
use crate::models::message::MessageResponse;
use crate::models::shared::EntityRef;
use crate::services::ref_condition;
use crate::store::{self, StoreResultExt, guard};

/// Everything needed to post a message into a known channel.
#[derive(Clone, Debug)]
pub struct NewMessage<'m> {
    pub workspace_id: i64,
    pub channel_id: i64,
    pub user_id: i64,
    pub body: &'m str,
    pub attachment: Option<&'m str>,
    /// `false` for the message that opens a channel.
    pub is_reply: bool,
}

/// Messages, their bodies, attachments and reactions.
pub struct MessageService<'a> {
    db: &'a DatabaseConnection,
    cancel: &'a CancellationToken,
}

fn not_found() -> AppError {
    AppError::NotFound("Message not found".into())
}

fn active_ref(target: &EntityRef) -> Result<Select<message::Entity>, AppError> {
    let cond = ref_condition(target, message::Column::Id, message::Column::Uuid)?;
    Ok(message::Entity::find()
        .filter(cond)
        .filter(message::Column::Status.eq(Status::Active)))
}

impl<'a> MessageService<'a> {
    pub fn new(db: &'a DatabaseConnection, cancel: &'a CancellationToken) -> Self {
        Self { db, cancel }
    }

    /// Post a message inside an open transaction.
    ///
    /// Steps run in a fixed order so that every foreign key already exists
    /// when it is referenced: message, text, attachment, channel counter,
    /// reply record. The caller owns commit and rollback.
    pub async fn create_in<C: ConnectionTrait>(
        &self,
        txn: &C,
        stamp: &Stamp,
        new: NewMessage<'_>,
    ) -> Result<message::Model, AppError> {
        let mut msg = message::ActiveModel {
            uuid: Set(common::ids::new_id()),
            num_likes: Set(0),
            num_upvotes: Set(0),
            num_downvotes: Set(0),
            workspace_id: Set(new.workspace_id),
            channel_id: Set(new.channel_id),
            user_id: Set(new.user_id),
            status: Set(Status::Active),
            ..Default::default()
        };
        msg.stamp_created(stamp);
        let msg = guard(self.cancel, msg.insert(txn)).await.at(8001)?;

        let mut text = message_text::ActiveModel {
            uuid: Set(common::ids::new_id()),
            body: Set(new.body.trim().to_owned()),
            workspace_id: Set(new.workspace_id),
            channel_id: Set(new.channel_id),
            message_id: Set(msg.id),
            user_id: Set(new.user_id),
            status: Set(Status::Active),
            ..Default::default()
        };
        text.stamp_created(stamp);
        guard(self.cancel, text.insert(txn)).await.at(8002)?;

        if let Some(attachment) = new.attachment.map(str::trim).filter(|a| !a.is_empty()) {
            self.attach(txn, stamp, &msg, attachment).await?;
        }

        let channel = guard(
            self.cancel,
            channel::Entity::find_by_id(new.channel_id).one(txn),
        )
        .await
        .at(8004)?
        .ok_or_else(|| AppError::NotFound("Channel not found".into()))?;
        let bump = channel::Entity::update_many()
            .col_expr(
                channel::Column::NumMessages,
                Expr::col(channel::Column::NumMessages).add(1),
            )
            .filter(channel::Column::Id.eq(channel.id));
        let bump = crate::touch_updated!(bump, channel, stamp);
        guard(self.cancel, bump.exec(txn)).await.at(8005)?;

        let mut reply = user_reply::ActiveModel {
            uuid: Set(common::ids::new_id()),
            channel_id: Set(new.channel_id),
            message_id: Set(msg.id),
            user_id: Set(new.user_id),
            is_reply: Set(new.is_reply),
            status: Set(Status::Active),
            ..Default::default()
        };
        reply.stamp_created(stamp);
        guard(self.cancel, reply.insert(txn)).await.at(8006)?;

        Ok(msg)
    }

    async fn attach<C: ConnectionTrait>(
        &self,
        txn: &C,
        stamp: &Stamp,
        msg: &message::Model,
        attachment: &str,
    ) -> Result<(), AppError> {
        let mut row = message_attachment::ActiveModel {
            uuid: Set(common::ids::new_id()),
            attachment: Set(attachment.to_owned()),
            workspace_id: Set(msg.workspace_id),
            channel_id: Set(msg.channel_id),
            message_id: Set(msg.id),
            user_id: Set(msg.user_id),
            status: Set(Status::Active),
            ..Default::default()
        };
        row.stamp_created(stamp);
        guard(self.cancel, row.insert(txn)).await.at(8003)?;
        Ok(())
    }

    /// Post a reply into an active channel.
    pub async fn create(
        &self,
        channel_ref: &EntityRef,
        body: &str,
        attachment: Option<&str>,
        user_id: i64,
    ) -> Result<MessageResponse, AppError> {
        let stamp = Stamp::now();
        let cond = ref_condition(channel_ref, channel::Column::Id, channel::Column::Uuid)?;

        let txn = store::begin(self.db, self.cancel).await.at(8010)?;
        let result: Result<message::Model, AppError> = async {
            let channel = guard(
                self.cancel,
                channel::Entity::find()
                    .filter(cond)
                    .filter(channel::Column::Status.eq(Status::Active))
                    .one(&txn),
            )
            .await
            .at(8011)?
            .ok_or_else(|| AppError::NotFound("Channel not found".into()))?;
            self.create_in(
                &txn,
                &stamp,
                NewMessage {
                    workspace_id: channel.workspace_id,
                    channel_id: channel.id,
                    user_id,
                    body,
                    attachment,
                    is_reply: true,
                },
            )
            .await
        }
        .await;
        let msg = store::finish(txn, self.cancel, 8012, result).await?;
        self.hydrate_one(msg).await
    }

    pub async fn get_model(&self, target: &EntityRef) -> Result<message::Model, AppError> {
        guard(self.cancel, active_ref(target)?.one(self.db))
            .await
            .at(8020)?
            .ok_or_else(not_found)
    }

    pub async fn get(&self, target: &EntityRef) -> Result<MessageResponse, AppError> {
        let msg = self.get_model(target).await?;
        self.hydrate_one(msg).await
    }

    async fn hydrate_one(&self, msg: message::Model) -> Result<MessageResponse, AppError> {
        self.get_with_bodies(vec![msg])
            .await?
            .pop()
            .ok_or_else(not_found)
    }

    /// Populate texts and attachments for a batch of messages with two
    /// queries, keeping the input order.
    pub async fn get_with_bodies(
        &self,
        messages: Vec<message::Model>,
    ) -> Result<Vec<MessageResponse>, AppError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();

        let texts = guard(
            self.cancel,
            message_text::Entity::find()
                .filter(message_text::Column::MessageId.is_in(ids.clone()))
                .filter(message_text::Column::Status.eq(Status::Active))
                .order_by_asc(message_text::Column::Id)
                .all(self.db),
        )
        .await
        .at(8030)?;
        let attachments = guard(
            self.cancel,
            message_attachment::Entity::find()
                .filter(message_attachment::Column::MessageId.is_in(ids))
                .filter(message_attachment::Column::Status.eq(Status::Active))
                .order_by_asc(message_attachment::Column::Id)
                .all(self.db),
        )
        .await
        .at(8031)?;

        let mut texts_by: HashMap<i64, Vec<message_text::Model>> = HashMap::new();
        for t in texts {
            texts_by.entry(t.message_id).or_default().push(t);
        }
        let mut attachments_by: HashMap<i64, Vec<message_attachment::Model>> = HashMap::new();
        for a in attachments {
            attachments_by.entry(a.message_id).or_default().push(a);
        }

        Ok(messages
            .into_iter()
            .map(|m| {
                let texts = texts_by.remove(&m.id).unwrap_or_default();
                let attachments = attachments_by.remove(&m.id).unwrap_or_default();
                MessageResponse::new(m, texts, attachments)
            })
            .collect())
    }

    /// One page of active messages, newest first, optionally within one channel.
    pub async fn list(
        &self,
        channel_id: Option<i64>,
        limit: u64,
        after: &str,
    ) -> Result<(Vec<MessageResponse>, String), AppError> {
        let upper = cursor::decode(after)?;
        let mut query = message::Entity::find()
            .filter(message::Column::Id.lte(upper))
            .filter(message::Column::Status.eq(Status::Active));
        if let Some(channel_id) = channel_id {
            query = query.filter(message::Column::ChannelId.eq(channel_id));
        }
        let rows = guard(
            self.cancel,
            query
                .order_by_desc(message::Column::Id)
                .limit(limit)
                .all(self.db),
        )
        .await
        .at(8040)?;
        let next = cursor::next(rows.last().map(|m| m.id));
        Ok((self.get_with_bodies(rows).await?, next))
    }

    /// Record a like. A user likes a message at most once.
    pub async fn like(&self, target: &EntityRef, user_id: i64) -> Result<MessageResponse, AppError> {
        let stamp = Stamp::now();
        let query = active_ref(target)?;

        let txn = store::begin(self.db, self.cancel).await.at(8050)?;
        let result: Result<message::Model, AppError> = async {
            let msg = guard(self.cancel, query.one(&txn))
                .await
                .at(8051)?
                .ok_or_else(not_found)?;
            let existing = guard(
                self.cancel,
                user_like::Entity::find()
                    .filter(user_like::Column::MessageId.eq(msg.id))
                    .filter(user_like::Column::UserId.eq(user_id))
                    .filter(user_like::Column::Status.eq(Status::Active))
                    .one(&txn),
            )
            .await
            .at(8052)?;
            if existing.is_some() {
                return Err(AppError::Conflict("Message already liked".into()));
            }

            let mut like = user_like::ActiveModel {
                uuid: Set(common::ids::new_id()),
                message_id: Set(msg.id),
                user_id: Set(user_id),
                status: Set(Status::Active),
                ..Default::default()
            };
            like.stamp_created(&stamp);
            guard(self.cancel, like.insert(&txn)).await.at(8053)?;

            let bump = message::Entity::update_many()
                .col_expr(
                    message::Column::NumLikes,
                    Expr::col(message::Column::NumLikes).add(1),
                )
                .filter(message::Column::Id.eq(msg.id));
            let bump = crate::touch_updated!(bump, message, &stamp);
            guard(self.cancel, bump.exec(&txn)).await.at(8054)?;
            Ok(msg)
        }
        .await;
        let msg = store::finish(txn, self.cancel, 8055, result).await?;
        self.get(&EntityRef::Internal(msg.id)).await
    }

    /// Record a vote. A user votes on a message at most once.
    pub async fn vote(
        &self,
        target: &EntityRef,
        user_id: i64,
        direction: VoteDirection,
    ) -> Result<MessageResponse, AppError> {
        let stamp = Stamp::now();
        let query = active_ref(target)?;

        let txn = store::begin(self.db, self.cancel).await.at(8060)?;
        let result: Result<message::Model, AppError> = async {
            let msg = guard(self.cancel, query.one(&txn))
                .await
                .at(8061)?
                .ok_or_else(not_found)?;
            let existing = guard(
                self.cancel,
                user_vote::Entity::find()
                    .filter(user_vote::Column::MessageId.eq(msg.id))
                    .filter(user_vote::Column::UserId.eq(user_id))
                    .filter(user_vote::Column::Status.eq(Status::Active))
                    .one(&txn),
            )
            .await
            .at(8062)?;
            if existing.is_some() {
                return Err(AppError::Conflict("Message already voted on".into()));
            }

            let mut vote = user_vote::ActiveModel {
                uuid: Set(common::ids::new_id()),
                message_id: Set(msg.id),
                user_id: Set(user_id),
                vote: Set(direction),
                status: Set(Status::Active),
                ..Default::default()
            };
            vote.stamp_created(&stamp);
            guard(self.cancel, vote.insert(&txn)).await.at(8063)?;

            let counter = match direction {
                VoteDirection::Up => message::Column::NumUpvotes,
                VoteDirection::Down => message::Column::NumDownvotes,
            };
            let bump = message::Entity::update_many()
                .col_expr(counter, Expr::col(counter).add(1))
                .filter(message::Column::Id.eq(msg.id));
            let bump = crate::touch_updated!(bump, message, &stamp);
            guard(self.cancel, bump.exec(&txn)).await.at(8064)?;
            Ok(msg)
        }
        .await;
        let msg = store::finish(txn, self.cancel, 8065, result).await?;
        self.get(&EntityRef::Internal(msg.id)).await
    }

    /// Edit a message. A new body is appended as a text version; a new
    /// attachment replaces the active ones.
    pub async fn update(
        &self,
        target: &EntityRef,
        body: Option<&str>,
        attachment: Option<&str>,
        user_id: i64,
    ) -> Result<MessageResponse, AppError> {
        let stamp = Stamp::now();
        let query = active_ref(target)?;

        let txn = store::begin(self.db, self.cancel).await.at(8070)?;
        let result: Result<message::Model, AppError> = async {
            let msg = guard(self.cancel, query.one(&txn))
                .await
                .at(8071)?
                .ok_or_else(not_found)?;

            if let Some(body) = body {
                let mut text = message_text::ActiveModel {
                    uuid: Set(common::ids::new_id()),
                    body: Set(body.trim().to_owned()),
                    workspace_id: Set(msg.workspace_id),
                    channel_id: Set(msg.channel_id),
                    message_id: Set(msg.id),
                    user_id: Set(user_id),
                    status: Set(Status::Active),
                    ..Default::default()
                };
                text.stamp_created(&stamp);
                guard(self.cancel, text.insert(&txn)).await.at(8072)?;
            }

            if let Some(attachment) = attachment {
                let retire = message_attachment::Entity::update_many()
                    .col_expr(
                        message_attachment::Column::Status,
                        Expr::value(Status::Inactive),
                    )
                    .filter(message_attachment::Column::MessageId.eq(msg.id))
                    .filter(message_attachment::Column::Status.eq(Status::Active));
                let retire = crate::touch_updated!(retire, message_attachment, &stamp);
                guard(self.cancel, retire.exec(&txn)).await.at(8073)?;

                let attachment = attachment.trim();
                if !attachment.is_empty() {
                    self.attach(&txn, &stamp, &msg, attachment).await?;
                }
            }

            let mut active: message::ActiveModel = msg.into();
            active.stamp_updated(&stamp);
            guard(self.cancel, active.update(&txn)).await.at(8074)
        }
        .await;
        let msg = store::finish(txn, self.cancel, 8075, result).await?;
        self.hydrate_one(msg).await
    }

    /// Soft delete. Texts and attachments are kept; the channel counter is not
    /// decremented.
    pub async fn delete(&self, target: &EntityRef) -> Result<(), AppError> {
        let stamp = Stamp::now();
        let msg = self.get_model(target).await?;
        let query = message::Entity::update_many()
            .col_expr(message::Column::Status, Expr::value(Status::Inactive))
            .filter(message::Column::Id.eq(msg.id))
            .filter(message::Column::Status.eq(Status::Active));
        let query = crate::touch_updated!(query, message, &stamp);
        let res = guard(self.cancel, query.exec(self.db)).await.at(8080)?;
        if res.rows_affected == 0 {
            return Err(not_found());
        }
        Ok(())
    }
}
