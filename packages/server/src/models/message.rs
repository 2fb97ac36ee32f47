use chrono::{DateTime, Utc};
use common::{Status, VoteDirection};
use serde::{Deserialize, Serialize};

use crate::entity::{message, message_attachment, message_text};
use crate::error::AppError;
use crate::models::shared::{EntityRef, validate_len};

pub const BODY_MAX: usize = 10_000;
pub const ATTACHMENT_MAX: usize = 2048;

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MessageTextResponse {
    pub id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<message_text::Model> for MessageTextResponse {
    fn from(t: message_text::Model) -> Self {
        Self {
            id: t.id,
            body: t.body,
            created_at: t.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AttachmentResponse {
    pub id: i64,
    pub attachment: String,
    pub created_at: DateTime<Utc>,
}

impl From<message_attachment::Model> for AttachmentResponse {
    fn from(a: message_attachment::Model) -> Self {
        Self {
            id: a.id,
            attachment: a.attachment,
            created_at: a.created_at,
        }
    }
}

/// A message with its body versions and attachments.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub id: i64,
    #[schema(example = "67e55044-10b1-426f-9247-bb680e5fe0c8")]
    pub uuid: String,
    /// The displayed body: the most recent text version.
    pub body: String,
    pub num_likes: i64,
    pub num_upvotes: i64,
    pub num_downvotes: i64,
    pub workspace_id: i64,
    pub channel_id: i64,
    pub user_id: i64,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Every body version, oldest first.
    pub texts: Vec<MessageTextResponse>,
    pub attachments: Vec<AttachmentResponse>,
}

impl MessageResponse {
    pub fn new(
        m: message::Model,
        texts: Vec<message_text::Model>,
        attachments: Vec<message_attachment::Model>,
    ) -> Self {
        let body = texts.last().map(|t| t.body.clone()).unwrap_or_default();
        Self {
            id: m.id,
            uuid: common::ids::encode(&m.uuid),
            body,
            num_likes: m.num_likes,
            num_upvotes: m.num_upvotes,
            num_downvotes: m.num_downvotes,
            workspace_id: m.workspace_id,
            channel_id: m.channel_id,
            user_id: m.user_id,
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
            texts: texts.into_iter().map(Into::into).collect(),
            attachments: attachments.into_iter().map(Into::into).collect(),
        }
    }
}

/// Request body for posting a message.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateMessageRequest {
    /// Target channel, by internal or external id.
    #[serde(alias = "channel_id")]
    pub channel: EntityRef,
    #[schema(example = "Hi. I am looking into buying a floptical drive.")]
    pub body: String,
    #[serde(default)]
    pub attachment: Option<String>,
}

/// Request body for editing a message. At least one field is required.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateMessageRequest {
    /// Appended as a new body version.
    #[serde(default)]
    pub body: Option<String>,
    /// Replaces the current attachments.
    #[serde(default)]
    pub attachment: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct VoteRequest {
    pub vote: VoteDirection,
}

pub fn validate_body(body: &str) -> Result<(), AppError> {
    validate_len("Message body", body, 1, BODY_MAX)
}

pub fn validate_attachment(attachment: &str) -> Result<(), AppError> {
    if attachment.chars().count() > ATTACHMENT_MAX {
        return Err(AppError::Validation(format!(
            "Attachment reference must be at most {ATTACHMENT_MAX} characters"
        )));
    }
    Ok(())
}

pub fn validate_create_message(payload: &CreateMessageRequest) -> Result<(), AppError> {
    validate_body(&payload.body)?;
    if let Some(attachment) = &payload.attachment {
        validate_attachment(attachment)?;
    }
    Ok(())
}

pub fn validate_update_message(payload: &UpdateMessageRequest) -> Result<(), AppError> {
    if payload.body.is_none() && payload.attachment.is_none() {
        return Err(AppError::Validation(
            "Either body or attachment must be provided".into(),
        ));
    }
    if let Some(body) = &payload.body {
        validate_body(body)?;
    }
    if let Some(attachment) = &payload.attachment {
        validate_attachment(attachment)?;
    }
    Ok(())
}
