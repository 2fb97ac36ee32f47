use chrono::{DateTime, Utc};
use common::Status;
use serde::{Deserialize, Serialize};

use crate::entity::{channel, channels_user};
use crate::error::AppError;
use crate::models::message::MessageResponse;
use crate::models::shared::{EntityRef, validate_len};

pub const NAME_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 1000;
pub const MAX_TAGS: usize = 10;
pub const TAG_MAX: usize = 50;

/// A channel as returned by the API.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChannelResponse {
    #[schema(example = 5)]
    pub id: i64,
    #[schema(example = "67e55044-10b1-426f-9247-bb680e5fe0c8")]
    pub uuid: String,
    #[schema(example = "Floptical Question")]
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub num_tags: i32,
    pub num_views: i64,
    pub num_messages: i64,
    pub workspace_id: i64,
    pub user_id: i64,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present only when the channel was loaded with its messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessageResponse>>,
}

pub fn tags_of(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default()
}

impl From<channel::Model> for ChannelResponse {
    fn from(c: channel::Model) -> Self {
        Self {
            id: c.id,
            uuid: common::ids::encode(&c.uuid),
            name: c.name,
            description: c.description,
            tags: tags_of(&c.tags),
            num_tags: c.num_tags,
            num_views: c.num_views,
            num_messages: c.num_messages,
            workspace_id: c.workspace_id,
            user_id: c.user_id,
            status: c.status,
            created_at: c.created_at,
            updated_at: c.updated_at,
            messages: None,
        }
    }
}

/// The caller's read state of a channel.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ReadState {
    pub num_views: i64,
    /// Channel message count observed on the last view.
    pub num_messages: i64,
}

impl From<channels_user::Model> for ReadState {
    fn from(row: channels_user::Model) -> Self {
        Self {
            num_views: row.num_views,
            num_messages: row.num_messages,
        }
    }
}

/// Response of `showChannel`.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct ShowChannelResponse {
    #[serde(flatten)]
    pub channel: ChannelResponse,
    /// `None` when the read-state update did not go through.
    pub read_state: Option<ReadState>,
}

/// Request body for creating a channel.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateChannelRequest {
    /// Owning workspace, by internal or external id.
    #[serde(alias = "workspace_id")]
    pub workspace: EntityRef,
    #[schema(example = "Floptical Question")]
    pub name: String,
    #[serde(alias = "desc")]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Body of the first message, posted in the same transaction.
    #[serde(default, alias = "body")]
    pub initial_message: Option<String>,
    /// Attachment reference for the first message.
    #[serde(default)]
    pub attachment: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateChannelRequest {
    pub name: String,
    #[serde(alias = "desc")]
    pub description: String,
    /// Replaces the tag list when present.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Query for looking a channel up by name inside a workspace.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ByNameParams {
    /// Workspace internal or external id.
    pub workspace: String,
    pub name: String,
}

pub fn validate_channel_fields(name: &str, description: &str) -> Result<(), AppError> {
    validate_len("Channel name", name, 1, NAME_MAX)?;
    validate_len("Channel description", description, 1, DESCRIPTION_MAX)
}

pub fn validate_tags(tags: &[String]) -> Result<(), AppError> {
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!(
            "At most {MAX_TAGS} tags are allowed"
        )));
    }
    for tag in tags {
        validate_len("Tag", tag, 1, TAG_MAX)?;
    }
    Ok(())
}

pub fn validate_create_channel(payload: &CreateChannelRequest) -> Result<(), AppError> {
    validate_channel_fields(&payload.name, &payload.description)?;
    validate_tags(&payload.tags)?;
    if let Some(body) = &payload.initial_message {
        crate::models::message::validate_body(body)?;
    }
    Ok(())
}
