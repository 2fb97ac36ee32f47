use chrono::{DateTime, Utc};
use common::Status;
use serde::{Deserialize, Serialize};

use crate::entity::workspace;
use crate::error::AppError;
use crate::models::channel::ChannelResponse;
use crate::models::shared::{EntityRef, validate_len};

pub const NAME_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 1000;

/// A workspace as returned by the API.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WorkspaceResponse {
    /// Internal id; usable as a cursor anchor and as `parent_id`.
    #[schema(example = 17)]
    pub id: i64,
    /// External id.
    #[schema(example = "67e55044-10b1-426f-9247-bb680e5fe0c8")]
    pub uuid: String,
    #[schema(example = "Drive")]
    pub name: String,
    pub description: String,
    pub num_views: i64,
    pub num_channels: i64,
    pub level: i32,
    /// Internal id of the parent, `0` for a root.
    pub parent_id: i64,
    pub num_chd: i64,
    pub user_id: i64,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<workspace::Model> for WorkspaceResponse {
    fn from(w: workspace::Model) -> Self {
        Self {
            id: w.id,
            uuid: common::ids::encode(&w.uuid),
            name: w.name,
            description: w.description,
            num_views: w.num_views,
            num_channels: w.num_channels,
            level: w.level,
            parent_id: w.parent_id,
            num_chd: w.num_chd,
            user_id: w.user_id,
            status: w.status,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

/// Request body for creating a root workspace.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateWorkspaceRequest {
    #[schema(example = "Drive")]
    pub name: String,
    #[serde(alias = "desc")]
    #[schema(example = "Drive")]
    pub description: String,
}

/// Request body for creating a child workspace.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateChildRequest {
    /// Parent workspace, by internal or external id.
    pub parent_id: EntityRef,
    #[schema(example = "Floppy")]
    pub name: String,
    #[serde(alias = "desc")]
    #[schema(example = "Floppy")]
    pub description: String,
}

/// Response of a child creation: the new child and its reloaded parent.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreateChildResponse {
    pub workspace: WorkspaceResponse,
    pub parent: WorkspaceResponse,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateWorkspaceRequest {
    pub name: String,
    #[serde(alias = "desc")]
    pub description: String,
}

/// A workspace with its active channels.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct WorkspaceWithChannels {
    pub workspace: WorkspaceResponse,
    pub channels: Vec<ChannelResponse>,
}

pub fn validate_workspace_fields(name: &str, description: &str) -> Result<(), AppError> {
    validate_len("Workspace name", name, 1, NAME_MAX)?;
    validate_len("Workspace description", description, 1, DESCRIPTION_MAX)
}
