use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::instrument;

use crate::authz::{Op, require_owner_or_staff};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::context::RequestContext;
use crate::extractors::json::AppJson;
use crate::extractors::query::AppQuery;
use crate::models::channel::ChannelResponse;
use crate::models::shared::{EntityRef, ListParams, Page};
use crate::models::workspace::*;
use crate::services::user::UserService;
use crate::services::workspace::WorkspaceService;
use crate::state::AppState;

fn responses(rows: Vec<crate::entity::workspace::Model>) -> Vec<WorkspaceResponse> {
    rows.into_iter().map(WorkspaceResponse::from).collect()
}

#[utoipa::path(
    get,
    path = "/workspaces",
    tag = "Workspaces",
    operation_id = "listWorkspaces",
    summary = "List workspaces",
    description = "Active workspaces, newest first. Pass `next_cursor` back as `cursor` for the next page; `\"0\"` means there is none.",
    params(ListParams),
    responses(
        (status = 200, description = "A page of workspaces", body = Page<WorkspaceResponse>),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Malformed cursor (1003)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, params))]
pub async fn list_workspaces(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<Page<WorkspaceResponse>>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let (rows, next_cursor) = WorkspaceService::new(&state.db, &ctx.cancel)
        .list(params.limit(&state.config.db), params.cursor())
        .await?;
    Ok(Json(Page {
        items: responses(rows),
        next_cursor,
    }))
}

#[utoipa::path(
    post,
    path = "/workspaces",
    tag = "Workspaces",
    operation_id = "createWorkspace",
    summary = "Create a top-level workspace",
    request_body = CreateWorkspaceRequest,
    responses(
        (status = 201, description = "Workspace created", body = WorkspaceResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 403, description = "Forbidden (1004)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, payload), fields(name = %payload.name))]
pub async fn create_workspace(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateWorkspaceRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Create)?;
    validate_workspace_fields(&payload.name, &payload.description)?;

    let owner_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;
    let ws = WorkspaceService::new(&state.db, &ctx.cancel)
        .create_root(&payload.name, &payload.description, owner_id)
        .await?;

    Ok((StatusCode::CREATED, Json(WorkspaceResponse::from(ws))))
}

#[utoipa::path(
    post,
    path = "/workspaces/chdcreate",
    tag = "Workspaces",
    operation_id = "createChildWorkspace",
    summary = "Create a child workspace",
    description = "Creates a workspace one level below `parent_id` and returns it with the updated parent.",
    request_body = CreateChildRequest,
    responses(
        (status = 201, description = "Child created", body = CreateChildResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 404, description = "Parent not found (1005)", body = ErrorBody),
        (status = 409, description = "Concurrent update, retry (1006)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, payload), fields(parent = %payload.parent_id, name = %payload.name))]
pub async fn create_child(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateChildRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Create)?;
    validate_workspace_fields(&payload.name, &payload.description)?;

    let owner_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;
    let (child, parent) = WorkspaceService::new(&state.db, &ctx.cancel)
        .create_child(
            &payload.parent_id,
            &payload.name,
            &payload.description,
            owner_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateChildResponse {
            workspace: child.into(),
            parent: parent.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/workspaces/topworkspaces",
    tag = "Workspaces",
    operation_id = "listTopWorkspaces",
    summary = "List top-level workspaces",
    responses(
        (status = 200, description = "Top-level workspaces", body = Vec<WorkspaceResponse>),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn list_top_level(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkspaceResponse>>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let rows = WorkspaceService::new(&state.db, &ctx.cancel)
        .list_top_level()
        .await?;
    Ok(Json(responses(rows)))
}

#[utoipa::path(
    get,
    path = "/workspaces/{id}",
    tag = "Workspaces",
    operation_id = "getWorkspace",
    summary = "Get a workspace",
    params(("id" = String, Path, description = "Internal or external workspace id")),
    responses(
        (status = 200, description = "Workspace", body = WorkspaceResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "Workspace not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn get_workspace(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let ws = WorkspaceService::new(&state.db, &ctx.cancel)
        .get(&EntityRef::from_path(&id))
        .await?;
    Ok(Json(ws.into()))
}

#[utoipa::path(
    get,
    path = "/workspaces/{id}/chdn",
    tag = "Workspaces",
    operation_id = "listChildWorkspaces",
    summary = "List the children of a workspace",
    params(("id" = String, Path, description = "Internal or external workspace id")),
    responses(
        (status = 200, description = "Child workspaces in creation order", body = Vec<WorkspaceResponse>),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "Workspace not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn list_children(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WorkspaceResponse>>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let rows = WorkspaceService::new(&state.db, &ctx.cancel)
        .list_children(&EntityRef::from_path(&id))
        .await?;
    Ok(Json(responses(rows)))
}

#[utoipa::path(
    get,
    path = "/workspaces/{id}/getparent",
    tag = "Workspaces",
    operation_id = "getParentWorkspace",
    summary = "Get the parent of a workspace",
    params(("id" = String, Path, description = "Internal or external workspace id")),
    responses(
        (status = 200, description = "Parent workspace", body = WorkspaceResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "Workspace not found or top-level (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn get_parent(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let ws = WorkspaceService::new(&state.db, &ctx.cancel)
        .get_parent(&EntityRef::from_path(&id))
        .await?;
    Ok(Json(ws.into()))
}

#[utoipa::path(
    get,
    path = "/workspaces/{id}/channels",
    tag = "Workspaces",
    operation_id = "getWorkspaceWithChannels",
    summary = "Get a workspace with its channels",
    params(("id" = String, Path, description = "Internal or external workspace id")),
    responses(
        (status = 200, description = "Workspace and its active channels", body = WorkspaceWithChannels),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "Workspace not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn get_with_channels(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceWithChannels>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let (ws, channels) = WorkspaceService::new(&state.db, &ctx.cancel)
        .get_with_channels(&EntityRef::from_path(&id))
        .await?;
    Ok(Json(WorkspaceWithChannels {
        workspace: ws.into(),
        channels: channels.into_iter().map(ChannelResponse::from).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/workspaces/{id}",
    tag = "Workspaces",
    operation_id = "updateWorkspace",
    summary = "Rename or redescribe a workspace",
    params(("id" = String, Path, description = "Internal or external workspace id")),
    request_body = UpdateWorkspaceRequest,
    responses(
        (status = 200, description = "Workspace updated", body = WorkspaceResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 403, description = "Not the owner (1004)", body = ErrorBody),
        (status = 404, description = "Workspace not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, payload))]
pub async fn update_workspace(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateWorkspaceRequest>,
) -> Result<Json<WorkspaceResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Update)?;
    validate_workspace_fields(&payload.name, &payload.description)?;

    let target = EntityRef::from_path(&id);
    let caller_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;
    let workspaces = WorkspaceService::new(&state.db, &ctx.cancel);
    let current = workspaces.get(&target).await?;
    require_owner_or_staff(&auth_user, caller_id, current.user_id)?;

    let ws = workspaces
        .update(&target, &payload.name, &payload.description)
        .await?;
    Ok(Json(ws.into()))
}

#[utoipa::path(
    delete,
    path = "/workspaces/{id}",
    tag = "Workspaces",
    operation_id = "deleteWorkspace",
    summary = "Soft-delete a workspace",
    params(("id" = String, Path, description = "Internal or external workspace id")),
    responses(
        (status = 204, description = "Workspace deleted"),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 403, description = "Forbidden (1004)", body = ErrorBody),
        (status = 404, description = "Workspace not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn delete_workspace(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Delete)?;
    WorkspaceService::new(&state.db, &ctx.cancel)
        .delete(&EntityRef::from_path(&id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/workspaces/{id}/recount",
    tag = "Workspaces",
    operation_id = "recountChildWorkspaces",
    summary = "Recompute the child count of a workspace",
    description = "Sets `num_chd` to the number of active child edges.",
    params(("id" = String, Path, description = "Internal or external workspace id")),
    responses(
        (status = 200, description = "Workspace with recomputed count", body = WorkspaceResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 403, description = "Forbidden (1004)", body = ErrorBody),
        (status = 404, description = "Workspace not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn recount_children(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Delete)?;
    let ws = WorkspaceService::new(&state.db, &ctx.cancel)
        .recount_children(&EntityRef::from_path(&id))
        .await?;
    Ok(Json(ws.into()))
}
