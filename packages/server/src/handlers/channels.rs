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
use crate::models::channel::*;
use crate::models::message::MessageResponse;
use crate::models::shared::{EntityRef, ListParams, Page};
use crate::services::channel::{ChannelService, NewChannel};
use crate::services::user::UserService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/channels",
    tag = "Channels",
    operation_id = "listChannels",
    summary = "List channels",
    description = "Active channels, newest first, cursor-paginated.",
    params(ListParams),
    responses(
        (status = 200, description = "A page of channels", body = Page<ChannelResponse>),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Malformed cursor (1003)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, params))]
pub async fn list_channels(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<Page<ChannelResponse>>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let (rows, next_cursor) = ChannelService::new(&state.db, &ctx.cancel)
        .list(params.limit(&state.config.db), params.cursor())
        .await?;
    Ok(Json(Page {
        items: rows.into_iter().map(ChannelResponse::from).collect(),
        next_cursor,
    }))
}

#[utoipa::path(
    get,
    path = "/channels/byname",
    tag = "Channels",
    operation_id = "getChannelByName",
    summary = "Find a channel by name within a workspace",
    params(ByNameParams),
    responses(
        (status = 200, description = "Channel", body = ChannelResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "Workspace or channel not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, params), fields(workspace = %params.workspace, name = %params.name))]
pub async fn get_by_name(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ByNameParams>,
) -> Result<Json<ChannelResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let channel = ChannelService::new(&state.db, &ctx.cancel)
        .get_by_name(&EntityRef::from_path(&params.workspace), &params.name)
        .await?;
    Ok(Json(channel.into()))
}

#[utoipa::path(
    post,
    path = "/channels",
    tag = "Channels",
    operation_id = "createChannel",
    summary = "Create a channel",
    description = "Creates a channel in a workspace. When `initial_message` is given, the first message is posted in the same transaction.",
    request_body = CreateChannelRequest,
    responses(
        (status = 201, description = "Channel created", body = ChannelResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 403, description = "Forbidden (1004)", body = ErrorBody),
        (status = 404, description = "Workspace not found (1005)", body = ErrorBody),
        (status = 409, description = "Concurrent update, retry (1006)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, payload), fields(workspace = %payload.workspace, name = %payload.name))]
pub async fn create_channel(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateChannelRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Create)?;
    validate_create_channel(&payload)?;

    let owner_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;
    let channel = ChannelService::new(&state.db, &ctx.cancel)
        .create(
            NewChannel {
                workspace: &payload.workspace,
                name: &payload.name,
                description: &payload.description,
                tags: &payload.tags,
                initial_message: payload.initial_message.as_deref(),
                attachment: payload.attachment.as_deref(),
            },
            owner_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ChannelResponse::from(channel))))
}

#[utoipa::path(
    get,
    path = "/channels/{id}",
    tag = "Channels",
    operation_id = "showChannel",
    summary = "Show a channel with its messages",
    description = "Returns the channel and its active messages. The view is recorded and the caller's read state is returned; `read_state` is null when that update did not go through.",
    params(("id" = String, Path, description = "Internal or external channel id")),
    responses(
        (status = 200, description = "Channel with messages", body = ShowChannelResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "Channel not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn show_channel(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShowChannelResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let viewer_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;

    let (channel, messages, read_state) = ChannelService::new(&state.db, &ctx.cancel)
        .show(&EntityRef::from_path(&id), viewer_id)
        .await?;

    let mut channel = ChannelResponse::from(channel);
    channel.messages = Some(messages);
    Ok(Json(ShowChannelResponse {
        channel,
        read_state: read_state.map(ReadState::from),
    }))
}

#[utoipa::path(
    get,
    path = "/channels/{id}/messages",
    tag = "Channels",
    operation_id = "listChannelMessages",
    summary = "List the messages of a channel",
    params(
        ("id" = String, Path, description = "Internal or external channel id"),
        ListParams,
    ),
    responses(
        (status = 200, description = "A page of messages, newest first", body = Page<MessageResponse>),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "Channel not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, params))]
pub async fn list_messages(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<Page<MessageResponse>>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let (items, next_cursor) = ChannelService::new(&state.db, &ctx.cancel)
        .list_messages(
            &EntityRef::from_path(&id),
            params.limit(&state.config.db),
            params.cursor(),
        )
        .await?;
    Ok(Json(Page { items, next_cursor }))
}

#[utoipa::path(
    put,
    path = "/channels/{id}",
    tag = "Channels",
    operation_id = "updateChannel",
    summary = "Update a channel",
    params(("id" = String, Path, description = "Internal or external channel id")),
    request_body = UpdateChannelRequest,
    responses(
        (status = 200, description = "Channel updated", body = ChannelResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 403, description = "Not the owner (1004)", body = ErrorBody),
        (status = 404, description = "Channel not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, payload))]
pub async fn update_channel(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateChannelRequest>,
) -> Result<Json<ChannelResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Update)?;
    validate_channel_fields(&payload.name, &payload.description)?;
    if let Some(tags) = &payload.tags {
        validate_tags(tags)?;
    }

    let target = EntityRef::from_path(&id);
    let caller_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;
    let channels = ChannelService::new(&state.db, &ctx.cancel);
    let current = channels.get(&target).await?;
    require_owner_or_staff(&auth_user, caller_id, current.user_id)?;

    let channel = channels
        .update(
            &target,
            &payload.name,
            &payload.description,
            payload.tags.as_deref(),
        )
        .await?;
    Ok(Json(channel.into()))
}

#[utoipa::path(
    delete,
    path = "/channels/{id}",
    tag = "Channels",
    operation_id = "deleteChannel",
    summary = "Soft-delete a channel",
    params(("id" = String, Path, description = "Internal or external channel id")),
    responses(
        (status = 204, description = "Channel deleted"),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 403, description = "Forbidden (1004)", body = ErrorBody),
        (status = 404, description = "Channel not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn delete_channel(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Delete)?;
    ChannelService::new(&state.db, &ctx.cancel)
        .delete(&EntityRef::from_path(&id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
