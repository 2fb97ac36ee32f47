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
use crate::models::message::*;
use crate::models::shared::{EntityRef, ListParams, Page};
use crate::services::message::MessageService;
use crate::services::user::UserService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/messages",
    tag = "Messages",
    operation_id = "listMessages",
    summary = "List messages",
    description = "Active messages across all channels, newest first, cursor-paginated.",
    params(ListParams),
    responses(
        (status = 200, description = "A page of messages", body = Page<MessageResponse>),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Malformed cursor (1003)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, params))]
pub async fn list_messages(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<Page<MessageResponse>>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let (items, next_cursor) = MessageService::new(&state.db, &ctx.cancel)
        .list(None, params.limit(&state.config.db), params.cursor())
        .await?;
    Ok(Json(Page { items, next_cursor }))
}

#[utoipa::path(
    post,
    path = "/messages",
    tag = "Messages",
    operation_id = "createMessage",
    summary = "Post a message",
    description = "Posts a reply into a channel and bumps the channel's message count.",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message created", body = MessageResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 403, description = "Forbidden (1004)", body = ErrorBody),
        (status = 404, description = "Channel not found (1005)", body = ErrorBody),
        (status = 409, description = "Concurrent update, retry (1006)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, payload), fields(channel = %payload.channel))]
pub async fn create_message(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Create)?;
    validate_create_message(&payload)?;

    let user_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;
    let message = MessageService::new(&state.db, &ctx.cancel)
        .create(
            &payload.channel,
            &payload.body,
            payload.attachment.as_deref(),
            user_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/messages/{id}",
    tag = "Messages",
    operation_id = "getMessage",
    summary = "Get a message",
    params(("id" = String, Path, description = "Internal or external message id")),
    responses(
        (status = 200, description = "Message with texts and attachments", body = MessageResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "Message not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn get_message(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let message = MessageService::new(&state.db, &ctx.cancel)
        .get(&EntityRef::from_path(&id))
        .await?;
    Ok(Json(message))
}

#[utoipa::path(
    put,
    path = "/messages/{id}",
    tag = "Messages",
    operation_id = "updateMessage",
    summary = "Edit a message",
    description = "A new `body` is appended as a text version and becomes the displayed body. A new `attachment` replaces the current ones; an empty string removes them.",
    params(("id" = String, Path, description = "Internal or external message id")),
    request_body = UpdateMessageRequest,
    responses(
        (status = 200, description = "Message updated", body = MessageResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 403, description = "Not the author (1004)", body = ErrorBody),
        (status = 404, description = "Message not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, payload))]
pub async fn update_message(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateMessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Update)?;
    validate_update_message(&payload)?;

    let target = EntityRef::from_path(&id);
    let user_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;
    let messages = MessageService::new(&state.db, &ctx.cancel);
    let current = messages.get_model(&target).await?;
    require_owner_or_staff(&auth_user, user_id, current.user_id)?;

    let message = messages
        .update(
            &target,
            payload.body.as_deref(),
            payload.attachment.as_deref(),
            user_id,
        )
        .await?;
    Ok(Json(message))
}

#[utoipa::path(
    delete,
    path = "/messages/{id}",
    tag = "Messages",
    operation_id = "deleteMessage",
    summary = "Soft-delete a message",
    params(("id" = String, Path, description = "Internal or external message id")),
    responses(
        (status = 204, description = "Message deleted"),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 403, description = "Forbidden (1004)", body = ErrorBody),
        (status = 404, description = "Message not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn delete_message(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Delete)?;
    MessageService::new(&state.db, &ctx.cancel)
        .delete(&EntityRef::from_path(&id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/messages/{id}/like",
    tag = "Messages",
    operation_id = "likeMessage",
    summary = "Like a message",
    params(("id" = String, Path, description = "Internal or external message id")),
    responses(
        (status = 200, description = "Like recorded", body = MessageResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "Message not found (1005)", body = ErrorBody),
        (status = 409, description = "Already liked (1006)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn like_message(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::React)?;
    let user_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;
    let message = MessageService::new(&state.db, &ctx.cancel)
        .like(&EntityRef::from_path(&id), user_id)
        .await?;
    Ok(Json(message))
}

#[utoipa::path(
    post,
    path = "/messages/{id}/vote",
    tag = "Messages",
    operation_id = "voteMessage",
    summary = "Vote on a message",
    params(("id" = String, Path, description = "Internal or external message id")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = MessageResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 404, description = "Message not found (1005)", body = ErrorBody),
        (status = 409, description = "Already voted (1006)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, payload), fields(vote = ?payload.vote))]
pub async fn vote_message(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<VoteRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::React)?;
    let user_id = UserService::new(&state.db, &ctx.cancel)
        .internal_id(&auth_user)
        .await?;
    let message = MessageService::new(&state.db, &ctx.cancel)
        .vote(&EntityRef::from_path(&id), user_id, payload.vote)
        .await?;
    Ok(Json(message))
}
