use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Duration;
use tracing::instrument;

use crate::authz::Op;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::context::RequestContext;
use crate::extractors::json::AppJson;
use crate::models::auth::*;
use crate::models::shared::EntityRef;
use crate::services::session::SessionService;
use crate::services::user::UserService;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/users/register",
    tag = "Users",
    operation_id = "register",
    summary = "Register a new account",
    description = "Creates an unconfirmed account with the default role and mails a confirmation token to the address.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 402, description = "Invalid email or password (1003)", body = ErrorBody),
        (status = 409, description = "Email already registered (1006)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, ctx, payload), fields(email = %payload.email))]
pub async fn register(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_register_request(&payload)?;
    let email = normalize_email(&payload.email);

    let user = UserService::new(&state.db, &ctx.cancel)
        .register(
            state.mailer.as_ref(),
            &email,
            &payload.password,
            &state.config.roles.default_role,
            Duration::minutes(state.config.user.confirm_token_duration),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[utoipa::path(
    post,
    path = "/users/login",
    tag = "Users",
    operation_id = "login",
    summary = "Log in with email and password",
    description = "Verifies the credentials of a confirmed account and returns a bearer token.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials (1008)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 403, description = "Account not confirmed (1004)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, ctx, payload), fields(email = %payload.email))]
pub async fn login(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&payload)?;
    let email = normalize_email(&payload.email);

    let session = SessionService::new(&state, &ctx.cancel)
        .login(&email, &payload.password)
        .await?;

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
        user: UserResponse::from(session.user),
    }))
}

#[utoipa::path(
    post,
    path = "/users/confirm",
    tag = "Users",
    operation_id = "confirmEmail",
    summary = "Redeem an email confirmation token",
    description = "Completes a registration or a pending email change.",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Email confirmed", body = UserResponse),
        (status = 402, description = "Token invalid or expired (1003)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn confirm(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<TokenRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let confirmation = UserService::new(&state.db, &ctx.cancel)
        .confirm(payload.token.trim())
        .await?;

    if let Some(previous) = &confirmation.previous_email {
        SessionService::new(&state, &ctx.cancel).evict(previous).await;
    }
    Ok(Json(UserResponse::from(confirmation.user)))
}

#[utoipa::path(
    post,
    path = "/users/forgot-password",
    tag = "Users",
    operation_id = "forgotPassword",
    summary = "Request a password reset token",
    description = "Mails a single-use reset token. The response is the same whether or not the address is registered.",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Request accepted"),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, ctx, payload), fields(email = %payload.email))]
pub async fn forgot_password(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<StatusCode, AppError> {
    validate_email(&payload.email)?;
    let email = normalize_email(&payload.email);

    UserService::new(&state.db, &ctx.cancel)
        .forgot_password(
            state.mailer.as_ref(),
            &email,
            Duration::minutes(state.config.user.reset_token_duration),
        )
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    post,
    path = "/users/reset-password",
    tag = "Users",
    operation_id = "resetPassword",
    summary = "Set a new password with a reset token",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = UserResponse),
        (status = 402, description = "Token invalid or expired, or weak password (1003)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn reset_password(
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_password(&payload.password)?;

    let user = UserService::new(&state.db, &ctx.cancel)
        .reset_password(payload.token.trim(), &payload.password)
        .await?;

    SessionService::new(&state, &ctx.cancel)
        .evict(&user.email)
        .await;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/users/change-email",
    tag = "Users",
    operation_id = "changeEmail",
    summary = "Start an email change",
    description = "Mails a confirmation token to the new address. The change completes when the token is redeemed at `/users/confirm`.",
    request_body = ChangeEmailRequest,
    responses(
        (status = 200, description = "Confirmation sent", body = UserResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 402, description = "Validation error (1003)", body = ErrorBody),
        (status = 409, description = "Email already registered (1006)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user, payload), fields(email = %auth_user.email))]
pub async fn change_email(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ChangeEmailRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_email(&payload.new_email)?;
    let new_email = normalize_email(&payload.new_email);

    let users = UserService::new(&state.db, &ctx.cancel);
    let user_id = users.internal_id(&auth_user).await?;
    let user = users
        .change_email(
            state.mailer.as_ref(),
            user_id,
            &new_email,
            Duration::minutes(state.config.user.confirm_token_duration),
        )
        .await?;
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    operation_id = "getCurrentUser",
    summary = "Get the current user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user), fields(email = %auth_user.email))]
pub async fn me(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, AppError> {
    let user = match UserService::new(&state.db, &ctx.cancel)
        .get_by_uuid(auth_user.user_id)
        .await
    {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(AppError::TokenInvalid),
        Err(e) => return Err(e),
    };
    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    delete,
    path = "/users/me",
    tag = "Users",
    operation_id = "deactivateCurrentUser",
    summary = "Deactivate the current account",
    description = "Soft-deactivates the caller's account and drops its cached sessions.",
    responses(
        (status = 204, description = "Account deactivated"),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user), fields(email = %auth_user.email))]
pub async fn deactivate(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let users = UserService::new(&state.db, &ctx.cancel);
    let user_id = users.internal_id(&auth_user).await?;
    users.deactivate(user_id).await?;

    SessionService::new(&state, &ctx.cancel)
        .evict(&auth_user.email)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    operation_id = "getUser",
    summary = "Get a user by id",
    params(("id" = String, Path, description = "Internal or external user id")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "Unauthenticated (1001)", body = ErrorBody),
        (status = 404, description = "User not found (1005)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, ctx, auth_user))]
pub async fn get_user(
    auth_user: AuthUser,
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    state.policy.authorize(Some(&auth_user), Op::Read)?;
    let user = UserService::new(&state.db, &ctx.cancel)
        .get_by_ref(&EntityRef::from_path(&id))
        .await?;
    Ok(Json(UserResponse::from(user)))
}
