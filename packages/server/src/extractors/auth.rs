use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::context::RequestContext;
use crate::services::session::SessionService;
use crate::state::AppState;

/// Authenticated principal extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication. Every route
/// except registration and the token exchanges takes one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub email: String,
    /// External id of the user.
    pub user_id: Uuid,
    pub roles: Vec<String>,
}

/// Split `<scheme> <token>`: the scheme must be `bearer` in any case,
/// followed by exactly one space and a non-empty token.
pub fn parse_bearer(header: &str) -> Result<&str, AppError> {
    let (scheme, token) = header.split_once(' ').ok_or(AppError::TokenInvalid)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::TokenInvalid);
    }
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AppError::TokenInvalid);
    }
    Ok(token)
}

async fn resolve(parts: &mut Parts, state: &AppState, header: &str) -> Result<AuthUser, AppError> {
    let token = parse_bearer(header)?;
    let ctx = <RequestContext as FromRequestParts<AppState>>::from_request_parts(parts, state)
        .await
        .unwrap_or_else(|never| match never {});
    SessionService::new(state, &ctx.cancel).validate(token).await
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AppError::TokenMissing)?
            .to_str()
            .map_err(|_| AppError::TokenInvalid)?
            .to_owned();
        resolve(parts, state, &header).await
    }
}
