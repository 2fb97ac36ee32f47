use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::entity::user;
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::services::user::UserService;
use crate::state::AppState;
use crate::utils::hash;

/// A freshly issued session.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: user::Model,
}

/// Credential verification, token issuance and token resolution.
pub struct SessionService<'a> {
    state: &'a AppState,
    cancel: &'a CancellationToken,
}

fn principal_of(user: &user::Model) -> AuthUser {
    AuthUser {
        email: user.email.clone(),
        user_id: user.uuid,
        roles: vec![user.role.clone()],
    }
}

impl<'a> SessionService<'a> {
    pub fn new(state: &'a AppState, cancel: &'a CancellationToken) -> Self {
        Self { state, cancel }
    }

    /// Verify `email`/`password` and issue a token. Only confirmed accounts
    /// may log in.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let user = match UserService::new(&self.state.db, self.cancel)
            .get_by_email(email)
            .await
        {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Err(AppError::InvalidCredentials),
            Err(e) => return Err(e),
        };

        let is_valid = hash::verify_password(password, &user.password)
            .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;
        if !is_valid {
            return Err(AppError::InvalidCredentials);
        }
        if !user.state.can_login() {
            return Err(AppError::PermissionDenied);
        }

        let (token, expires_at) = self
            .state
            .jwt
            .sign(&user.email)
            .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))?;

        let ttl = self
            .state
            .jwt
            .lifetime()
            .to_std()
            .unwrap_or(Duration::ZERO);
        if let Err(e) = self
            .state
            .sessions
            .put(&token, principal_of(&user), ttl)
            .await
        {
            warn!("Session cache write failed: {e}");
        }

        Ok(Session {
            token,
            expires_at,
            user,
        })
    }

    /// Resolve a bearer token to its principal: cache first, then signature
    /// check and user directory.
    pub async fn validate(&self, token: &str) -> Result<AuthUser, AppError> {
        match self.state.sessions.get(token).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(e) => warn!("Session cache read failed, falling back to store: {e}"),
        }

        let claims = self.state.jwt.verify(token).map_err(|e| {
            debug!("Token rejected: {e}");
            AppError::TokenInvalid
        })?;

        let user = match UserService::new(&self.state.db, self.cancel)
            .get_by_email(&claims.email_addr)
            .await
        {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => return Err(AppError::TokenInvalid),
            Err(e) => return Err(e),
        };
        if !user.state.keeps_session() {
            return Err(AppError::TokenInvalid);
        }

        let principal = principal_of(&user);
        let remaining = claims.exp - Utc::now().timestamp();
        if remaining > 0 {
            let ttl = Duration::from_secs(remaining as u64);
            if let Err(e) = self.state.sessions.put(token, principal.clone(), ttl).await {
                warn!("Session cache write failed: {e}");
            }
        }
        Ok(principal)
    }

    /// Drop cached sessions of `email` after its account changed.
    pub async fn evict(&self, email: &str) {
        match self.state.sessions.evict_email(email).await {
            Ok(n) if n > 0 => debug!(evicted = n, "Evicted cached sessions"),
            Ok(_) => {}
            Err(e) => warn!("Session cache eviction failed: {e}"),
        }
    }
}
