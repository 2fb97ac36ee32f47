use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{CursorError, IdError};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Structured error response returned by all endpoints on failure.
#[derive(Clone, Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `1000` unknown route, `1001`
    /// unauthenticated, `1002` cancelled, `1003` bad input, `1004` forbidden,
    /// `1005` not found, `1006` conflict, `1007` internal, `1008` invalid
    /// credentials.
    #[schema(example = "1003")]
    pub error_code: String,
    /// Human-readable error description.
    #[schema(example = "Channel name must be 1-50 characters")]
    pub error_msg: String,
    /// Numeric site identifier of the failure, or the error code when the
    /// failure did not originate in the store.
    #[schema(example = 3104)]
    pub status: u32,
    /// Identifier of the request that produced this error.
    pub request_id: String,
}

pub const CODE_UNKNOWN_ROUTE: u32 = 1000;
pub const CODE_UNAUTHENTICATED: u32 = 1001;
pub const CODE_CANCELLED: u32 = 1002;
pub const CODE_BAD_INPUT: u32 = 1003;
pub const CODE_FORBIDDEN: u32 = 1004;
pub const CODE_NOT_FOUND: u32 = 1005;
pub const CODE_CONFLICT: u32 = 1006;
pub const CODE_INTERNAL: u32 = 1007;
pub const CODE_INVALID_CREDENTIALS: u32 = 1008;

/// Status used for cancelled requests ("client closed the connection").
pub const STATUS_CANCELLED: StatusCode = StatusCode::PAYMENT_REQUIRED;
/// Status used for validation failures.
pub const STATUS_BAD_INPUT: StatusCode = StatusCode::PAYMENT_REQUIRED;

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    InvalidCredentials,
    PermissionDenied,
    NotFound(String),
    Conflict(String),
    Cancelled,
    UnknownRoute,
    /// A store failure tagged with the call site that produced it.
    Store {
        msgnum: u32,
        source: StoreError,
    },
    Internal(String),
}

impl AppError {
    /// Error code this failure is reported under.
    pub fn code(&self) -> u32 {
        match self {
            AppError::Validation(_) => CODE_BAD_INPUT,
            AppError::TokenMissing | AppError::TokenInvalid => CODE_UNAUTHENTICATED,
            AppError::InvalidCredentials => CODE_INVALID_CREDENTIALS,
            AppError::PermissionDenied => CODE_FORBIDDEN,
            AppError::NotFound(_) => CODE_NOT_FOUND,
            AppError::Conflict(_) => CODE_CONFLICT,
            AppError::Cancelled => CODE_CANCELLED,
            AppError::UnknownRoute => CODE_UNKNOWN_ROUTE,
            AppError::Store { source, .. } => match source {
                StoreError::NotFound => CODE_NOT_FOUND,
                StoreError::Conflict(_) | StoreError::Busy(_) | StoreError::Integrity(_) => {
                    CODE_CONFLICT
                }
                StoreError::Cancelled => CODE_CANCELLED,
                StoreError::Other(_) => CODE_INTERNAL,
            },
            AppError::Internal(_) => CODE_INTERNAL,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.code() == CODE_CANCELLED
    }

    fn status_code(code: u32) -> StatusCode {
        match code {
            CODE_UNKNOWN_ROUTE => StatusCode::BAD_REQUEST,
            CODE_UNAUTHENTICATED | CODE_INVALID_CREDENTIALS => StatusCode::UNAUTHORIZED,
            CODE_CANCELLED => STATUS_CANCELLED,
            CODE_BAD_INPUT => STATUS_BAD_INPUT,
            CODE_FORBIDDEN => StatusCode::FORBIDDEN,
            CODE_NOT_FOUND => StatusCode::NOT_FOUND,
            CODE_CONFLICT => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let code = self.code();
        let (status, message) = match self {
            AppError::Validation(msg) => (code, msg),
            AppError::TokenMissing => (code, "Authentication required".into()),
            AppError::TokenInvalid => (code, "Invalid or expired token".into()),
            AppError::InvalidCredentials => (code, "Invalid email or password".into()),
            AppError::PermissionDenied => (code, "Insufficient permissions".into()),
            AppError::NotFound(msg) => (code, msg),
            AppError::Conflict(msg) => (code, msg),
            AppError::Cancelled => (code, "Request cancelled".into()),
            AppError::UnknownRoute => (code, "Unknown route".into()),
            AppError::Store { msgnum, source } => {
                let message = match &source {
                    StoreError::NotFound => "Not found".to_string(),
                    StoreError::Conflict(_) | StoreError::Busy(_) => {
                        "Concurrent update, please retry".to_string()
                    }
                    StoreError::Integrity(_) => "Conflicting record exists".to_string(),
                    StoreError::Cancelled => "Request cancelled".to_string(),
                    StoreError::Other(err) => {
                        tracing::error!(msgnum, error = %err, "Store error");
                        "An unexpected error occurred".to_string()
                    }
                };
                if source.is_retryable() {
                    tracing::warn!(msgnum, error = %source, "Retryable store failure");
                }
                (msgnum, message)
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (code, "An unexpected error occurred".into())
            }
        };
        (
            Self::status_code(code),
            ErrorBody {
                error_code: code.to_string(),
                error_msg: message,
                status,
                request_id: String::new(),
            },
        )
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "bad input: {msg}"),
            AppError::TokenMissing => f.write_str("token missing"),
            AppError::TokenInvalid => f.write_str("token invalid"),
            AppError::InvalidCredentials => f.write_str("invalid credentials"),
            AppError::PermissionDenied => f.write_str("permission denied"),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::Conflict(msg) => write!(f, "conflict: {msg}"),
            AppError::Cancelled => f.write_str("cancelled"),
            AppError::UnknownRoute => f.write_str("unknown route"),
            AppError::Store { msgnum, source } => write!(f, "[{msgnum}] {source}"),
            AppError::Internal(detail) => write!(f, "internal: {detail}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        // The request-context middleware stamps the request id from this copy.
        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(body);
        response
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<IdError> for AppError {
    fn from(err: IdError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<CursorError> for AppError {
    fn from(err: CursorError) -> Self {
        AppError::Validation(err.to_string())
    }
}
