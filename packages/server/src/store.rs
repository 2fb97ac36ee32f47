//! Persistence gateway: serializable transactions, cancellation-aware store
//! calls and classification of database failures.
//!
//! Every store future except the final commit goes through [`guard`], which
//! refuses to start once the request has been cancelled and abandons the call
//! if cancellation arrives while it is pending. Dropping an uncommitted [`DatabaseTransaction`] rolls
//! it back, so an abandoned write never leaves partial rows behind.

use std::future::Future;

use sea_orm::{
    AccessMode, DatabaseConnection, DatabaseTransaction, DbErr, IsolationLevel, RuntimeErr,
    SqlErr, TransactionTrait,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::AppError;

/// SQLSTATE for `serialization_failure`.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for `deadlock_detected`.
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for `lock_not_available`.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE for `too_many_connections`.
const TOO_MANY_CONNECTIONS: &str = "53300";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient: pool exhausted or lock unavailable. Safe to retry.
    #[error("store busy: {0}")]
    Busy(String),
    /// Serialization failure at commit. Safe to retry.
    #[error("serialization conflict: {0}")]
    Conflict(String),
    #[error("row not found")]
    NotFound,
    /// Unique or foreign-key violation.
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("store error: {0}")]
    Other(DbErr),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_) | Self::Conflict(_))
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        if let DbErr::RecordNotFound(_) = err {
            return Self::NotFound;
        }
        if let DbErr::ConnectionAcquire(ref e) = err {
            return Self::Busy(e.to_string());
        }
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg))
            | Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                return Self::Integrity(msg);
            }
            _ => {}
        }
        match sqlstate(&err).as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                Self::Conflict(err.to_string())
            }
            Some(LOCK_NOT_AVAILABLE) | Some(TOO_MANY_CONNECTIONS) => Self::Busy(err.to_string()),
            _ => Self::Other(err),
        }
    }
}

fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Exec(e) | DbErr::Query(e) | DbErr::Conn(e) => e,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(e) => e
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code.into_owned()),
        _ => None,
    }
}

/// Run one store call under the request's cancellation token.
pub async fn guard<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, DbErr>>,
{
    if cancel.is_cancelled() {
        return Err(StoreError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StoreError::Cancelled),
        res = fut => res.map_err(StoreError::from),
    }
}

/// Begin a read-write transaction at Serializable isolation.
pub async fn begin(
    db: &DatabaseConnection,
    cancel: &CancellationToken,
) -> Result<DatabaseTransaction, StoreError> {
    guard(
        cancel,
        db.begin_with_config(
            Some(IsolationLevel::Serializable),
            Some(AccessMode::ReadWrite),
        ),
    )
    .await
}

/// Commit on success, roll back on failure.
///
/// Cancellation is honoured up to the commit and not during it: once the
/// commit is sent its own outcome is reported, so a write that landed is
/// never answered with `Cancelled`. A rollback error is logged and the
/// original failure is returned unchanged. A failed commit surfaces as the
/// classified store error (usually `Conflict`), tagged with `msgnum`.
pub async fn finish<T>(
    txn: DatabaseTransaction,
    cancel: &CancellationToken,
    msgnum: u32,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    let result = match result {
        Ok(_) if cancel.is_cancelled() => Err(StoreError::Cancelled).at(msgnum),
        other => other,
    };
    match result {
        Ok(value) => {
            txn.commit().await.map_err(StoreError::from).at(msgnum)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rb) = txn.rollback().await {
                warn!(msgnum, error = %rb, "Rollback failed");
            }
            Err(err)
        }
    }
}

/// Tags a store failure with the numeric id of the call site.
pub trait StoreResultExt<T> {
    fn at(self, msgnum: u32) -> Result<T, AppError>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn at(self, msgnum: u32) -> Result<T, AppError> {
        self.map_err(|source| AppError::Store { msgnum, source })
    }
}
