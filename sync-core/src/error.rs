//! Error types and their HTTP representation.
//!
//! Mirrors the teacher crate's `DatabaseError`/`DatabaseOperation`/
//! `DatabaseErrorKind` triad and the top-level `Error` enum with an
//! `IntoResponse` impl, trimmed to the variants this service needs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

/// Which kind of store-gateway operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOperation {
    FetchNewActive,
    FetchRefired,
    FetchStatusChanged,
    FetchHeartbeatDue,
    FetchSilencesToClear,
    InsertSync,
    UpdateSyncSuccess,
    UpdateSyncError,
    AppendAudit,
    FetchStatistics,
    FetchConfig,
    FetchSyncRecord,
    ListSyncRecords,
    ListAuditLog,
    HealthCheck,
    PoolInit,
}

impl DatabaseOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchNewActive => "fetch_new_active",
            Self::FetchRefired => "fetch_refired",
            Self::FetchStatusChanged => "fetch_status_changed",
            Self::FetchHeartbeatDue => "fetch_heartbeat_due",
            Self::FetchSilencesToClear => "fetch_silences_to_clear",
            Self::InsertSync => "insert_sync",
            Self::UpdateSyncSuccess => "update_sync_success",
            Self::UpdateSyncError => "update_sync_error",
            Self::AppendAudit => "append_audit",
            Self::FetchStatistics => "fetch_statistics",
            Self::FetchConfig => "fetch_config",
            Self::FetchSyncRecord => "fetch_sync_record",
            Self::ListSyncRecords => "list_sync_records",
            Self::ListAuditLog => "list_audit_log",
            Self::HealthCheck => "health_check",
            Self::PoolInit => "pool_init",
        }
    }
}

/// Coarse classification of a database failure, used to decide retriability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    ConnectionFailed,
    PoolExhausted,
    Timeout,
    ConstraintViolation,
    NotFound,
    QueryFailed,
    TransactionFailed,
}

impl DatabaseErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed | Self::PoolExhausted | Self::Timeout
        )
    }
}

#[derive(Debug)]
pub struct DatabaseError {
    pub operation: DatabaseOperation,
    pub kind: DatabaseErrorKind,
    pub message: String,
    pub context: Vec<String>,
}

impl DatabaseError {
    pub fn new(operation: DatabaseOperation, kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn not_found(operation: DatabaseOperation, message: impl Into<String>) -> Self {
        Self::new(operation, DatabaseErrorKind::NotFound, message)
    }

    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }
}

impl std::fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed ({:?}): {}", self.operation.as_str(), self.kind, self.message)?;
        for ctx in &self.context {
            write!(f, " | {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DatabaseError {}

/// `sqlx::Error` carries no operation tag, so call sites build a
/// `DatabaseError` explicitly: `DatabaseError::new(op, kind_for(&err), err.to_string())`.
pub fn kind_for(err: &sqlx::Error) -> DatabaseErrorKind {
    match err {
        sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound,
        sqlx::Error::PoolTimedOut => DatabaseErrorKind::PoolExhausted,
        sqlx::Error::Io(_) => DatabaseErrorKind::ConnectionFailed,
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DatabaseErrorKind::ConstraintViolation
        }
        _ => DatabaseErrorKind::QueryFailed,
    }
}

/// Whether a backend HTTP failure should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFailureKind {
    Transient,
    Permanent,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("backend error ({kind:?}, status={status:?}): {message}")]
    Backend {
        kind: BackendFailureKind,
        status: Option<u16>,
        message: String,
    },

    #[error("mapper error: {0}")]
    Mapper(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn backend_transient(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Backend {
            kind: BackendFailureKind::Transient,
            status,
            message: message.into(),
        }
    }

    pub fn backend_permanent(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Backend {
            kind: BackendFailureKind::Permanent,
            status,
            message: message.into(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Database(db_err) => db_err.is_retriable(),
            Self::Backend { kind, .. } => *kind == BackendFailureKind::Transient,
            _ => false,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Backend { .. } => "BACKEND_ERROR",
            Self::Mapper(_) => "MAPPER_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Database(db_err) if db_err.kind == DatabaseErrorKind::NotFound => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Backend { kind: BackendFailureKind::Transient, .. } => StatusCode::BAD_GATEWAY,
            Self::Backend { kind: BackendFailureKind::Permanent, .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Mapper(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub status: u16,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
            status: status.as_u16(),
        };
        tracing::error!(error = %body.error, code = %body.code, "request failed");
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_not_found_maps_to_404() {
        let err = Error::Database(DatabaseError::not_found(DatabaseOperation::FetchNewActive, "no rows"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn backend_transient_maps_to_bad_gateway() {
        let err = Error::backend_transient("timeout", None);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.is_retriable());
    }

    #[test]
    fn backend_permanent_is_not_retriable() {
        let err = Error::backend_permanent("bad request", Some(400));
        assert!(!err.is_retriable());
    }

    #[test]
    fn config_error_code() {
        let err = Error::Config("missing backend.mode".into());
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
