use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Errors surfaced by the HTTP API.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                // Contract string consumed by existing clients; keep verbatim.
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "数据库未连接".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        // A cache outage degrades to direct DB reads; this variant is only
        // reached when a handler chooses to surface it.
        AppError::InternalError(format!("Cache error: {}", err))
    }
}

// ---------------------------------------------------------------------------
// Collection pipeline errors
// ---------------------------------------------------------------------------

/// Classified failure categories recorded in the per-run failure ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum ErrorKind {
    #[serde(rename = "HTTP_404")]
    Http404,
    #[serde(rename = "TIMEOUT")]
    Timeout,
    #[serde(rename = "CONNECTION_ERROR")]
    ConnectionError,
    #[serde(rename = "JSON_ERROR")]
    JsonError,
    #[serde(rename = "NO_DATA")]
    NoData,
    #[serde(rename = "DATABASE_SAVE_FAILED")]
    DatabaseSaveFailed,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Http404 => "HTTP_404",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ConnectionError => "CONNECTION_ERROR",
            ErrorKind::JsonError => "JSON_ERROR",
            ErrorKind::NoData => "NO_DATA",
            ErrorKind::DatabaseSaveFailed => "DATABASE_SAVE_FAILED",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

/// Typed outcome of a failed fetch / adapter / persistence step.
///
/// The pipeline never raises past a worker: every failure is classified into
/// one of these variants, recorded, and the worker returns cleanly.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("HTTP 404 for {url}")]
    Http404 { url: String },

    #[error("request timed out after {attempts} attempts: {url}")]
    Timeout { url: String, attempts: u32 },

    #[error("connection error for {url}: {message}")]
    Connection { url: String, message: String },

    #[error("failed to decode payload from {url}: {message}")]
    Json { url: String, message: String },

    #[error("no usable data from {url}")]
    NoData { url: String },

    #[error("database save failed for resort {resort_id}: {message}")]
    DatabaseSaveFailed { resort_id: i32, message: String },

    #[error("request failed for {url}: {message}")]
    Unknown { url: String, message: String },
}

impl CollectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::Http404 { .. } => ErrorKind::Http404,
            CollectError::Timeout { .. } => ErrorKind::Timeout,
            CollectError::Connection { .. } => ErrorKind::ConnectionError,
            CollectError::Json { .. } => ErrorKind::JsonError,
            CollectError::NoData { .. } => ErrorKind::NoData,
            CollectError::DatabaseSaveFailed { .. } => ErrorKind::DatabaseSaveFailed,
            CollectError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// URL associated with the failure, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            CollectError::Http404 { url }
            | CollectError::Timeout { url, .. }
            | CollectError::Connection { url, .. }
            | CollectError::Json { url, .. }
            | CollectError::NoData { url }
            | CollectError::Unknown { url, .. } => Some(url),
            CollectError::DatabaseSaveFailed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(ErrorKind::Http404.as_str(), "HTTP_404");
        assert_eq!(ErrorKind::DatabaseSaveFailed.as_str(), "DATABASE_SAVE_FAILED");
    }

    #[test]
    fn test_collect_error_classification() {
        let err = CollectError::Timeout {
            url: "https://example.test/feed".to_string(),
            attempts: 3,
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.url(), Some("https://example.test/feed"));

        let err = CollectError::DatabaseSaveFailed {
            resort_id: 7,
            message: "tx rollback".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::DatabaseSaveFailed);
        assert_eq!(err.url(), None);
    }
}
