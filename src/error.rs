//! Unified error types for the grades service.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::grade::{FieldErrors, GradeId};

/// Unified error type for the grades service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Record store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database was written by a newer schema than this binary knows.
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        /// Version found in the database.
        db_version: u32,
        /// Latest version this binary can migrate to.
        latest_supported: u32,
    },

    /// A persisted row could not be decoded.
    #[error("invalid persisted grade data: {0}")]
    InvalidData(String),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Authentication and token errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header was sent.
    #[error("Authentication credentials were not provided.")]
    MissingCredentials,

    /// The `Authorization` header is not a bearer credential.
    #[error("Given token not valid for any token type")]
    InvalidScheme,

    /// The bearer token is unknown, expired or of the wrong kind.
    #[error("Given token not valid for any token type")]
    InvalidToken,

    /// Username/password pair did not match any account.
    #[error("No active account found with the given credentials")]
    BadCredentials,

    /// The refresh token is unknown, expired or of the wrong kind.
    #[error("Token is invalid or expired")]
    InvalidRefreshToken,
}

/// Errors surfaced to HTTP callers.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid credential.
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// Payload failed field validation.
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    /// No grade with the requested id.
    #[error("grade {0} not found")]
    NotFound(String),

    /// Request body was not acceptable JSON.
    #[error("rejected request body: {0}")]
    BodyRejected(#[from] JsonRejection),

    /// Record store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Not-found error for a numeric grade id.
    pub fn grade_not_found(id: GradeId) -> Self {
        Self::NotFound(id.to_string())
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BodyRejected(rejection) => rejection.status(),
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Unauthorized(err) => (
                status,
                [(header::WWW_AUTHENTICATE, "Bearer realm=\"api\"")],
                Json(json!({ "detail": err.to_string() })),
            )
                .into_response(),
            ApiError::Validation(errors) => (status, Json(errors)).into_response(),
            ApiError::NotFound(_) => (status, Json(json!({ "detail": "Not found." }))).into_response(),
            ApiError::BodyRejected(rejection) => {
                (status, Json(json!({ "detail": rejection.body_text() }))).into_response()
            }
            ApiError::Store(err) => {
                error!("Store failure while serving request: {}", err);
                (status, Json(json!({ "detail": "Internal server error" }))).into_response()
            }
        }
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ServiceError>;
