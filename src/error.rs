use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy for every ledger operation. Handlers return this
/// directly; the `IntoResponse` impl below is the only place errors are
/// turned into HTTP responses.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("username is already taken")]
    DuplicateUser,

    #[error("account already holds a resource named '{0}'")]
    DuplicateResource(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("not found")]
    NotFound,

    /// One fixed message for every resource denial. A missing resource and a
    /// resource owned by someone else must be indistinguishable to the caller.
    #[error("resource not available")]
    Forbidden,

    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("storage timed out")]
    StorageTimeout,

    #[error("storage error")]
    Storage(#[from] anyhow::Error),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => LedgerError::StorageTimeout,
            other => LedgerError::Storage(other.into()),
        }
    }
}

/// Body rendered for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl LedgerError {
    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::DuplicateUser | LedgerError::DuplicateResource(_) => StatusCode::CONFLICT,
            LedgerError::InvalidRequest(_) | LedgerError::InvalidAmount(_) => {
                StatusCode::BAD_REQUEST
            }
            LedgerError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::NotFound => StatusCode::NOT_FOUND,
            LedgerError::Forbidden => StatusCode::FORBIDDEN,
            LedgerError::Unauthenticated | LedgerError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            LedgerError::StorageTimeout => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Detail stays in the logs; the client sees a generic body.
            LedgerError::Storage(e) => {
                error!(error = %e, "storage failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
