/// Unified error types for the Tradepost backend
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum MarketError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bad credentials - deliberately identical for unknown account and
    /// wrong password so callers cannot enumerate accounts
    #[error("Incorrect email/username or password")]
    Authentication,

    /// Account exists but has not been activated (or was deactivated)
    #[error("Account is inactive")]
    AccountInactive,

    /// Authorization errors (authenticated but not allowed)
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Malformed, forged, expired or wrong-purpose token - never
    /// distinguishes which
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Refresh token absent or already blacklisted
    #[error("Refresh token not found or blacklisted")]
    TokenNotFound,

    /// Unique-constraint collision on registration
    #[error("Conflict: {0}")]
    Duplicate(String),

    /// Rate limit exceeded, carries the retry-after value in seconds
    #[error("Rate limit exceeded. Try again in {retry_after} seconds.")]
    RateLimited { retry_after: u64 },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors (also used for no-op state-changing redemptions)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Upload storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Email dispatch errors - logged and swallowed by callers, never
    /// surfaced as a request failure
    #[error("Mail error: {0}")]
    Mail(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert MarketError to HTTP response
impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            MarketError::Authentication => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationFailed",
                self.to_string(),
            ),
            MarketError::AccountInactive => (
                StatusCode::BAD_REQUEST,
                "AccountInactive",
                self.to_string(),
            ),
            MarketError::Authorization(_) => {
                (StatusCode::FORBIDDEN, "Forbidden", self.to_string())
            }
            MarketError::InvalidToken => (
                StatusCode::BAD_REQUEST,
                "InvalidToken",
                self.to_string(),
            ),
            MarketError::TokenNotFound => (
                StatusCode::UNAUTHORIZED,
                "TokenNotFound",
                self.to_string(),
            ),
            MarketError::Duplicate(_) => {
                (StatusCode::BAD_REQUEST, "Conflict", self.to_string())
            }
            MarketError::RateLimited { retry_after } => {
                let body = Json(ErrorResponse {
                    error: "RateLimitExceeded".to_string(),
                    message: self.to_string(),
                });
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("Retry-After", retry_after.to_string())],
                    body,
                )
                    .into_response();
            }
            MarketError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            MarketError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "NotFound", self.to_string())
            }
            MarketError::Database(_)
            | MarketError::Storage(_)
            | MarketError::Mail(_)
            | MarketError::Internal(_)
            | MarketError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type MarketResult<T> = Result<T, MarketError>;
