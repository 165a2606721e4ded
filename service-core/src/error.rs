//! Shared application error type.
//!
//! Every service converts its domain failures into `AppError`, which renders
//! as a JSON body with an HTTP status. Variants that wrap `anyhow::Error`
//! keep their context chain for the logs while the response stays terse.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Authentication error: {0}")]
    AuthError(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    /// Carries an optional Retry-After value in seconds.
    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.into())
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::EmailError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

/// Response body shared by every failing endpoint.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// What a variant renders as: status, public message, optional detail string.
struct Rendering {
    status: StatusCode,
    error: String,
    details: Option<String>,
    retry_after: Option<u64>,
}

impl Rendering {
    fn plain(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
            retry_after: None,
        }
    }

    fn detailed(status: StatusCode, error: impl Into<String>, details: String) -> Self {
        Self {
            details: Some(details),
            ..Self::plain(status, error)
        }
    }
}

impl AppError {
    fn rendering(self) -> Rendering {
        use StatusCode as S;

        match self {
            AppError::ValidationError(e) => {
                Rendering::detailed(S::UNPROCESSABLE_ENTITY, "Validation error", e.to_string())
            }
            AppError::BadRequest(e) => Rendering::plain(S::BAD_REQUEST, e.to_string()),
            AppError::NotFound(e) => Rendering::plain(S::NOT_FOUND, e.to_string()),
            AppError::Unauthorized(e) => Rendering::plain(S::UNAUTHORIZED, e.to_string()),
            AppError::Forbidden(e) => Rendering::plain(S::FORBIDDEN, e.to_string()),
            AppError::AuthError(e) => Rendering::plain(S::UNAUTHORIZED, e.to_string()),
            AppError::Conflict(e) => Rendering::plain(S::CONFLICT, e.to_string()),
            AppError::TooManyRequests(msg, retry_after) => Rendering {
                retry_after,
                ..Rendering::plain(S::TOO_MANY_REQUESTS, msg)
            },
            AppError::NotImplemented(msg) => Rendering::plain(S::NOT_IMPLEMENTED, msg),
            AppError::InternalError(e) => Rendering::detailed(
                S::INTERNAL_SERVER_ERROR,
                "Internal server error",
                format!("{:#?}", e),
            ),
            AppError::ServiceUnavailable => {
                Rendering::plain(S::SERVICE_UNAVAILABLE, "Service unavailable")
            }
            AppError::DatabaseError(e) => {
                Rendering::detailed(S::INTERNAL_SERVER_ERROR, "Database error", e.to_string())
            }
            AppError::RedisError(e) => {
                Rendering::detailed(S::INTERNAL_SERVER_ERROR, "Cache error", e.to_string())
            }
            AppError::InvalidToken(e) => {
                Rendering::detailed(S::UNAUTHORIZED, "Invalid token", e.to_string())
            }
            AppError::EmailError(msg) => {
                Rendering::detailed(S::INTERNAL_SERVER_ERROR, "Email error", msg)
            }
            AppError::ConfigError(e) => Rendering::detailed(
                S::INTERNAL_SERVER_ERROR,
                "Configuration error",
                e.to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Rendering {
            status,
            error,
            details,
            retry_after,
        } = self.rendering();

        let mut response = (status, Json(ErrorBody { error, details })).into_response();

        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, seconds.into());
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_failures_are_unauthorized() {
        let r = AppError::AuthError(anyhow::anyhow!("bad password")).rendering();
        assert_eq!(r.status, StatusCode::UNAUTHORIZED);
        assert_eq!(r.error, "bad password");
    }

    #[test]
    fn internal_errors_hide_their_cause_from_the_message() {
        let r = AppError::InternalError(anyhow::anyhow!("connection pool exhausted")).rendering();
        assert_eq!(r.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(r.error, "Internal server error");
        assert!(r.details.is_some());
    }

    #[test]
    fn rate_limit_renders_retry_after() {
        let r = AppError::TooManyRequests("slow down".to_string(), Some(30)).rendering();
        assert_eq!(r.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(r.retry_after, Some(30));
    }
}
