use service_core::error::AppError;
use thiserror::Error;

/// Service-level failures for the identity and join workflow.
///
/// Token and authentication variants mirror what the UI needs to distinguish:
/// token failures are terminal for the current invitation, authentication
/// failures keep the user on the form, and `NotImplemented` marks link kinds
/// this service deliberately does not process (never a silent success).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invitation not found")]
    TokenNotFound,

    #[error("Invitation has expired")]
    TokenExpired,

    #[error("Invitation already used")]
    TokenAlreadyUsed,

    #[error("Invitation was issued for a different email address")]
    TokenEmailMismatch,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("Session exchange failed")]
    SessionExchangeFailed,

    #[error("Identity provider unavailable: {0}")]
    NetworkOrServer(String),

    #[error("Invitation could not be accepted: {0}")]
    InvitationAcceptFailed(String),

    #[error("Account not found")]
    AccountNotFound,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::TokenNotFound => AppError::NotFound(anyhow::anyhow!("Invitation not found")),
            ServiceError::TokenExpired => AppError::BadRequest(anyhow::anyhow!("Invitation has expired")),
            ServiceError::TokenAlreadyUsed => AppError::BadRequest(anyhow::anyhow!("Invitation already used")),
            ServiceError::TokenEmailMismatch => AppError::BadRequest(anyhow::anyhow!(
                "Invitation was issued for a different email address"
            )),
            ServiceError::InvalidCredentials => AppError::AuthError(anyhow::anyhow!("Invalid credentials")),
            ServiceError::EmailNotConfirmed => AppError::Forbidden(anyhow::anyhow!(
                "Email not confirmed. Please check your inbox for the verification link."
            )),
            ServiceError::SessionExchangeFailed => {
                AppError::Unauthorized(anyhow::anyhow!("Session exchange failed"))
            }
            ServiceError::NetworkOrServer(msg) => AppError::InternalError(anyhow::anyhow!(msg)),
            ServiceError::InvitationAcceptFailed(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::AccountNotFound => AppError::NotFound(anyhow::anyhow!("Account not found")),
            ServiceError::InvalidToken => AppError::BadRequest(anyhow::anyhow!("Invalid token")),
            ServiceError::NotImplemented(what) => AppError::NotImplemented(what.to_string()),
        }
    }
}
