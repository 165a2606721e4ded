//! Request/response DTOs for the authentication surface.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::services::{Destination, Session, TokenResponse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub full_name: Option<String>,
    /// Invitation token from the join link that led to this registration, if
    /// any. Stored in the account metadata and consumed on first sign-in.
    pub invite_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyQuery {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResendVerificationRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Token pair lifted from a redirect URL fragment.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExchangeRequest {
    #[validate(length(min = 1))]
    pub access_token: String,
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Established session plus the routed next screen.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub email_confirmed: bool,
    pub tokens: TokenResponse,
    pub next: Destination,
}

impl SessionResponse {
    pub fn from_session(session: Session, next: Destination) -> Self {
        Self {
            user_id: session.user_id,
            email: session.email,
            full_name: session.full_name,
            email_confirmed: session.email_confirmed_utc.is_some(),
            tokens: session.tokens,
            next,
        }
    }
}

/// Composite join-flow request: the parsed join-link surface plus one of the
/// two credential forms. `error_code`/`error_description` carry a failed
/// identity-provider redirect.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct JoinRequest {
    /// Link kind; defaults to `invite`.
    pub kind: Option<String>,
    pub token: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    pub password: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    pub user_id: Uuid,
    pub email: String,
    pub tokens: TokenResponse,
    pub organization_id: Option<Uuid>,
    pub role: Option<String>,
    pub next: Destination,
}
