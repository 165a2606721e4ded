//! Invitation model - a pending offer to join an organization with a role.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::MemberRole;

/// Invitation state codes. A token moves from `pending` to `accepted` at most
/// once; expiry is enforced by timestamp comparison, not by flipping rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
        }
    }
}

/// Invitation entity. Only the sha-256 hash of the opaque token is stored.
#[derive(Debug, Clone, FromRow)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub organization_id: Uuid,
    pub email: String,
    pub role_code: String,
    pub token_hash: String,
    pub status_code: String,
    pub expires_utc: DateTime<Utc>,
    pub accepted_utc: Option<DateTime<Utc>>,
    pub created_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl Invitation {
    /// Create a new pending invitation.
    pub fn new(
        organization_id: Uuid,
        email: String,
        role: MemberRole,
        token_hash: String,
        expires_in_hours: i64,
        created_by_user_id: Uuid,
    ) -> Self {
        Self {
            invitation_id: Uuid::new_v4(),
            organization_id,
            email,
            role_code: role.as_str().to_string(),
            token_hash,
            status_code: InvitationStatus::Pending.as_str().to_string(),
            expires_utc: Utc::now() + Duration::hours(expires_in_hours),
            accepted_utc: None,
            created_by_user_id,
            created_utc: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status_code == InvitationStatus::Pending.as_str()
    }

    /// Expired when `now` has reached the expiry timestamp.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_utc
    }

    pub fn role(&self) -> Option<MemberRole> {
        MemberRole::parse(&self.role_code)
    }
}

/// Request to create an invitation.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInvitationRequest {
    pub organization_id: Uuid,
    #[validate(email)]
    pub email: String,
    pub role: MemberRole,
    pub expires_in_hours: Option<i64>,
}

/// Response after creating an invitation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateInvitationResponse {
    pub invitation_id: Uuid,
    pub invite_token: String,
    pub invite_url: String,
    pub expires_utc: DateTime<Utc>,
}
