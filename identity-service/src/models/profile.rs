//! Profile model - the application-side record mirroring an identity account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role a member holds inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Manager,
    Employee,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Manager => "manager",
            MemberRole::Employee => "employee",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(MemberRole::Admin),
            "manager" => Some(MemberRole::Manager),
            "employee" => Some(MemberRole::Employee),
            _ => None,
        }
    }

    /// Whether this role may invite other members into the organization.
    pub fn can_invite(&self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Manager)
    }
}

/// Profile entity. Exactly one per account; created lazily on first
/// authentication by the profile synchronizer.
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub email_verified: bool,
    pub organization_id: Option<Uuid>,
    pub role_code: Option<String>,
    pub has_seen_welcome: bool,
    pub created_utc: DateTime<Utc>,
}

impl Profile {
    /// Create a new profile for an account.
    pub fn new(
        user_id: Uuid,
        email: String,
        full_name: Option<String>,
        email_verified: bool,
    ) -> Self {
        Self {
            user_id,
            email,
            full_name,
            email_verified,
            organization_id: None,
            role_code: None,
            has_seen_welcome: false,
            created_utc: Utc::now(),
        }
    }

    pub fn role(&self) -> Option<MemberRole> {
        self.role_code.as_deref().and_then(MemberRole::parse)
    }

    /// Whether the profile is attached to an organization.
    pub fn has_organization(&self) -> bool {
        self.organization_id.is_some()
    }
}

/// Profile response for API (no internal fields).
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub email_verified: bool,
    pub organization_id: Option<Uuid>,
    pub role: Option<String>,
    pub has_seen_welcome: bool,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            user_id: p.user_id,
            email: p.email,
            full_name: p.full_name,
            email_verified: p.email_verified,
            organization_id: p.organization_id,
            role: p.role_code,
            has_seen_welcome: p.has_seen_welcome,
        }
    }
}
