//! Organization model - the tenant unit users are invited into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Organization entity.
#[derive(Debug, Clone, FromRow)]
pub struct Organization {
    pub organization_id: Uuid,
    pub org_name: String,
    pub created_utc: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization.
    pub fn new(org_name: String) -> Self {
        Self {
            organization_id: Uuid::new_v4(),
            org_name,
            created_utc: Utc::now(),
        }
    }
}

/// Request to create an organization.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrganizationRequest {
    pub org_name: String,
}

/// Request to rename an organization.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameOrganizationRequest {
    pub org_name: String,
}

/// Organization response for API.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrganizationResponse {
    pub organization_id: Uuid,
    pub org_name: String,
    pub created_utc: DateTime<Utc>,
}

impl From<Organization> for OrganizationResponse {
    fn from(o: Organization) -> Self {
        Self {
            organization_id: o.organization_id,
            org_name: o.org_name,
            created_utc: o.created_utc,
        }
    }
}
