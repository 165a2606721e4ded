//! Token Validator - read-only check of an invitation token.
//!
//! Lookup failures are reported as an invalid token with a generic reason;
//! this component never surfaces an error to its caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::Invitation;
use crate::services::{Database, OrgDirectory};
use crate::utils::hash_token;

/// Why a token is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRejection {
    NotFound,
    EmailMismatch,
    AlreadyUsed,
    Expired,
    /// The invitation store could not be reached; deliberately vague.
    LookupFailed,
}

impl TokenRejection {
    /// User-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenRejection::NotFound => "token not found",
            TokenRejection::EmailMismatch => "email mismatch",
            TokenRejection::AlreadyUsed => "already used",
            TokenRejection::Expired => "expired",
            TokenRejection::LookupFailed => "invitation could not be verified",
        }
    }
}

/// Validation outcome. The valid arm carries what the UI needs for the
/// "you are invited to join Acme Corp as employee" screen.
#[derive(Debug, Clone)]
pub enum TokenValidation {
    Valid {
        organization_id: Uuid,
        organization_name: Option<String>,
        role: String,
    },
    Invalid {
        reason: TokenRejection,
    },
}

/// Decide whether a looked-up invitation is usable.
///
/// Check order is contractual: a supplied email is compared first, then the
/// consumed state, then expiry. `now >= expires_utc` counts as expired.
pub fn evaluate(
    invitation: &Invitation,
    email: Option<&str>,
    now: DateTime<Utc>,
) -> Option<TokenRejection> {
    if let Some(email) = email {
        if !invitation.email.eq_ignore_ascii_case(email) {
            return Some(TokenRejection::EmailMismatch);
        }
    }

    if !invitation.is_pending() {
        return Some(TokenRejection::AlreadyUsed);
    }

    if invitation.is_expired_at(now) {
        return Some(TokenRejection::Expired);
    }

    None
}

#[derive(Clone)]
pub struct TokenValidator {
    db: Database,
    orgs: Arc<OrgDirectory>,
}

impl TokenValidator {
    pub fn new(db: Database, orgs: Arc<OrgDirectory>) -> Self {
        Self { db, orgs }
    }

    /// Validate an invitation token, optionally against an email address.
    pub async fn validate(&self, token: &str, email: Option<&str>) -> TokenValidation {
        let token_hash = hash_token(token);

        let invitation = match self.db.find_invitation_by_token_hash(&token_hash).await {
            Ok(Some(invitation)) => invitation,
            Ok(None) => {
                return TokenValidation::Invalid {
                    reason: TokenRejection::NotFound,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Invitation lookup failed during validation");
                return TokenValidation::Invalid {
                    reason: TokenRejection::LookupFailed,
                };
            }
        };

        if let Some(reason) = evaluate(&invitation, email, Utc::now()) {
            return TokenValidation::Invalid { reason };
        }

        // Display name is best-effort; a cache/store miss does not fail the
        // validation.
        let organization_name = match self
            .orgs
            .get_or_load(&self.db, invitation.organization_id)
            .await
        {
            Ok(org) => org.map(|o| o.org_name),
            Err(e) => {
                tracing::warn!(error = %e, organization_id = %invitation.organization_id, "Organization lookup failed during validation");
                None
            }
        };

        TokenValidation::Valid {
            organization_id: invitation.organization_id,
            organization_name,
            role: invitation.role_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemberRole;
    use chrono::Duration;

    fn invitation_for(email: &str, expires_in_hours: i64) -> Invitation {
        Invitation::new(
            Uuid::new_v4(),
            email.to_string(),
            MemberRole::Employee,
            "hash".to_string(),
            expires_in_hours,
            Uuid::new_v4(),
        )
    }

    #[test]
    fn pending_unexpired_matching_email_is_valid() {
        let invitation = invitation_for("alice@co.com", 1);
        assert_eq!(evaluate(&invitation, Some("alice@co.com"), Utc::now()), None);
    }

    #[test]
    fn missing_email_skips_the_email_check() {
        let invitation = invitation_for("alice@co.com", 1);
        assert_eq!(evaluate(&invitation, None, Utc::now()), None);
    }

    #[test]
    fn email_comparison_is_case_insensitive() {
        let invitation = invitation_for("alice@co.com", 1);
        assert_eq!(evaluate(&invitation, Some("Alice@CO.com"), Utc::now()), None);
    }

    #[test]
    fn email_mismatch_wins_over_expiry_and_status() {
        // A token for a@x.com validated as b@x.com is an email mismatch even
        // when it is also expired and already consumed.
        let mut invitation = invitation_for("a@x.com", 1);
        invitation.status_code = "accepted".to_string();
        let late = invitation.expires_utc + Duration::hours(2);

        assert_eq!(
            evaluate(&invitation, Some("b@x.com"), late),
            Some(TokenRejection::EmailMismatch)
        );
    }

    #[test]
    fn consumed_token_reports_already_used() {
        let mut invitation = invitation_for("alice@co.com", 1);
        invitation.status_code = "accepted".to_string();
        assert_eq!(
            evaluate(&invitation, Some("alice@co.com"), Utc::now()),
            Some(TokenRejection::AlreadyUsed)
        );
    }

    #[test]
    fn expiry_boundary_is_exact() {
        let invitation = invitation_for("alice@co.com", 1);

        // One second past expiry: expired.
        assert_eq!(
            evaluate(
                &invitation,
                Some("alice@co.com"),
                invitation.expires_utc + Duration::seconds(1)
            ),
            Some(TokenRejection::Expired)
        );
        // Exactly at expiry: expired.
        assert_eq!(
            evaluate(&invitation, Some("alice@co.com"), invitation.expires_utc),
            Some(TokenRejection::Expired)
        );
        // One second before expiry: still valid.
        assert_eq!(
            evaluate(
                &invitation,
                Some("alice@co.com"),
                invitation.expires_utc - Duration::seconds(1)
            ),
            None
        );
    }

    #[test]
    fn rejection_reasons_are_user_readable() {
        assert_eq!(TokenRejection::NotFound.reason(), "token not found");
        assert_eq!(TokenRejection::AlreadyUsed.reason(), "already used");
        assert_eq!(TokenRejection::Expired.reason(), "expired");
        assert_eq!(TokenRejection::EmailMismatch.reason(), "email mismatch");
    }
}
