//! Invitation Processor - atomic, at-most-once acceptance of an invitation.

use chrono::Utc;
use uuid::Uuid;

use crate::models::MemberRole;
use crate::services::{Database, InvitationConsumption, ServiceError};
use crate::utils::hash_token;

/// Result of a successful acceptance; feeds session metadata and navigation.
#[derive(Debug, Clone)]
pub struct AcceptedInvitation {
    pub organization_id: Uuid,
    pub role: Option<MemberRole>,
    pub role_code: String,
}

#[derive(Clone)]
pub struct InvitationProcessor {
    db: Database,
}

impl InvitationProcessor {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Accept an invitation token for an authenticated user.
    ///
    /// The database performs the acceptance as a single conditional update in
    /// a transaction, so of any number of concurrent callers exactly one
    /// succeeds; everyone else sees the token as already used. Client-side
    /// pre-validation is advisory only.
    pub async fn accept(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<AcceptedInvitation, ServiceError> {
        let account = self
            .db
            .find_account_by_id(user_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;

        let token_hash = hash_token(token);

        match self
            .db
            .consume_invitation(&token_hash, user_id, &account.email)
            .await?
        {
            InvitationConsumption::Accepted {
                organization_id,
                role_code,
            } => {
                tracing::info!(
                    user_id = %user_id,
                    organization_id = %organization_id,
                    role = %role_code,
                    "Invitation accepted"
                );
                Ok(AcceptedInvitation {
                    organization_id,
                    role: MemberRole::parse(&role_code),
                    role_code,
                })
            }
            InvitationConsumption::EmailMismatch => Err(ServiceError::TokenEmailMismatch),
            InvitationConsumption::ProfileMissing => Err(ServiceError::InvitationAcceptFailed(
                "profile is not ready yet; sign in again to retry".to_string(),
            )),
            InvitationConsumption::Rejected => Err(self.classify_rejection(&token_hash).await),
        }
    }

    /// The conditional update matched nothing; find out why for the error
    /// message. Falls back to "already used" which is also what a concurrent
    /// loser should see.
    async fn classify_rejection(&self, token_hash: &str) -> ServiceError {
        match self.db.find_invitation_by_token_hash(token_hash).await {
            Ok(None) => ServiceError::TokenNotFound,
            Ok(Some(invitation)) => {
                if invitation.is_pending() && invitation.is_expired_at(Utc::now()) {
                    ServiceError::TokenExpired
                } else {
                    ServiceError::TokenAlreadyUsed
                }
            }
            Err(e) => ServiceError::Database(e),
        }
    }
}
