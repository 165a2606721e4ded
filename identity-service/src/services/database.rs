//! PostgreSQL database service for the identity service.

use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{
    Account, Invitation, Organization, Profile, RefreshSession, VerificationToken,
};

/// Fields returned by the atomic invitation consumption.
#[derive(Debug, Clone, FromRow)]
struct ConsumedRow {
    organization_id: Uuid,
    role_code: String,
    email: String,
}

/// Outcome of attempting to consume an invitation token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationConsumption {
    /// Token flipped to `accepted` and the profile was attached.
    Accepted {
        organization_id: Uuid,
        role_code: String,
    },
    /// Token was still consumable but issued for a different email.
    EmailMismatch,
    /// The user has no profile row yet (synchronization has not landed); the
    /// token is left pending so a retry can succeed.
    ProfileMissing,
    /// No row matched the conditional update: unknown, expired or already
    /// consumed. The caller classifies which.
    Rejected,
}

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== Organization Operations ====================

    pub async fn find_organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn insert_organization(&self, org: &Organization) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO organizations (organization_id, org_name, created_utc)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(org.organization_id)
        .bind(&org.org_name)
        .bind(org.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn rename_organization(
        &self,
        organization_id: Uuid,
        org_name: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE organizations SET org_name = $1 WHERE organization_id = $2")
            .bind(org_name)
            .bind(organization_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Account Operations ====================

    pub async fn find_account_by_id(&self, user_id: Uuid) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_account(&self, account: &Account) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, email, password_hash, email_confirmed_utc, metadata, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.user_id)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.email_confirmed_utc)
        .bind(&account.metadata)
        .bind(account.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stamp the account's email as confirmed. Field-level update; keeps the
    /// first confirmation timestamp on repeated calls.
    pub async fn confirm_account_email(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET email_confirmed_utc = NOW() WHERE user_id = $1 AND email_confirmed_utc IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Profile Operations ====================

    pub async fn find_profile_by_user_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_profile(&self, profile: &Profile) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, email, full_name, email_verified, organization_id, role_code, has_seen_welcome, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(profile.email_verified)
        .bind(profile.organization_id)
        .bind(&profile.role_code)
        .bind(profile.has_seen_welcome)
        .bind(profile.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Flip the verified flag only. Never touches other profile fields so a
    /// concurrent organization assignment cannot be clobbered.
    pub async fn mark_profile_email_verified(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET email_verified = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Field-level update of the welcome flag.
    pub async fn mark_profile_welcome_seen(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE profiles SET has_seen_welcome = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Invitation Operations ====================

    pub async fn find_invitation_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Invitation>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_invitation(&self, invitation: &Invitation) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO invitations (invitation_id, organization_id, email, role_code, token_hash, status_code, expires_utc, accepted_utc, created_by_user_id, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(invitation.invitation_id)
        .bind(invitation.organization_id)
        .bind(&invitation.email)
        .bind(&invitation.role_code)
        .bind(&invitation.token_hash)
        .bind(&invitation.status_code)
        .bind(invitation.expires_utc)
        .bind(invitation.accepted_utc)
        .bind(invitation.created_by_user_id)
        .bind(invitation.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Atomically consume an invitation and attach the profile.
    ///
    /// The conditional UPDATE is the at-most-once authority: of any number of
    /// concurrent callers, exactly one observes an affected row. The invited
    /// email is re-checked inside the transaction; a mismatch rolls the flip
    /// back so the token stays pending.
    pub async fn consume_invitation(
        &self,
        token_hash: &str,
        user_id: Uuid,
        account_email: &str,
    ) -> Result<InvitationConsumption, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ConsumedRow>(
            r#"
            UPDATE invitations
            SET status_code = 'accepted', accepted_utc = NOW()
            WHERE token_hash = $1 AND status_code = 'pending' AND expires_utc > NOW()
            RETURNING organization_id, role_code, email
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(InvitationConsumption::Rejected);
        };

        if !row.email.eq_ignore_ascii_case(account_email) {
            tx.rollback().await?;
            return Ok(InvitationConsumption::EmailMismatch);
        }

        let updated =
            sqlx::query("UPDATE profiles SET organization_id = $1, role_code = $2 WHERE user_id = $3")
                .bind(row.organization_id)
                .bind(&row.role_code)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(InvitationConsumption::ProfileMissing);
        }

        tx.commit().await?;

        Ok(InvitationConsumption::Accepted {
            organization_id: row.organization_id,
            role_code: row.role_code,
        })
    }

    // ==================== Refresh Session Operations ====================

    pub async fn find_refresh_session_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshSession>, sqlx::Error> {
        sqlx::query_as::<_, RefreshSession>(
            "SELECT * FROM refresh_sessions WHERE token_hash_text = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn insert_refresh_session(
        &self,
        session: &RefreshSession,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO refresh_sessions (session_id, user_id, token_hash_text, expiry_utc, revoked_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(&session.token_hash_text)
        .bind(session.expiry_utc)
        .bind(session.revoked_utc)
        .bind(session.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn revoke_refresh_session(&self, session_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE refresh_sessions SET revoked_utc = NOW() WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Revoke every live refresh session for a user.
    pub async fn revoke_all_user_sessions(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE refresh_sessions SET revoked_utc = NOW() WHERE user_id = $1 AND revoked_utc IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Verification Token Operations ====================

    pub async fn find_verification_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, sqlx::Error> {
        sqlx::query_as::<_, VerificationToken>(
            "SELECT * FROM verification_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn insert_verification_token(
        &self,
        token: &VerificationToken,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (verification_id, user_id, token_hash, expires_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(token.verification_id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_utc)
        .bind(token.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_verification_token(
        &self,
        verification_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM verification_tokens WHERE verification_id = $1")
            .bind(verification_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
