//! Session Establisher - turns credentials or an emailed token pair into an
//! authenticated session.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Account, RefreshSession};
use crate::services::{Database, JwtService, ServiceError, TokenBlacklist, TokenResponse};
use crate::utils::{hash_token, verify_password, Password, PasswordHashString};

/// An established, fully usable session. There is no partial form: either
/// every field is populated from a verified account, or no session exists.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub email_confirmed_utc: Option<DateTime<Utc>>,
    pub full_name: Option<String>,
    pub metadata: serde_json::Value,
    pub tokens: TokenResponse,
}

impl Session {
    /// Invitation token embedded in the session metadata, if any.
    pub fn invite_token_hint(&self) -> Option<String> {
        self.metadata
            .get("invite_token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Translate an identity-provider redirect error into the session error
/// taxonomy.
///
/// The redirect surface carries `error_code` and `error_description`. The
/// structured code is authoritative when present; the substring matching on
/// the description is a fallback for providers that omit codes and is
/// quarantined here so the fragility stays in one testable place.
pub fn translate_redirect_error(
    error_code: Option<&str>,
    error_description: &str,
) -> ServiceError {
    match error_code {
        Some("email_not_confirmed") => return ServiceError::EmailNotConfirmed,
        Some("invalid_credentials") | Some("invalid_grant") => {
            return ServiceError::InvalidCredentials
        }
        Some("server_error") | Some("temporarily_unavailable") => {
            return ServiceError::NetworkOrServer(error_description.to_string())
        }
        Some(_) | None => {}
    }

    let description = error_description.to_ascii_lowercase();
    if description.contains("not confirmed") || description.contains("not verified") {
        ServiceError::EmailNotConfirmed
    } else if description.contains("invalid") && description.contains("credential") {
        ServiceError::InvalidCredentials
    } else {
        ServiceError::SessionExchangeFailed
    }
}

#[derive(Clone)]
pub struct SessionEstablisher {
    db: Database,
    jwt: JwtService,
    redis: Arc<dyn TokenBlacklist>,
}

impl SessionEstablisher {
    pub fn new(db: Database, jwt: JwtService, redis: Arc<dyn TokenBlacklist>) -> Self {
        Self { db, jwt, redis }
    }

    /// Exchange email/password credentials for a session.
    ///
    /// A correct password with an unconfirmed email does NOT yield a session;
    /// the caller gets `EmailNotConfirmed` and may offer a resend action.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ServiceError> {
        let account = self
            .db
            .find_account_by_email(email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        verify_password(
            &Password::new(password.to_string()),
            &PasswordHashString::new(account.password_hash.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        if !account.is_email_confirmed() {
            return Err(ServiceError::EmailNotConfirmed);
        }

        // Defensive cleanup: drop stale sessions before opening the new one.
        // Best effort, never blocks the sign-in. Must stay after the
        // credential check; a failed attempt must not revoke live sessions.
        if let Err(e) = self.db.revoke_all_user_sessions(account.user_id).await {
            tracing::debug!(error = %e, user_id = %account.user_id, "Stale session cleanup failed, continuing");
        }

        self.open_session(account).await
    }

    /// Exchange an emailed token pair (URL fragment of a redirect landing) for
    /// a live session. Every verification failure collapses into
    /// `SessionExchangeFailed`; the pair is single-purpose and the caller can
    /// only fall back to manual login.
    pub async fn establish_from_redirect(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, ServiceError> {
        let access_claims = self
            .jwt
            .validate_access_token(access_token)
            .map_err(|_| ServiceError::SessionExchangeFailed)?;
        let refresh_claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(|_| ServiceError::SessionExchangeFailed)?;

        if access_claims.sub != refresh_claims.sub {
            return Err(ServiceError::SessionExchangeFailed);
        }

        let stored = self
            .db
            .find_refresh_session_by_hash(&hash_token(refresh_token))
            .await?
            .ok_or(ServiceError::SessionExchangeFailed)?;

        if !stored.is_valid() {
            return Err(ServiceError::SessionExchangeFailed);
        }

        let user_id = Uuid::parse_str(&access_claims.sub)
            .map_err(|_| ServiceError::SessionExchangeFailed)?;
        let account = self
            .db
            .find_account_by_id(user_id)
            .await?
            .ok_or(ServiceError::SessionExchangeFailed)?;

        // The presented pair becomes the live session's pair.
        let expires_in = (access_claims.exp - Utc::now().timestamp()).max(0);
        let tokens = TokenResponse::new(
            access_token.to_string(),
            refresh_token.to_string(),
            expires_in,
        );

        tracing::info!(user_id = %account.user_id, "Session established from redirect tokens");

        Ok(self.session_for(account, tokens))
    }

    /// Rotate a refresh token: revoke the presented session, issue a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ServiceError> {
        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(|_| ServiceError::InvalidToken)?;

        let stored = self
            .db
            .find_refresh_session_by_hash(&hash_token(refresh_token))
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        if !stored.is_valid() {
            return Err(ServiceError::InvalidToken);
        }

        self.db.revoke_refresh_session(stored.session_id).await?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ServiceError::InvalidToken)?;
        let account = self
            .db
            .find_account_by_id(user_id)
            .await?
            .ok_or(ServiceError::AccountNotFound)?;

        if !account.is_email_confirmed() {
            return Err(ServiceError::EmailNotConfirmed);
        }

        let session = self.open_session(account).await?;
        Ok(session.tokens)
    }

    /// Revoke the refresh session and blacklist the access token.
    pub async fn logout(
        &self,
        access_token_jti: &str,
        access_token_exp: i64,
        refresh_token: &str,
    ) -> Result<(), ServiceError> {
        let remaining_time = access_token_exp - Utc::now().timestamp();
        if remaining_time > 0 {
            self.redis
                .blacklist_token(access_token_jti, remaining_time)
                .await
                .map_err(ServiceError::Internal)?;
        }

        let stored = self
            .db
            .find_refresh_session_by_hash(&hash_token(refresh_token))
            .await?
            .ok_or(ServiceError::InvalidToken)?;
        self.db.revoke_refresh_session(stored.session_id).await?;

        tracing::info!(user_id = %stored.user_id, "User logged out");
        Ok(())
    }

    /// Issue a fresh token pair and record its refresh session.
    async fn open_session(&self, account: Account) -> Result<Session, ServiceError> {
        let (access_token, refresh_token, _refresh_token_id) = self
            .jwt
            .generate_token_pair(&account.user_id.to_string(), &account.email)
            .map_err(ServiceError::Internal)?;

        let refresh_session = RefreshSession::new(
            account.user_id,
            hash_token(&refresh_token),
            self.jwt.refresh_token_expiry_days(),
        );
        self.db.insert_refresh_session(&refresh_session).await?;

        let tokens = TokenResponse::new(
            access_token,
            refresh_token,
            self.jwt.access_token_expiry_seconds(),
        );

        tracing::info!(user_id = %account.user_id, "Session established");

        Ok(self.session_for(account, tokens))
    }

    fn session_for(&self, account: Account, tokens: TokenResponse) -> Session {
        Session {
            user_id: account.user_id,
            email: account.email.clone(),
            email_confirmed_utc: account.email_confirmed_utc,
            full_name: account.full_name(),
            metadata: account.metadata,
            tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_code_wins_over_description() {
        // A provider that sends a code gets classified without reading the
        // free-text description at all.
        let err = translate_redirect_error(Some("email_not_confirmed"), "some opaque text");
        assert!(matches!(err, ServiceError::EmailNotConfirmed));

        let err = translate_redirect_error(Some("invalid_credentials"), "email not confirmed");
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[test]
    fn server_errors_map_to_network_or_server() {
        let err = translate_redirect_error(Some("server_error"), "upstream exploded");
        match err {
            ServiceError::NetworkOrServer(msg) => assert_eq!(msg, "upstream exploded"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn description_fallback_detects_unconfirmed_email() {
        let err = translate_redirect_error(None, "Email not confirmed yet");
        assert!(matches!(err, ServiceError::EmailNotConfirmed));

        let err = translate_redirect_error(None, "user is NOT VERIFIED");
        assert!(matches!(err, ServiceError::EmailNotConfirmed));
    }

    #[test]
    fn description_fallback_detects_invalid_credentials() {
        let err = translate_redirect_error(None, "Invalid login credentials");
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[test]
    fn unknown_errors_become_session_exchange_failed() {
        let err = translate_redirect_error(None, "flux capacitor misaligned");
        assert!(matches!(err, ServiceError::SessionExchangeFailed));

        let err = translate_redirect_error(Some("otp_mismatch"), "nonsense");
        assert!(matches!(err, ServiceError::SessionExchangeFailed));
    }

    #[test]
    fn session_reads_invite_hint_from_metadata() {
        let session = Session {
            user_id: Uuid::new_v4(),
            email: "alice@co.com".to_string(),
            email_confirmed_utc: Some(Utc::now()),
            full_name: None,
            metadata: serde_json::json!({ "invite_token": "tok-1" }),
            tokens: TokenResponse::new("a".to_string(), "r".to_string(), 900),
        };
        assert_eq!(session.invite_token_hint().as_deref(), Some("tok-1"));
    }
}
