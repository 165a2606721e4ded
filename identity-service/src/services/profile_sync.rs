//! Profile Synchronizer - keeps the application profile convergent with the
//! identity account.
//!
//! Runs after every authentication event. Synchronization is eventually
//! consistent: a failed pass leaves the divergence in place until the next
//! successful authentication, and never blocks the flow.

use crate::models::Profile;
use crate::services::{Database, Session, ServiceError};

/// The write (if any) a sync pass should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// No profile yet: create one seeded from the session.
    CreateProfile { email_verified: bool },
    /// Provider says confirmed, profile still says unverified: flip the flag.
    MarkVerified,
    /// Already convergent.
    Noop,
}

/// Pure decision half of the synchronizer: what needs to change, given the
/// current profile and the freshly established session.
pub fn plan_sync(existing: Option<&Profile>, session: &Session) -> SyncAction {
    let provider_confirmed = session.email_confirmed_utc.is_some();

    match existing {
        None => SyncAction::CreateProfile {
            email_verified: provider_confirmed,
        },
        Some(profile) if provider_confirmed && !profile.email_verified => SyncAction::MarkVerified,
        Some(_) => SyncAction::Noop,
    }
}

#[derive(Clone)]
pub struct ProfileSynchronizer {
    db: Database,
}

impl ProfileSynchronizer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Synchronize the profile for a session. Idempotent; errors are logged
    /// and swallowed because profile sync is never on the critical path.
    pub async fn sync(&self, session: &Session) {
        if let Err(e) = self.try_sync(session).await {
            tracing::warn!(
                error = %e,
                user_id = %session.user_id,
                "Profile synchronization failed; will converge on the next authentication"
            );
        }
    }

    async fn try_sync(&self, session: &Session) -> Result<(), ServiceError> {
        let existing = self.db.find_profile_by_user_id(session.user_id).await?;

        match plan_sync(existing.as_ref(), session) {
            SyncAction::CreateProfile { email_verified } => {
                let profile = Profile::new(
                    session.user_id,
                    session.email.clone(),
                    session.full_name.clone(),
                    email_verified,
                );
                self.db.insert_profile(&profile).await?;
                tracing::info!(user_id = %session.user_id, "Profile created");
            }
            SyncAction::MarkVerified => {
                // Field-level update: only the flag, so a concurrent
                // organization assignment is never clobbered.
                self.db.mark_profile_email_verified(session.user_id).await?;
                tracing::info!(user_id = %session.user_id, "Profile marked email-verified");
            }
            SyncAction::Noop => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TokenResponse;
    use chrono::Utc;
    use uuid::Uuid;

    fn session(confirmed: bool) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            email: "alice@co.com".to_string(),
            email_confirmed_utc: confirmed.then(Utc::now),
            full_name: Some("Alice Doe".to_string()),
            metadata: serde_json::json!({}),
            tokens: TokenResponse::new("a".to_string(), "r".to_string(), 900),
        }
    }

    fn profile(session: &Session, email_verified: bool) -> Profile {
        Profile::new(
            session.user_id,
            session.email.clone(),
            session.full_name.clone(),
            email_verified,
        )
    }

    #[test]
    fn missing_profile_is_created_with_the_provider_flag() {
        let s = session(true);
        assert_eq!(
            plan_sync(None, &s),
            SyncAction::CreateProfile {
                email_verified: true
            }
        );

        let s = session(false);
        assert_eq!(
            plan_sync(None, &s),
            SyncAction::CreateProfile {
                email_verified: false
            }
        );
    }

    #[test]
    fn confirmed_provider_flips_an_unverified_profile() {
        let s = session(true);
        let p = profile(&s, false);
        assert_eq!(plan_sync(Some(&p), &s), SyncAction::MarkVerified);
    }

    #[test]
    fn sync_is_idempotent_once_convergent() {
        // A second pass with an already-verified profile writes nothing.
        let s = session(true);
        let p = profile(&s, true);
        assert_eq!(plan_sync(Some(&p), &s), SyncAction::Noop);
        assert_eq!(plan_sync(Some(&p), &s), SyncAction::Noop);
    }

    #[test]
    fn unconfirmed_provider_never_downgrades_the_profile() {
        let s = session(false);
        let p = profile(&s, true);
        assert_eq!(plan_sync(Some(&p), &s), SyncAction::Noop);
    }
}
