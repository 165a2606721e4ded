//! Join flow - the composite state machine behind magic-link landings.
//!
//! One canonical orchestration of validate → authenticate → sync → accept →
//! route. The standalone endpoints (validate, login, exchange, accept) are
//! independent entry points over the same components; this module is the only
//! place where the whole sequence lives.

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Profile;
use crate::services::{
    AcceptedInvitation, Database, InvitationProcessor, ProfileSynchronizer, ServiceError, Session,
    SessionEstablisher, TokenRejection, TokenValidation, TokenValidator,
};

/// Where the client should navigate after authentication settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    JoinOrganization,
    EmployeeWelcome,
    Dashboard,
}

/// Decide the next screen from the profile state. Pure; navigation itself is
/// the caller's side effect.
pub fn route(profile: &Profile) -> Destination {
    if !profile.has_organization() {
        Destination::JoinOrganization
    } else if !profile.has_seen_welcome {
        Destination::EmployeeWelcome
    } else {
        Destination::Dashboard
    }
}

/// Kind of emailed link that landed the user here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Invite,
    MagicLink,
    Recovery,
    EmailChange,
}

impl LinkKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invite" => Some(LinkKind::Invite),
            "magiclink" => Some(LinkKind::MagicLink),
            "recovery" => Some(LinkKind::Recovery),
            "email_change" => Some(LinkKind::EmailChange),
            _ => None,
        }
    }
}

/// Stages of the composite flow.
///
/// `TokenInvalid` and `AuthFailed` are terminal for this run; the UI falls
/// back to manual login or a fresh invitation. `Routed` is terminal, full
/// stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStage {
    Idle,
    ValidatingToken,
    TokenInvalid,
    AwaitingAuth,
    Authenticating,
    AuthFailed,
    Authenticated,
    SyncingProfile,
    AcceptingInvitation,
    Routed,
}

impl JoinStage {
    /// Legal transitions of the flow's state machine.
    pub fn can_advance_to(self, next: JoinStage) -> bool {
        use JoinStage::*;
        matches!(
            (self, next),
            (Idle, ValidatingToken)
                | (Idle, AwaitingAuth)
                | (ValidatingToken, TokenInvalid)
                | (ValidatingToken, AwaitingAuth)
                | (AwaitingAuth, Authenticating)
                | (Authenticating, AuthFailed)
                | (Authenticating, Authenticated)
                | (Authenticated, SyncingProfile)
                | (SyncingProfile, AcceptingInvitation)
                | (SyncingProfile, Routed)
                | (AcceptingInvitation, Routed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JoinStage::TokenInvalid | JoinStage::AuthFailed | JoinStage::Routed
        )
    }
}

/// How the user authenticates within the flow.
#[derive(Debug, Clone)]
pub enum JoinCredentials {
    Password { email: String, password: String },
    Redirect { access_token: String, refresh_token: String },
}

/// Everything the client needs when the flow settles.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub session: Session,
    pub accepted: Option<AcceptedInvitation>,
    pub destination: Destination,
}

#[derive(Clone)]
pub struct JoinFlow {
    db: Database,
    validator: TokenValidator,
    establisher: SessionEstablisher,
    synchronizer: ProfileSynchronizer,
    processor: InvitationProcessor,
}

impl JoinFlow {
    pub fn new(
        db: Database,
        validator: TokenValidator,
        establisher: SessionEstablisher,
        synchronizer: ProfileSynchronizer,
        processor: InvitationProcessor,
    ) -> Self {
        Self {
            db,
            validator,
            establisher,
            synchronizer,
            processor,
        }
    }

    /// Drive the composite flow to a terminal stage.
    ///
    /// Pre-validation of the token is advisory (it produces the early,
    /// friendly failure); the acceptance step re-validates atomically on the
    /// database, which is where the at-most-once guarantee lives.
    #[tracing::instrument(skip_all, fields(kind = ?kind))]
    pub async fn run(
        &self,
        kind: LinkKind,
        invite_token: Option<String>,
        email_hint: Option<String>,
        credentials: JoinCredentials,
    ) -> Result<JoinOutcome, ServiceError> {
        match kind {
            LinkKind::Recovery => {
                return Err(ServiceError::NotImplemented("password recovery links"))
            }
            LinkKind::EmailChange => {
                return Err(ServiceError::NotImplemented("email change links"))
            }
            LinkKind::Invite | LinkKind::MagicLink => {}
        }

        let mut stage = JoinStage::Idle;

        if let Some(token) = invite_token.as_deref() {
            stage = self.advance(stage, JoinStage::ValidatingToken);
            match self.validator.validate(token, email_hint.as_deref()).await {
                TokenValidation::Valid {
                    organization_id, ..
                } => {
                    tracing::debug!(organization_id = %organization_id, "Invite token pre-validated");
                }
                TokenValidation::Invalid { reason } => {
                    self.advance(stage, JoinStage::TokenInvalid);
                    return Err(rejection_to_error(reason));
                }
            }
        }
        stage = self.advance(stage, JoinStage::AwaitingAuth);

        stage = self.advance(stage, JoinStage::Authenticating);
        let session = match &credentials {
            JoinCredentials::Password { email, password } => {
                self.establisher.sign_in_with_password(email, password).await
            }
            JoinCredentials::Redirect {
                access_token,
                refresh_token,
            } => {
                self.establisher
                    .establish_from_redirect(access_token, refresh_token)
                    .await
            }
        };
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                self.advance(stage, JoinStage::AuthFailed);
                return Err(e);
            }
        };
        stage = self.advance(stage, JoinStage::Authenticated);

        stage = self.advance(stage, JoinStage::SyncingProfile);
        self.synchronizer.sync(&session).await;

        // An explicit token wins; otherwise fall back to one embedded in the
        // session metadata at account creation.
        let token = invite_token.or_else(|| session.invite_token_hint());
        let accepted = match token {
            Some(token) => {
                stage = self.advance(stage, JoinStage::AcceptingInvitation);
                Some(self.processor.accept(session.user_id, &token).await?)
            }
            None => None,
        };

        // Synchronization is best-effort; if the profile still is not there,
        // the safe destination is the join screen rather than a hard failure.
        let destination = match self.db.find_profile_by_user_id(session.user_id).await {
            Ok(Some(profile)) => route(&profile),
            Ok(None) => {
                tracing::warn!(user_id = %session.user_id, "Profile missing after synchronization");
                Destination::JoinOrganization
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id = %session.user_id, "Profile lookup failed after synchronization");
                Destination::JoinOrganization
            }
        };
        self.advance(stage, JoinStage::Routed);

        Ok(JoinOutcome {
            session,
            accepted,
            destination,
        })
    }

    fn advance(&self, from: JoinStage, to: JoinStage) -> JoinStage {
        debug_assert!(from.can_advance_to(to), "illegal transition {from:?} -> {to:?}");
        tracing::debug!(from = ?from, to = ?to, "Join flow transition");
        to
    }
}

fn rejection_to_error(reason: TokenRejection) -> ServiceError {
    match reason {
        TokenRejection::NotFound => ServiceError::TokenNotFound,
        TokenRejection::EmailMismatch => ServiceError::TokenEmailMismatch,
        TokenRejection::AlreadyUsed => ServiceError::TokenAlreadyUsed,
        TokenRejection::Expired => ServiceError::TokenExpired,
        TokenRejection::LookupFailed => {
            ServiceError::InvitationAcceptFailed("invitation could not be verified".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn profile(org: Option<Uuid>, has_seen_welcome: bool) -> Profile {
        let mut p = Profile::new(Uuid::new_v4(), "a@x.com".to_string(), None, true);
        p.organization_id = org;
        p.has_seen_welcome = has_seen_welcome;
        p
    }

    #[test]
    fn routing_is_deterministic() {
        assert_eq!(
            route(&profile(None, false)),
            Destination::JoinOrganization
        );
        assert_eq!(
            route(&profile(None, true)),
            Destination::JoinOrganization
        );
        let org = Some(Uuid::new_v4());
        assert_eq!(route(&profile(org, false)), Destination::EmployeeWelcome);
        assert_eq!(route(&profile(org, true)), Destination::Dashboard);
    }

    #[test]
    fn link_kinds_parse() {
        assert_eq!(LinkKind::parse("invite"), Some(LinkKind::Invite));
        assert_eq!(LinkKind::parse("magiclink"), Some(LinkKind::MagicLink));
        assert_eq!(LinkKind::parse("recovery"), Some(LinkKind::Recovery));
        assert_eq!(LinkKind::parse("email_change"), Some(LinkKind::EmailChange));
        assert_eq!(LinkKind::parse("signup"), None);
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        use JoinStage::*;
        let path = [
            Idle,
            ValidatingToken,
            AwaitingAuth,
            Authenticating,
            Authenticated,
            SyncingProfile,
            AcceptingInvitation,
            Routed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_advance_to(pair[1]),
                "expected {:?} -> {:?} to be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn tokenless_flow_skips_validation_and_acceptance() {
        use JoinStage::*;
        assert!(Idle.can_advance_to(AwaitingAuth));
        assert!(SyncingProfile.can_advance_to(Routed));
    }

    #[test]
    fn failure_stages_are_terminal() {
        use JoinStage::*;
        for stage in [TokenInvalid, AuthFailed, Routed] {
            assert!(stage.is_terminal());
            for next in [
                Idle,
                ValidatingToken,
                AwaitingAuth,
                Authenticating,
                Authenticated,
                SyncingProfile,
                AcceptingInvitation,
                Routed,
            ] {
                assert!(!stage.can_advance_to(next));
            }
        }
    }

    #[test]
    fn cannot_accept_before_authentication() {
        use JoinStage::*;
        assert!(!ValidatingToken.can_advance_to(AcceptingInvitation));
        assert!(!AwaitingAuth.can_advance_to(AcceptingInvitation));
        assert!(!Authenticating.can_advance_to(AcceptingInvitation));
    }
}
