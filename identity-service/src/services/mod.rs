//! Services layer for the identity service.
//!
//! The join workflow is composed from five components: token validation,
//! session establishment, profile synchronization, invitation processing and
//! flow routing, plus the infrastructure services they sit on.

mod database;
mod email;
pub mod error;
mod flow;
mod invitation;
mod jwt;
mod org_cache;
mod profile_sync;
pub mod redis;
mod session;
mod token_validator;

pub use database::{Database, InvitationConsumption};
pub use email::{EmailProvider, EmailService, MockEmailService};
pub use error::ServiceError;
pub use flow::{route, Destination, JoinCredentials, JoinFlow, JoinOutcome, JoinStage, LinkKind};
pub use invitation::{AcceptedInvitation, InvitationProcessor};
pub use jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims, TokenResponse};
pub use org_cache::OrgDirectory;
pub use profile_sync::{plan_sync, ProfileSynchronizer, SyncAction};
pub use redis::{MockBlacklist, RedisService, TokenBlacklist};
pub use session::{translate_redirect_error, Session, SessionEstablisher};
pub use token_validator::{evaluate, TokenRejection, TokenValidation, TokenValidator};
