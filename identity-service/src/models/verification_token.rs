//! Email verification token model.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Email confirmation token entity. Stored hashed, deleted once used.
#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub verification_id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(user_id: Uuid, token_hash: String, expires_in_hours: i64) -> Self {
        Self {
            verification_id: Uuid::new_v4(),
            user_id,
            token_hash,
            expires_utc: Utc::now() + Duration::hours(expires_in_hours),
            created_utc: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_utc
    }
}
