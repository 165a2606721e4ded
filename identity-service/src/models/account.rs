//! Account model - the identity-provider side of a user.
//!
//! An account is the record sessions are minted against. The application-side
//! view of the same user lives in `Profile` and is kept convergent by the
//! profile synchronizer.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Identity account entity.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub email_confirmed_utc: Option<DateTime<Utc>>,
    /// Free-form metadata bag. Carries the full name and, for accounts created
    /// from a join link, an `invite_token` hint consumed by the join flow.
    pub metadata: serde_json::Value,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    /// Create a new, unconfirmed account.
    pub fn new(email: String, password_hash: String, full_name: Option<String>) -> Self {
        let mut metadata = serde_json::Map::new();
        if let Some(name) = full_name {
            metadata.insert("full_name".to_string(), serde_json::Value::String(name));
        }

        Self {
            user_id: Uuid::new_v4(),
            email,
            password_hash,
            email_confirmed_utc: None,
            metadata: serde_json::Value::Object(metadata),
            created_utc: Utc::now(),
        }
    }

    pub fn is_email_confirmed(&self) -> bool {
        self.email_confirmed_utc.is_some()
    }

    pub fn full_name(&self) -> Option<String> {
        self.metadata
            .get("full_name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Invitation token embedded at account creation, if any.
    pub fn invite_token_hint(&self) -> Option<String> {
        self.metadata
            .get("invite_token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Attach an invitation-token hint to the metadata bag.
    pub fn with_invite_token(mut self, token: &str) -> Self {
        if let serde_json::Value::Object(map) = &mut self.metadata {
            map.insert(
                "invite_token".to_string(),
                serde_json::Value::String(token.to_string()),
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_carries_full_name_and_invite_hint() {
        let account = Account::new(
            "alice@co.com".to_string(),
            "hash".to_string(),
            Some("Alice Doe".to_string()),
        )
        .with_invite_token("tok-123");

        assert_eq!(account.full_name().as_deref(), Some("Alice Doe"));
        assert_eq!(account.invite_token_hint().as_deref(), Some("tok-123"));
        assert!(!account.is_email_confirmed());
    }

    #[test]
    fn missing_metadata_fields_read_as_none() {
        let account = Account::new("bob@co.com".to_string(), "hash".to_string(), None);
        assert_eq!(account.full_name(), None);
        assert_eq!(account.invite_token_hint(), None);
    }
}
