//! Opaque token generation and hashing.
//!
//! Invitation, refresh and verification tokens are random 32-byte values; only
//! their sha-256 hex digest is ever persisted.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a random opaque token.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}

/// Hash a token for storage or lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic_and_one_way() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn distinct_tokens_have_distinct_hashes() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_ne!(hash_token(&a), hash_token(&b));
    }
}
