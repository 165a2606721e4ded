//! RS256 token issuance and verification.
//!
//! Access tokens are short-lived and carry the email plus a `jti` for the
//! revocation list; refresh tokens are long-lived and their `jti` ties them to
//! a stored refresh session. The public half of the key pair is published as a
//! JWKS document for other services.

use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::{pkcs8::DecodePublicKey, traits::PublicKeyParts, RsaPublicKey};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::JwtConfig;

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key_pem: String,
    access_token_expiry_minutes: i64,
    refresh_token_expiry_days: i64,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Token id, keyed by the revocation list.
    pub jti: String,
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// User id.
    pub sub: String,
    /// Matches the stored refresh-session record.
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token pair handed to clients after authentication.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenResponse {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Jwk {
    pub kty: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Serialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

fn read_pem(path: &str, which: &str) -> Result<String, anyhow::Error> {
    fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {} key from {}: {}", which, path, e))
}

impl JwtService {
    /// Load the RS256 key pair from the configured PEM files.
    pub fn new(config: &JwtConfig) -> Result<Self, anyhow::Error> {
        let private_pem = read_pem(&config.private_key_path, "private")?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse private key: {}", e))?;

        let public_key_pem = read_pem(&config.public_key_path, "public")?;
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

        tracing::info!("JWT service initialized with RS256 keys");

        Ok(Self {
            encoding_key,
            decoding_key,
            public_key_pem,
            access_token_expiry_minutes: config.access_token_expiry_minutes,
            refresh_token_expiry_days: config.refresh_token_expiry_days,
        })
    }

    fn sign<C: Serialize>(&self, claims: &C, kind: &str) -> Result<String, anyhow::Error> {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode {} token: {}", kind, e))
    }

    fn verify<C: DeserializeOwned>(&self, token: &str, kind: &str) -> Result<C, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        decode::<C>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow::anyhow!("Invalid {} token: {}", kind, e))
    }

    pub fn generate_access_token(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        self.sign(
            &AccessTokenClaims {
                sub: user_id.to_string(),
                email: email.to_string(),
                exp: (now + Duration::minutes(self.access_token_expiry_minutes)).timestamp(),
                iat: now.timestamp(),
                jti: Uuid::new_v4().to_string(),
            },
            "access",
        )
    }

    pub fn generate_refresh_token(
        &self,
        user_id: &str,
        token_id: &str,
    ) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        self.sign(
            &RefreshTokenClaims {
                sub: user_id.to_string(),
                jti: token_id.to_string(),
                exp: (now + Duration::days(self.refresh_token_expiry_days)).timestamp(),
                iat: now.timestamp(),
            },
            "refresh",
        )
    }

    /// Issue an access/refresh pair; the returned id is the refresh token's
    /// `jti`, which the caller persists as the refresh-session key.
    pub fn generate_token_pair(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<(String, String, String), anyhow::Error> {
        let access_token = self.generate_access_token(user_id, email)?;
        let refresh_token_id = Uuid::new_v4().to_string();
        let refresh_token = self.generate_refresh_token(user_id, &refresh_token_id)?;

        Ok((access_token, refresh_token, refresh_token_id))
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, anyhow::Error> {
        self.verify(token, "access")
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshTokenClaims, anyhow::Error> {
        self.verify(token, "refresh")
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }

    pub fn refresh_token_expiry_days(&self) -> i64 {
        self.refresh_token_expiry_days
    }

    /// The verification key as a JWKS document. The kid is the digest of the
    /// PEM, so a rotated key gets a new id automatically.
    pub fn get_jwks(&self) -> Result<Jwks, anyhow::Error> {
        let public_key = RsaPublicKey::from_public_key_pem(&self.public_key_pem)
            .map_err(|e| anyhow::anyhow!("Failed to parse public key for JWKS: {}", e))?;

        let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;

        Ok(Jwks {
            keys: vec![Jwk {
                kty: "RSA".to_string(),
                alg: "RS256".to_string(),
                use_: "sig".to_string(),
                kid: hex::encode(Sha256::digest(self.public_key_pem.as_bytes())),
                n: b64.encode(public_key.n().to_bytes_be()),
                e: b64.encode(public_key.e().to_bytes_be()),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TEST_PRIVATE_KEY: &str = include_str!("../../tests/keys/test_private.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../../tests/keys/test_public.pem");

    fn write_temp(contents: &str) -> anyhow::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(contents.as_bytes())?;
        Ok(file)
    }

    fn test_service() -> anyhow::Result<(JwtService, NamedTempFile, NamedTempFile)> {
        let private_file = write_temp(TEST_PRIVATE_KEY)?;
        let public_file = write_temp(TEST_PUBLIC_KEY)?;

        let config = JwtConfig {
            private_key_path: private_file.path().to_str().unwrap().to_string(),
            public_key_path: public_file.path().to_str().unwrap().to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        };

        Ok((JwtService::new(&config)?, private_file, public_file))
    }

    #[test]
    fn access_token_round_trip() -> anyhow::Result<()> {
        let (service, _p, _q) = test_service()?;

        let token = service.generate_access_token("user_123", "test@example.com")?;
        assert!(!token.is_empty());

        let claims = service.validate_access_token(&token)?;
        assert_eq!(claims.sub, "user_123");
        assert_eq!(claims.email, "test@example.com");

        Ok(())
    }

    #[test]
    fn refresh_token_round_trip() -> anyhow::Result<()> {
        let (service, _p, _q) = test_service()?;

        let token = service.generate_refresh_token("user_123", "token_abc")?;
        let claims = service.validate_refresh_token(&token)?;
        assert_eq!(claims.sub, "user_123");
        assert_eq!(claims.jti, "token_abc");

        Ok(())
    }

    #[test]
    fn token_pair_shares_the_refresh_id() -> anyhow::Result<()> {
        let (service, _p, _q) = test_service()?;

        let (access_token, refresh_token, refresh_token_id) =
            service.generate_token_pair("user_123", "test@example.com")?;

        assert_eq!(service.validate_access_token(&access_token)?.sub, "user_123");
        assert_eq!(
            service.validate_refresh_token(&refresh_token)?.jti,
            refresh_token_id
        );

        Ok(())
    }

    #[test]
    fn jwks_publishes_one_rsa_signing_key() -> anyhow::Result<()> {
        let (service, _p, _q) = test_service()?;

        let jwks = service.get_jwks()?;
        assert_eq!(jwks.keys.len(), 1);
        let key = &jwks.keys[0];
        assert_eq!(key.kty, "RSA");
        assert_eq!(key.alg, "RS256");
        assert_eq!(key.use_, "sig");
        assert!(!key.n.is_empty());

        Ok(())
    }

    #[test]
    fn garbage_tokens_are_rejected() -> anyhow::Result<()> {
        let (service, _p, _q) = test_service()?;
        assert!(service.validate_access_token("not-a-jwt").is_err());
        assert!(service.validate_refresh_token("not-a-jwt").is_err());
        Ok(())
    }
}
