//! JWT access/refresh token creation and verification.
//!
//! Both token kinds are HS256-signed with the configured secret and carry `{sub, role}`. A
//! random `jti` makes every issued token unique, so two refresh tokens minted in the same
//! second for the same user still hash to different store rows.

use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::Config,
    errors::Error,
    types::{RoleId, UserId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// What a token says about its bearer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPayload {
    pub sub: UserId,
    pub role: Option<RoleId>,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: UserId, // Subject (user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleId>,
    pub kind: TokenKind,
    pub jti: Uuid,
    pub iat: i64, // Issued at
    pub exp: i64, // Expiration time
}

impl TokenClaims {
    pub fn payload(&self) -> TokenPayload {
        TokenPayload {
            sub: self.sub,
            role: self.role,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly signed token and the instant its `exp` claim points to
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies access and refresh tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret_key = config.secret_key.as_deref().filter(|s| !s.is_empty()).ok_or_else(|| Error::Internal {
            operation: "create token codec: secret_key is required".to_string(),
        })?;

        Ok(Self::new(
            secret_key,
            config.auth.access_token_expiry,
            config.auth.refresh_token_expiry,
        ))
    }

    pub fn sign_access(&self, payload: TokenPayload) -> Result<SignedToken, Error> {
        self.sign(payload, TokenKind::Access, self.access_ttl)
    }

    pub fn sign_refresh(&self, payload: TokenPayload) -> Result<SignedToken, Error> {
        self.sign(payload, TokenKind::Refresh, self.refresh_ttl)
    }

    fn sign(&self, payload: TokenPayload, kind: TokenKind, ttl: Duration) -> Result<SignedToken, Error> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::Internal {
            operation: format!("convert token ttl: {e}"),
        })?;
        let expires_at = now + ttl;

        let claims = TokenClaims {
            sub: payload.sub,
            role: payload.role,
            kind,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        Ok(SignedToken {
            token: self.encode_claims(&claims)?,
            expires_at: claims.expires_at(),
        })
    }

    fn encode_claims(&self, claims: &TokenClaims) -> Result<String, Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| Error::Internal {
            operation: format!("create JWT: {e}"),
        })
    }

    /// Verify signature and expiry, accepting either token kind
    pub fn verify(&self, token: &str) -> Result<TokenClaims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            // Client errors (401) - malformed, tampered, foreign or expired tokens
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Error::Unauthenticated {
                message: Some("Token inválido o expirado".to_string()),
            },

            // Server errors (500) - key issues, internal failures
            ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::RsaFailedSigning
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Crypto(_) => Error::Internal {
                operation: format!("JWT verification: {e}"),
            },

            // Catch-all for any future error variants (default to server error for safety)
            _ => Error::Internal {
                operation: format!("JWT verification (unknown error): {e}"),
            },
        })?;

        Ok(token_data.claims)
    }

    /// Verify a token that must be an access token
    pub fn verify_access(&self, token: &str) -> Result<TokenClaims, Error> {
        self.verify_kind(token, TokenKind::Access)
    }

    /// Verify a token that must be a refresh token
    pub fn verify_refresh(&self, token: &str) -> Result<TokenClaims, Error> {
        self.verify_kind(token, TokenKind::Refresh)
    }

    fn verify_kind(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, Error> {
        let claims = self.verify(token)?;
        if claims.kind != kind {
            return Err(Error::Unauthenticated {
                message: Some("Tipo de token incorrecto".to_string()),
            });
        }
        Ok(claims)
    }
}

/// One-way digest of a raw token, as stored in `refresh_tokens.token_hash` (64 hex chars).
pub fn hash_token(raw_token: &str) -> String {
    format!("{:x}", Sha256::digest(raw_token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, Duration::from_secs(15 * 60), Duration::from_secs(7 * 24 * 3600))
    }

    fn payload() -> TokenPayload {
        TokenPayload { sub: 42, role: Some(2) }
    }

    #[test]
    fn test_access_token_round_trip() {
        let codec = codec();
        let signed = codec.sign_access(payload()).unwrap();
        let claims = codec.verify_access(&signed.token).unwrap();

        assert_eq!(claims.payload(), payload());
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.expires_at(), signed.expires_at);
        assert!(claims.exp - claims.iat >= 15 * 60 - 1);
    }

    #[test]
    fn test_refresh_token_lives_longer_than_access_token() {
        let codec = codec();
        let access = codec.sign_access(payload()).unwrap();
        let refresh = codec.sign_refresh(payload()).unwrap();

        assert!(refresh.expires_at - access.expires_at > chrono::Duration::days(6));
        assert_eq!(codec.verify_refresh(&refresh.token).unwrap().sub, 42);
    }

    #[test]
    fn test_role_is_optional() {
        let codec = codec();
        let signed = codec.sign_access(TokenPayload { sub: 7, role: None }).unwrap();
        let claims = codec.verify(&signed.token).unwrap();
        assert_eq!(claims.role, None);
        assert_eq!(claims.sub, 7);
    }

    #[test]
    fn test_tokens_are_unique_per_issuance() {
        let codec = codec();
        let first = codec.sign_refresh(payload()).unwrap();
        let second = codec.sign_refresh(payload()).unwrap();
        assert_ne!(first.token, second.token);
        assert_ne!(hash_token(&first.token), hash_token(&second.token));
    }

    #[test]
    fn test_kind_is_enforced() {
        let codec = codec();
        let refresh = codec.sign_refresh(payload()).unwrap();
        assert!(matches!(codec.verify_access(&refresh.token), Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: 42,
            role: None,
            kind: TokenKind::Access,
            jti: Uuid::new_v4(),
            iat: now - 3600,
            exp: now - 60,
        };
        let token = codec.encode_claims(&claims).unwrap();
        assert!(matches!(codec.verify(&token), Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let other = TokenCodec::new("another-secret", Duration::from_secs(60), Duration::from_secs(120));
        let token = other.sign_access(payload()).unwrap().token;
        assert!(matches!(codec().verify(&token), Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_unsigned_token_rejected() {
        // {"alg":"none","typ":"JWT"} . {"sub":42,"kind":"access"} . (no signature)
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJzdWIiOjQyLCJraW5kIjoiYWNjZXNzIn0.";
        assert!(matches!(codec().verify(token), Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(codec().verify("not-a-jwt"), Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        let digest = hash_token("abc");
        assert_eq!(digest, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(digest.len(), 64);
    }
}
