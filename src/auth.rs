//! Signed-token verification for cross-service traffic
//!
//! Two shared secrets are in play:
//! - the platform secret signs event payloads
//! - the domain secret signs cluster tokens carried by download batches
//!
//! Both are HS256 JWTs. Tokens are not required to carry `exp`/`aud`.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// Verifies HS256 tokens against one shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode and verify a token into its claims
    pub fn decode<T: DeserializeOwned + Clone>(&self, token: &str) -> Result<T> {
        decode::<T>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed(e.to_string()),
            })
    }

    /// Signature check only; the claims are not inspected
    pub fn verify(&self, token: &str) -> Result<()> {
        self.decode::<serde_json::Value>(token).map(|_| ())
    }

    pub fn is_authentic(&self, token: &str) -> bool {
        self.verify(token).is_ok()
    }
}

/// Sign `claims` with `secret` (HS256)
pub fn sign<T: Serialize>(secret: &str, claims: &T) -> Result<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Signing(e.to_string()))
}
