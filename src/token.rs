use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::models::Document;

/// Validity window of every issued session token.
pub const TOKEN_VALIDITY_DAYS: i64 = 365;

/// Claim names owned by the codec; client-supplied values are dropped.
const RESERVED_CLAIMS: &[&str] = &["email", "iat", "exp"];

/// Identity
///
/// The body of `POST /jwt`: the caller's email plus any extra fields the client
/// wants embedded in the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    #[serde(flatten)]
    pub extra: Document,
}

/// Claims
///
/// Decoded payload of a session token. `email` is the identity every role gate
/// looks up in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    /// Issued At, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiration Time, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, expired, malformed, or missing the email claim.
    #[error("invalid session token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("failed to sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// TokenCodec
///
/// Signs and verifies HS256 session tokens with the configured secret. Holds no
/// revocation state: a token stays valid until `exp` even after logout.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        // Expired means expired: no clock-skew grace after `exp`.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issues a token for `identity`, valid for [`TOKEN_VALIDITY_DAYS`] from now.
    pub fn issue(&self, identity: Identity) -> Result<String, TokenError> {
        self.issue_at(identity, Utc::now().timestamp())
    }

    /// Issues a token as if signed at `issued_at` (seconds since the Unix epoch).
    pub fn issue_at(&self, identity: Identity, issued_at: i64) -> Result<String, TokenError> {
        let mut extra = identity.extra;
        extra.retain(|key, _| !RESERVED_CLAIMS.contains(&key.as_str()));

        let claims = Claims {
            email: identity.email,
            iat: issued_at,
            exp: issued_at + Duration::days(TOKEN_VALIDITY_DAYS).num_seconds(),
            extra,
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Signing)
    }

    /// Checks signature and expiry, returning the decoded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}
