//! JWT decoding and lifetime checks.
//!
//! The gateway never mints tokens. It only verifies signatures and reads the
//! expiration claim so callers can apply their own clock-skew tolerance.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default tolerance applied when comparing an expiration claim to the current time.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(2);

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,
    /// Tenant the user belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// User role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Issued at (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Expiration time (Unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Errors that can occur while decoding a token.
///
/// Callers treat every variant as "untrusted". The distinction exists for logs only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("token is not a well-formed JWT")]
    Malformed,
    #[error("token signature does not verify")]
    SignatureInvalid,
    #[error("token has no expiration claim")]
    ClaimMissing,
    #[error("token issuer or audience does not match")]
    ClaimMismatch,
}

impl From<jsonwebtoken::errors::Error> for DecodeError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::SignatureInvalid,
            ErrorKind::MissingRequiredClaim(_) => Self::ClaimMissing,
            ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => Self::ClaimMismatch,
            _ => Self::Malformed,
        }
    }
}

/// Verifies token signatures against the configured trust material.
#[derive(Clone)]
pub struct TokenCodec {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec that verifies HS256 signatures with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Lifetime is checked by the caller with its own skew tolerance.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Require the `iss` claim to match.
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Require the `aud` claim to contain the given audience.
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    /// Verify the signature and structure of a token and return its claims.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, DecodeError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        if data.claims.exp.is_none() {
            return Err(DecodeError::ClaimMissing);
        }
        Ok(data.claims)
    }

    /// Verify a token and return the instant it expires.
    pub fn expiration_of(&self, token: &str) -> Result<SystemTime, DecodeError> {
        let exp = self.decode(token)?.exp.ok_or(DecodeError::ClaimMissing)?;
        UNIX_EPOCH
            .checked_add(Duration::from_secs(exp))
            .ok_or(DecodeError::Malformed)
    }
}

/// Whether a token expiring at `expires_at` is expired at `now`, allowing `skew` of drift.
///
/// A token is still accepted at exactly `expires_at + skew`.
pub fn is_expired(expires_at: SystemTime, now: SystemTime, skew: Duration) -> bool {
    match expires_at.checked_add(skew) {
        Some(deadline) => now > deadline,
        None => false,
    }
}
