//! Per-request session classification.
//!
//! Computed fresh from the two session cookies on every request and never cached.

use std::time::{Duration, SystemTime};

use crate::jwt::{DecodeError, TokenCodec, is_expired};

/// What the two session cookies amount to at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// No refresh cookie
    NoSession,
    /// Both tokens verify and the access token is unexpired
    Valid { refresh: String, access: String },
    /// Refresh token is valid but the access token is missing or expired
    Refreshable { refresh: String },
    /// Refresh token expired beyond the skew tolerance
    Expired,
    /// One of the tokens failed to decode or verify
    Invalid(DecodeError),
}

/// Outcome of the gateway for one request, inserted into the request extensions
/// so downstream handlers can see how the credentials were arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionClass {
    NoSession,
    Valid,
    /// Access token expired on a request to the refresh endpoint itself
    Refreshable,
    Refreshed,
    RefreshFailed,
    Expired,
    Invalid,
}

/// Classify a request's session from its cookie values.
///
/// The refresh token is checked first: an access token is only trusted while
/// the refresh token it was issued with is itself valid.
pub fn classify(
    codec: &TokenCodec,
    refresh: Option<&str>,
    access: Option<&str>,
    now: SystemTime,
    skew: Duration,
) -> Session {
    let Some(refresh) = refresh.filter(|token| !token.is_empty()) else {
        return Session::NoSession;
    };

    let refresh_expires = match codec.expiration_of(refresh) {
        Ok(expires) => expires,
        Err(e) => return Session::Invalid(e),
    };
    if is_expired(refresh_expires, now, skew) {
        return Session::Expired;
    }

    let Some(access) = access.filter(|token| !token.is_empty()) else {
        return Session::Refreshable {
            refresh: refresh.to_string(),
        };
    };

    match codec.expiration_of(access) {
        Ok(expires) if is_expired(expires, now, skew) => Session::Refreshable {
            refresh: refresh.to_string(),
        },
        Ok(_) => Session::Valid {
            refresh: refresh.to_string(),
            access: access.to_string(),
        },
        Err(e) => Session::Invalid(e),
    }
}
