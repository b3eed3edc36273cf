//! Gateway settings and shared middleware state.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;

use super::refresh::TokenRefresher;
use crate::jwt::{DEFAULT_CLOCK_SKEW, TokenCodec};

/// Cookie name for the refresh token (long-lived).
pub const REFRESH_COOKIE_NAME: &str = "refresh-session";

/// Cookie name for the access token (short-lived).
pub const ACCESS_COOKIE_NAME: &str = "access-session";

/// Response header a downstream handler uses to hand over a new refresh token.
pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Response header a downstream handler uses to hand over a new access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-access-token";

/// Path of the token-issuance service's refresh endpoint.
pub const REFRESH_ENDPOINT_PATH: &str =
    "/api/account-management/authentication/refresh-authentication-tokens";

/// Names and tolerances the gateway works with.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub refresh_cookie: String,
    pub access_cookie: String,
    pub refresh_header: HeaderName,
    pub access_header: HeaderName,
    /// Leeway when comparing expiration claims to the current time
    pub clock_skew: Duration,
    /// Requests to this path carry the refresh token as bearer credential
    pub refresh_path: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            refresh_cookie: REFRESH_COOKIE_NAME.to_string(),
            access_cookie: ACCESS_COOKIE_NAME.to_string(),
            refresh_header: HeaderName::from_static(REFRESH_TOKEN_HEADER),
            access_header: HeaderName::from_static(ACCESS_TOKEN_HEADER),
            clock_skew: DEFAULT_CLOCK_SKEW,
            refresh_path: REFRESH_ENDPOINT_PATH.to_string(),
        }
    }
}

/// State handed to the gateway middleware.
///
/// Everything here is read-only. No per-session data survives a request.
#[derive(Clone)]
pub struct GatewayState {
    pub codec: Arc<TokenCodec>,
    pub settings: Arc<AuthSettings>,
    pub refresher: Arc<dyn TokenRefresher>,
}

impl GatewayState {
    pub fn new(
        codec: TokenCodec,
        settings: AuthSettings,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            codec: Arc::new(codec),
            settings: Arc::new(settings),
            refresher,
        }
    }
}
