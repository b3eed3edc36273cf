//! Calls the token-issuance service to rotate an expired session.
//!
//! The refresh token is presented as bearer credential on a bodiless `POST`.
//! A successful response carries the rotated pair in two response headers.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, StatusCode};
use futures::future::BoxFuture;
use url::Url;

use super::state::AuthSettings;

/// A rotated (refresh, access) token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Errors that can occur while refreshing a session.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("refresh endpoint responded with {0}")]
    Status(StatusCode),
    #[error("refresh response did not carry both rotated tokens")]
    MissingTokens,
}

/// Something that can exchange a refresh token for a new token pair.
///
/// Callers must have checked that the refresh token is not expired.
pub trait TokenRefresher: Send + Sync + 'static {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<TokenPair, RefreshError>>;
}

/// Refreshes tokens over HTTP against the issuance service's refresh endpoint.
#[derive(Clone)]
pub struct HttpRefreshClient {
    client: reqwest::Client,
    endpoint: Url,
    refresh_header: HeaderName,
    access_header: HeaderName,
}

impl HttpRefreshClient {
    /// Build a client for `endpoint`. The timeout bounds the whole refresh call.
    pub fn new(
        endpoint: Url,
        timeout: Duration,
        settings: &AuthSettings,
    ) -> Result<Self, reqwest::Error> {
        // The refresh endpoint answers directly; a redirect would be a protocol error.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self::with_client(client, endpoint, settings))
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(client: reqwest::Client, endpoint: Url, settings: &AuthSettings) -> Self {
        Self {
            client,
            endpoint,
            refresh_header: settings.refresh_header.clone(),
            access_header: settings.access_header.clone(),
        }
    }

    async fn send(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        tracing::debug!(endpoint = %self.endpoint, "Access token expired, refreshing");

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(RefreshError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status));
        }

        let headers = response.headers();
        match (
            single_header(headers, &self.refresh_header),
            single_header(headers, &self.access_header),
        ) {
            (Some(refresh), Some(access)) => Ok(TokenPair { refresh, access }),
            _ => Err(RefreshError::MissingTokens),
        }
    }
}

impl TokenRefresher for HttpRefreshClient {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, Result<TokenPair, RefreshError>> {
        Box::pin(self.send(refresh_token))
    }
}

/// Read a header that must occur exactly once with a non-empty visible-ASCII value.
pub(crate) fn single_header(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    let mut values = headers.get_all(name).iter();
    let value = values.next()?;
    if values.next().is_some() {
        return None;
    }
    let value = value.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}
