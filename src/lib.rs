pub mod auth;
pub mod cli;
pub mod jwt;
pub mod proxy;

use auth::{AuthSettings, GatewayError, GatewayState, HttpRefreshClient, authenticate_session};
use axum::{Router, middleware, routing::get};
use jwt::TokenCodec;
use proxy::{ProxyState, forward, health};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub struct GatewayConfig {
    /// Base URL of the service requests are forwarded to (also hosts the refresh endpoint)
    pub upstream: Url,
    /// Shared secret tokens are signed with
    pub token_secret: Vec<u8>,
    /// Required `iss` claim, if any
    pub issuer: Option<String>,
    /// Required `aud` claim, if any
    pub audience: Option<String>,
    /// Cookie and header names, clock skew, refresh endpoint path
    pub settings: AuthSettings,
    /// Upper bound for the outbound refresh call
    pub refresh_timeout: Duration,
}

impl GatewayConfig {
    /// Configuration with default names and tolerances.
    pub fn new(upstream: Url, token_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            upstream,
            token_secret: token_secret.into(),
            issuer: None,
            audience: None,
            settings: AuthSettings::default(),
            refresh_timeout: Duration::from_secs(10),
        }
    }

    /// Build the token codec from the configured trust material.
    pub fn codec(&self) -> TokenCodec {
        let mut codec = TokenCodec::new(&self.token_secret);
        if let Some(issuer) = &self.issuer {
            codec = codec.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            codec = codec.with_audience(audience);
        }
        codec
    }

    /// Absolute URL of the refresh endpoint on the upstream service.
    pub fn refresh_endpoint(&self) -> Result<Url, GatewayError> {
        let endpoint = format!(
            "{}{}",
            self.upstream.as_str().trim_end_matches('/'),
            self.settings.refresh_path
        );
        Url::parse(&endpoint).map_err(GatewayError::RefreshEndpoint)
    }

    /// Middleware state refreshing over HTTP against the upstream service.
    pub fn gateway_state(&self) -> Result<GatewayState, GatewayError> {
        let refresher =
            HttpRefreshClient::new(self.refresh_endpoint()?, self.refresh_timeout, &self.settings)
                .map_err(GatewayError::Client)?;

        Ok(GatewayState::new(
            self.codec(),
            self.settings.clone(),
            Arc::new(refresher),
        ))
    }
}

/// Wrap the proxy in the session middleware.
pub fn gateway_router(state: GatewayState, proxy: ProxyState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .fallback(forward)
        .with_state(proxy)
        .layer(middleware::from_fn_with_state(state, authenticate_session))
}

/// Create the application router with the given configuration.
pub fn create_app(config: &GatewayConfig) -> Result<Router, GatewayError> {
    let state = config.gateway_state()?;
    let proxy = ProxyState::new(config.upstream.clone())?;
    Ok(gateway_router(state, proxy))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: GatewayConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: GatewayConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
