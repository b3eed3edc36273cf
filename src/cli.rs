//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use axum::http::HeaderName;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::GatewayConfig;
use crate::auth::{
    ACCESS_COOKIE_NAME, ACCESS_TOKEN_HEADER, AuthSettings, REFRESH_COOKIE_NAME,
    REFRESH_ENDPOINT_PATH, REFRESH_TOKEN_HEADER,
};

const MIN_TOKEN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "edgegate",
    about = "Edge gateway turning session cookies into bearer tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7292")]
    pub port: u16,

    /// Base URL of the service requests are forwarded to
    #[arg(short, long, env = "EDGEGATE_UPSTREAM", default_value = "http://localhost:8080")]
    pub upstream: String,

    /// Path to file containing the token signing secret. Prefer using TOKEN_SECRET env var instead
    #[arg(long)]
    pub token_secret_file: Option<String>,

    /// Required `iss` claim on every token
    #[arg(long)]
    pub issuer: Option<String>,

    /// Required `aud` claim on every token
    #[arg(long)]
    pub audience: Option<String>,

    /// Leeway in milliseconds when checking token expiration
    #[arg(long, default_value = "2000")]
    pub clock_skew_ms: u64,

    /// Path of the upstream token refresh endpoint
    #[arg(long, default_value = REFRESH_ENDPOINT_PATH, value_parser = validate_path)]
    pub refresh_path: String,

    /// Timeout in seconds for the refresh call
    #[arg(long, default_value = "10")]
    pub refresh_timeout_secs: u64,

    /// Name of the refresh token cookie
    #[arg(long, default_value = REFRESH_COOKIE_NAME)]
    pub refresh_cookie: String,

    /// Name of the access token cookie
    #[arg(long, default_value = ACCESS_COOKIE_NAME)]
    pub access_cookie: String,

    /// Response header carrying a rotated refresh token
    #[arg(long, default_value = REFRESH_TOKEN_HEADER, value_parser = parse_header_name)]
    pub refresh_header: HeaderName,

    /// Response header carrying a rotated access token
    #[arg(long, default_value = ACCESS_TOKEN_HEADER, value_parser = parse_header_name)]
    pub access_header: HeaderName,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_path(s: &str) -> Result<String, String> {
    if !s.starts_with('/') {
        return Err(format!("Path must start with '/': {}", s));
    }

    if s.chars().any(|c| !c.is_ascii() || c.is_whitespace() || c == '?' || c == '#') {
        return Err(format!("Path contains invalid characters: {}", s));
    }

    Ok(s.to_string())
}

fn parse_header_name(s: &str) -> Result<HeaderName, String> {
    HeaderName::from_bytes(s.as_bytes()).map_err(|e| format!("Invalid header name {}: {}", s, e))
}

/// Initialize logging based on the specified format. `RUST_LOG` overrides the default level.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .init(),
    }
}

/// Load the token secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_token_secret(token_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("TOKEN_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("TOKEN_SECRET") };
        secret
    } else if let Some(path) = token_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read token secret file");
                return None;
            }
        }
    } else {
        error!(
            "Token secret is required. Set TOKEN_SECRET environment variable (recommended) or use --token-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_TOKEN_SECRET_LENGTH {
        error!(
            "Token secret is shorter than {} characters. Use a longer secret",
            MIN_TOKEN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Parse and validate the upstream URL.
/// Returns None and logs an error if validation fails.
pub fn validate_upstream(upstream: &str) -> Option<Url> {
    let url = match Url::parse(upstream) {
        Ok(url) => url,
        Err(e) => {
            error!(upstream = %upstream, error = %e, "Invalid upstream URL");
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        error!(upstream = %upstream, "Upstream must use http or https");
        return None;
    }

    if url.query().is_some() || url.fragment().is_some() {
        error!(upstream = %upstream, "Upstream must not carry a query or fragment");
        return None;
    }

    Some(url)
}

/// Build GatewayConfig from validated arguments.
pub fn build_config(args: Args, upstream: Url, token_secret: String) -> GatewayConfig {
    let settings = AuthSettings {
        refresh_cookie: args.refresh_cookie,
        access_cookie: args.access_cookie,
        refresh_header: args.refresh_header,
        access_header: args.access_header,
        clock_skew: Duration::from_millis(args.clock_skew_ms),
        refresh_path: args.refresh_path,
    };

    GatewayConfig {
        upstream,
        token_secret: token_secret.into_bytes(),
        issuer: args.issuer,
        audience: args.audience,
        settings,
        refresh_timeout: Duration::from_secs(args.refresh_timeout_secs),
    }
}
