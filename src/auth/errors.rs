//! Gateway error types.
//!
//! Token validation failures never show up here: they are recovered inside the
//! middleware and the request continues anonymously.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Failures that end a request inside the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Session cookies and explicit token headers on the same request
    #[error("A request cannot carry both session cookies and token headers")]
    AmbiguousIdentity,
    /// The upstream service could not be reached
    #[error("Upstream request failed")]
    Upstream(#[source] reqwest::Error),
    /// The outbound HTTP client could not be constructed
    #[error("HTTP client could not be constructed")]
    Client(#[source] reqwest::Error),
    /// Upstream URL and refresh path do not form a valid URL
    #[error("Invalid refresh endpoint URL")]
    RefreshEndpoint(#[source] url::ParseError),
}

impl GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AmbiguousIdentity => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Client(_) | Self::RefreshEndpoint(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
