//! Reverse proxy to the upstream service.
//!
//! Every request the gateway does not answer itself is forwarded with its
//! method, path, query, headers and body. Bodies are streamed both ways.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::Response,
};
use url::Url;
use uuid::Uuid;

use crate::auth::GatewayError;

/// Header carrying the request id to the upstream service.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    upstream: Url,
}

impl ProxyState {
    /// Create a proxy forwarding to `upstream`.
    pub fn new(upstream: Url) -> Result<Self, GatewayError> {
        // Redirects are for the browser to follow, not the gateway.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(GatewayError::Client)?;

        Ok(Self { client, upstream })
    }

    fn target(&self, request: &Request) -> String {
        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!(
            "{}{}",
            self.upstream.as_str().trim_end_matches('/'),
            path_and_query
        )
    }
}

/// Fallback handler forwarding a request upstream.
pub async fn forward(
    State(proxy): State<ProxyState>,
    request: Request,
) -> Result<Response, GatewayError> {
    let target = proxy.target(&request);
    let (parts, body) = request.into_parts();

    let mut headers = parts.headers;
    let original_host = headers.remove(header::HOST);
    strip_hop_by_hop(&mut headers);
    if let Some(host) = original_host {
        headers.insert(HeaderName::from_static("x-forwarded-host"), host);
    }
    let request_id = ensure_request_id(&mut headers);

    tracing::debug!(method = %parts.method, url = %target, request_id = %request_id, "Forwarding request");

    let upstream = proxy
        .client
        .request(parts.method, target.as_str())
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!(url = %target, request_id = %request_id, error = %e, "Upstream request failed");
            GatewayError::Upstream(e)
        })?;

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut response_headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

/// `GET /healthz`
pub async fn health() -> &'static str {
    "ok"
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in `Connection` are connection-scoped as well.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in &named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn ensure_request_id(headers: &mut HeaderMap) -> String {
    if let Some(id) = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return id.to_string();
    }
    let id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    id
}
