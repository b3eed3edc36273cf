#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Response, StatusCode, header},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use edgegate::auth::{
    AuthSettings, GatewayState, REFRESH_ENDPOINT_PATH, RefreshError, SessionClass, TokenPair,
    TokenRefresher, authenticate_session,
};
use edgegate::jwt::TokenCodec;
use futures::future::BoxFuture;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};

pub const SECRET: &[u8] = b"test-token-secret-with-at-least-32-bytes";

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}

/// Sign a token for `sub` expiring at the given Unix timestamp.
pub fn mint(sub: &str, exp: u64) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        &json!({
            "sub": sub,
            "tenant_id": "acme",
            "role": "Member",
            "iat": exp.saturating_sub(300),
            "exp": exp,
        }),
        &EncodingKey::from_secret(SECRET),
    )
    .expect("Failed to sign token")
}

/// A token valid for another `secs` seconds.
pub fn fresh_token(sub: &str, secs: u64) -> String {
    mint(sub, now_secs() + secs)
}

/// A token that expired `secs` seconds ago.
pub fn expired_token(sub: &str, secs: u64) -> String {
    mint(sub, now_secs() - secs)
}

/// Flip the first signature character.
pub fn tamper(token: &str) -> String {
    let sig_start = token.rfind('.').expect("not a JWT") + 1;
    let mut bytes = token.as_bytes().to_vec();
    bytes[sig_start] = if bytes[sig_start] == b'A' { b'B' } else { b'A' };
    String::from_utf8(bytes).expect("token is ASCII")
}

pub fn session_cookies(refresh: &str, access: &str) -> String {
    format!("refresh-session={}; access-session={}", refresh, access)
}

pub fn refresh_cookie_only(refresh: &str) -> String {
    format!("refresh-session={}", refresh)
}

/// In-memory refresher returning a fixed outcome and recording its calls.
#[derive(Default)]
pub struct FakeRefresher {
    pair: Option<TokenPair>,
    calls: AtomicUsize,
    presented: Mutex<Vec<String>>,
}

impl FakeRefresher {
    pub fn succeeding(pair: TokenPair) -> Arc<Self> {
        Arc::new(Self {
            pair: Some(pair),
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn presented(&self) -> Vec<String> {
        self.presented.lock().expect("poisoned").clone()
    }
}

impl TokenRefresher for FakeRefresher {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<TokenPair, RefreshError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.presented
            .lock()
            .expect("poisoned")
            .push(refresh_token.to_string());
        let result = self
            .pair
            .clone()
            .ok_or(RefreshError::Status(StatusCode::UNAUTHORIZED));
        Box::pin(async move { result })
    }
}

pub fn gateway_state(refresher: Arc<FakeRefresher>) -> GatewayState {
    gateway_state_with(AuthSettings::default(), refresher)
}

pub fn gateway_state_with(settings: AuthSettings, refresher: Arc<FakeRefresher>) -> GatewayState {
    GatewayState::new(TokenCodec::new(SECRET), settings, refresher)
}

/// State of the stand-in downstream handlers.
#[derive(Clone)]
pub struct Downstream {
    pub hits: Arc<AtomicUsize>,
    /// Pair handed out by `/api/rotate`
    pub rotation: TokenPair,
}

impl Downstream {
    pub fn new() -> Self {
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
            rotation: TokenPair {
                refresh: fresh_token("user-1", 14 * 24 * 3600),
                access: fresh_token("user-1", 300),
            },
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Downstream handlers wrapped in the gateway middleware.
pub fn app(state: GatewayState, downstream: Downstream) -> Router {
    Router::new()
        .route("/api/echo", get(echo))
        .route("/api/rotate", post(rotate))
        .route("/api/rotate-partial", post(rotate_partial))
        .route("/api/rotate-unsigned", post(rotate_unsigned))
        .route(REFRESH_ENDPOINT_PATH, post(echo))
        .with_state(downstream)
        .layer(from_fn_with_state(state, authenticate_session))
}

async fn echo(
    State(downstream): State<Downstream>,
    headers: HeaderMap,
    Extension(session): Extension<SessionClass>,
) -> Json<Value> {
    downstream.hits.fetch_add(1, Ordering::SeqCst);
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({
        "authorization": authorization,
        "session": format!("{:?}", session),
    }))
}

async fn rotate(State(downstream): State<Downstream>) -> ([(&'static str, String); 2], &'static str) {
    downstream.hits.fetch_add(1, Ordering::SeqCst);
    (
        [
            ("x-refresh-token", downstream.rotation.refresh.clone()),
            ("x-access-token", downstream.rotation.access.clone()),
        ],
        "rotated",
    )
}

async fn rotate_partial(State(downstream): State<Downstream>) -> ([(&'static str, String); 1], &'static str) {
    downstream.hits.fetch_add(1, Ordering::SeqCst);
    (
        [("x-access-token", downstream.rotation.access.clone())],
        "rotated",
    )
}

async fn rotate_unsigned(State(downstream): State<Downstream>) -> ([(&'static str, String); 2], &'static str) {
    downstream.hits.fetch_add(1, Ordering::SeqCst);
    (
        [
            ("x-refresh-token", "not-a-jwt".to_string()),
            ("x-access-token", "a9".to_string()),
        ],
        "rotated",
    )
}

/// Extract Set-Cookie headers from response
pub fn extract_set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Check if cookies contain a cookie being cleared (Max-Age=0)
pub fn has_cleared_cookie(cookies: &[String], cookie_name: &str) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with(&format!("{}=;", cookie_name)) && c.contains("Max-Age=0"))
}

/// Find the Set-Cookie directive for `cookie_name` carrying a value
pub fn find_cookie<'a>(cookies: &'a [String], cookie_name: &str) -> Option<&'a str> {
    let prefix = format!("{}=", cookie_name);
    cookies
        .iter()
        .map(String::as_str)
        .find(|c| c.starts_with(&prefix) && !c.contains("Max-Age=0"))
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
