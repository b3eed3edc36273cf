//! Moves credentials between cookies and headers.
//!
//! Inbound, a valid cookie session becomes an `Authorization: Bearer` header.
//! Outbound, rotated tokens signalled by the downstream handler through two
//! response headers become `Set-Cookie` directives, and the raw headers are
//! removed so they never reach the browser.

use axum::http::{HeaderMap, HeaderValue, header};

use super::cookie::{
    SameSite, build_access_cookie, build_clear_cookie, build_refresh_cookie,
};
use super::errors::GatewayError;
use super::refresh::{TokenPair, single_header};
use super::state::AuthSettings;
use crate::jwt::TokenCodec;

/// What should happen to the browser's session cookies once the response is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieAction {
    Keep,
    Clear,
    Rotate(TokenPair),
}

/// Fail when a cookie session is combined with client-supplied token headers.
///
/// Call only when a refresh cookie is present.
pub fn reject_ambiguous(headers: &HeaderMap, settings: &AuthSettings) -> Result<(), GatewayError> {
    if headers.contains_key(header::AUTHORIZATION)
        || headers.contains_key(&settings.refresh_header)
        || headers.contains_key(&settings.access_header)
    {
        return Err(GatewayError::AmbiguousIdentity);
    }
    Ok(())
}

/// Replace the request's `Authorization` header with the given bearer token.
pub fn set_bearer(headers: &mut HeaderMap, token: &str) -> bool {
    match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
            true
        }
        Err(_) => false,
    }
}

/// Remove both rotation headers from a response and return the pair they carried.
///
/// The headers are removed even when only one is present or a value is unusable.
pub fn take_rotated_tokens(headers: &mut HeaderMap, settings: &AuthSettings) -> Option<TokenPair> {
    let refresh = single_header(headers, &settings.refresh_header);
    let access = single_header(headers, &settings.access_header);
    let had_refresh = headers.remove(&settings.refresh_header).is_some();
    let had_access = headers.remove(&settings.access_header).is_some();

    match (refresh, access) {
        (Some(refresh), Some(access)) => Some(TokenPair { refresh, access }),
        _ => {
            if had_refresh || had_access {
                tracing::warn!(
                    refresh_present = had_refresh,
                    access_present = had_access,
                    "Incomplete token rotation in response, headers removed"
                );
            }
            None
        }
    }
}

/// Append the `Set-Cookie` directives for `action` to a response.
pub fn apply_cookie_action(
    headers: &mut HeaderMap,
    action: &CookieAction,
    codec: &TokenCodec,
    settings: &AuthSettings,
) {
    match action {
        CookieAction::Keep => {}
        CookieAction::Clear => {
            append_cookie(
                headers,
                &build_clear_cookie(&settings.refresh_cookie, SameSite::Lax),
            );
            append_cookie(
                headers,
                &build_clear_cookie(&settings.access_cookie, SameSite::Strict),
            );
        }
        CookieAction::Rotate(pair) => {
            let refresh_cookie = codec
                .expiration_of(&pair.refresh)
                .ok()
                .and_then(|expires| build_refresh_cookie(&settings.refresh_cookie, &pair.refresh, expires));
            let Some(refresh_cookie) = refresh_cookie else {
                tracing::warn!("Rotated refresh token does not verify, session cookies not issued");
                return;
            };
            let access_cookie = build_access_cookie(&settings.access_cookie, &pair.access);

            if HeaderValue::from_str(&refresh_cookie).is_err()
                || HeaderValue::from_str(&access_cookie).is_err()
            {
                tracing::warn!("Rotated tokens are not valid cookie values, session cookies not issued");
                return;
            }
            append_cookie(headers, &refresh_cookie);
            append_cookie(headers, &access_cookie);
        }
    }
}

fn append_cookie(headers: &mut HeaderMap, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        headers.append(header::SET_COOKIE, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &[u8] = b"test-secret-key-for-testing";

    fn mint(exp: u64) -> String {
        jsonwebtoken::encode(
            &Header::default(),
            &serde_json::json!({ "sub": "user-1", "exp": exp }),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_reject_ambiguous() {
        let settings = AuthSettings::default();
        let mut headers = HeaderMap::new();
        assert!(reject_ambiguous(&headers, &settings).is_ok());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        assert!(reject_ambiguous(&headers, &settings).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("x-refresh-token", HeaderValue::from_static("r"));
        assert!(reject_ambiguous(&headers, &settings).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("x-access-token", HeaderValue::from_static("a"));
        assert!(reject_ambiguous(&headers, &settings).is_err());
    }

    #[test]
    fn test_set_bearer_replaces_existing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));

        assert!(set_bearer(&mut headers, "tok"));
        assert_eq!(headers.get_all(header::AUTHORIZATION).iter().count(), 1);
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer tok");
    }

    #[test]
    fn test_take_rotated_tokens() {
        let settings = AuthSettings::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-refresh-token", HeaderValue::from_static("r2"));
        headers.insert("x-access-token", HeaderValue::from_static("a2"));

        let pair = take_rotated_tokens(&mut headers, &settings).unwrap();
        assert_eq!(pair.refresh, "r2");
        assert_eq!(pair.access, "a2");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_take_rotated_tokens_strips_partial() {
        let settings = AuthSettings::default();
        let mut headers = HeaderMap::new();
        headers.insert("x-access-token", HeaderValue::from_static("a2"));

        assert_eq!(take_rotated_tokens(&mut headers, &settings), None);
        assert!(!headers.contains_key("x-access-token"));
    }

    #[test]
    fn test_apply_rotate() {
        let settings = AuthSettings::default();
        let codec = TokenCodec::new(SECRET);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let pair = TokenPair {
            refresh: mint(now + 3600),
            access: mint(now + 300),
        };

        let mut headers = HeaderMap::new();
        apply_cookie_action(&mut headers, &CookieAction::Rotate(pair.clone()), &codec, &settings);

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with(&format!("refresh-session={};", pair.refresh)));
        assert!(cookies[0].contains("Expires="));
        assert!(cookies[0].contains("SameSite=Lax"));
        assert_eq!(
            cookies[1],
            format!("access-session={}; Path=/; Secure; HttpOnly; SameSite=Strict", pair.access)
        );
    }

    #[test]
    fn test_apply_rotate_with_unverifiable_refresh() {
        let settings = AuthSettings::default();
        let codec = TokenCodec::new(SECRET);
        let pair = TokenPair {
            refresh: "not-a-token".to_string(),
            access: "a2".to_string(),
        };

        let mut headers = HeaderMap::new();
        apply_cookie_action(&mut headers, &CookieAction::Rotate(pair), &codec, &settings);

        assert!(set_cookies(&headers).is_empty());
    }

    #[test]
    fn test_apply_clear() {
        let settings = AuthSettings::default();
        let codec = TokenCodec::new(SECRET);

        let mut headers = HeaderMap::new();
        apply_cookie_action(&mut headers, &CookieAction::Clear, &codec, &settings);

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
        assert!(cookies[0].starts_with("refresh-session=;"));
        assert!(cookies[1].starts_with("access-session=;"));
    }

    #[test]
    fn test_apply_keep() {
        let settings = AuthSettings::default();
        let codec = TokenCodec::new(SECRET);

        let mut headers = HeaderMap::new();
        apply_cookie_action(&mut headers, &CookieAction::Keep, &codec, &settings);

        assert!(headers.is_empty());
    }
}
