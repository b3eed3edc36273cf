//! Session cookie parsing and `Set-Cookie` construction.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{HeaderMap, header};
use time::OffsetDateTime;
use time::macros::format_description;

/// Same-site policy attached to a session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Sent on top-level navigations from other sites (refresh cookie)
    Lax,
    /// Never sent cross-site (access cookie)
    Strict,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
        }
    }
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = value.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            if let Some((key, value)) = part.trim().split_once('=') {
                if key.trim() == name {
                    return Some(value.trim());
                }
            }
        }
    }
    None
}

/// Format an instant as an RFC 7231 IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(at: SystemTime) -> Option<String> {
    let secs = at.duration_since(UNIX_EPOCH).ok()?.as_secs();
    let at = OffsetDateTime::from_unix_timestamp(i64::try_from(secs).ok()?).ok()?;
    at.format(format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    ))
    .ok()
}

/// Build the refresh cookie. It expires together with the refresh token itself.
pub fn build_refresh_cookie(name: &str, token: &str, expires: SystemTime) -> Option<String> {
    let expires = http_date(expires)?;
    Some(format!(
        "{}={}; Expires={}; Path=/; Secure; HttpOnly; SameSite={}",
        name,
        token,
        expires,
        SameSite::Lax.as_str()
    ))
}

/// Build the access cookie. No expiration: the token content governs validity.
pub fn build_access_cookie(name: &str, token: &str) -> String {
    format!(
        "{}={}; Path=/; Secure; HttpOnly; SameSite={}",
        name,
        token,
        SameSite::Strict.as_str()
    )
}

/// Build a directive that deletes a cookie in the browser.
pub fn build_clear_cookie(name: &str, same_site: SameSite) -> String {
    format!(
        "{}=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; Path=/; Secure; HttpOnly; SameSite={}",
        name,
        same_site.as_str()
    )
}
