//! The gateway middleware: inspect, maybe refresh, forward, translate.
//!
//! | Session     | Request                               | Response cookies      |
//! |-------------|---------------------------------------|-----------------------|
//! | NoSession   | unchanged                             | untouched             |
//! | Valid       | `Authorization: Bearer <access>`      | untouched             |
//! | Refreshable | refresh, then `Bearer <new access>`   | rotated               |
//! | (failed)    | unchanged                             | untouched             |
//! | Expired     | unchanged                             | cleared               |
//! | Invalid     | unchanged                             | cleared               |
//!
//! Requests to the refresh endpoint carry the refresh token as bearer instead
//! and are never refreshed by the gateway (`SessionClass::Refreshable`).
//! A cookie session combined with explicit token headers is rejected outright.

use std::time::SystemTime;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::cookie::get_cookie;
use super::errors::GatewayError;
use super::session::{Session, SessionClass, classify};
use super::state::GatewayState;
use super::translate::{
    CookieAction, apply_cookie_action, reject_ambiguous, set_bearer, take_rotated_tokens,
};

/// Axum middleware arranging credentials for the wrapped handler.
///
/// Install with `axum::middleware::from_fn_with_state(state, authenticate_session)`.
pub async fn authenticate_session(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    let now = SystemTime::now();

    let (class, action) = match prepare_request(&state, &mut request, now).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(path = %request.uri().path(), error = %e, "Rejected request");
            return e.into_response();
        }
    };
    debug!(path = %request.uri().path(), session = ?class, "Session classified");
    request.extensions_mut().insert(class);

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    // A usable rotation signalled by the downstream handler supersedes our own.
    let action = match take_rotated_tokens(headers, &state.settings) {
        Some(pair) if state.codec.expiration_of(&pair.refresh).is_ok() => CookieAction::Rotate(pair),
        Some(_) => {
            warn!("Rotated refresh token from handler does not verify, ignoring it");
            action
        }
        None => action,
    };
    apply_cookie_action(headers, &action, &state.codec, &state.settings);

    response
}

/// Classify the session and rewrite the request's `Authorization` header.
async fn prepare_request(
    state: &GatewayState,
    request: &mut Request,
    now: SystemTime,
) -> Result<(SessionClass, CookieAction), GatewayError> {
    let settings = &state.settings;
    let headers = request.headers();

    let refresh = get_cookie(headers, &settings.refresh_cookie).filter(|v| !v.is_empty());
    if refresh.is_none() {
        return Ok((SessionClass::NoSession, CookieAction::Keep));
    }
    reject_ambiguous(headers, settings)?;

    let access = get_cookie(headers, &settings.access_cookie);
    let session = classify(&state.codec, refresh, access, now, settings.clock_skew);
    let to_refresh_endpoint = request.uri().path() == settings.refresh_path;

    match session {
        Session::NoSession => Ok((SessionClass::NoSession, CookieAction::Keep)),
        Session::Valid { refresh, access } => {
            let bearer = if to_refresh_endpoint { refresh } else { access };
            forward_as(request, &bearer);
            Ok((SessionClass::Valid, CookieAction::Keep))
        }
        // The request itself performs the rotation, so no refresh call of our own.
        Session::Refreshable { refresh } if to_refresh_endpoint => {
            forward_as(request, &refresh);
            Ok((SessionClass::Refreshable, CookieAction::Keep))
        }
        Session::Refreshable { refresh } => match state.refresher.refresh(&refresh).await {
            Ok(pair) if forward_as(request, &pair.access) => {
                Ok((SessionClass::Refreshed, CookieAction::Rotate(pair)))
            }
            Ok(_) => Ok((SessionClass::RefreshFailed, CookieAction::Keep)),
            Err(e) => {
                warn!(error = %e, "Refreshing the session failed, continuing anonymously");
                Ok((SessionClass::RefreshFailed, CookieAction::Keep))
            }
        },
        Session::Expired => {
            debug!("Refresh token expired, clearing session cookies");
            Ok((SessionClass::Expired, CookieAction::Clear))
        }
        Session::Invalid(e) => {
            warn!(error = %e, "Session cookie failed validation, clearing session cookies");
            Ok((SessionClass::Invalid, CookieAction::Clear))
        }
    }
}

/// Set the bearer credential, logging when the token cannot be sent as a header.
fn forward_as(request: &mut Request, token: &str) -> bool {
    let forwarded = set_bearer(request.headers_mut(), token);
    if !forwarded {
        warn!("Token is not a valid header value, forwarding without credentials");
    }
    forwarded
}
