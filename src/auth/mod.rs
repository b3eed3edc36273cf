//! Cookie-session to bearer-token gateway.
//!
//! Browsers hold a long-lived refresh token and a short-lived access token in
//! two HTTP-only cookies. Downstream APIs only understand bearer tokens. The
//! middleware in this module converts one into the other, transparently
//! refreshes an expired access token, and turns rotated tokens signalled by
//! downstream handlers back into cookies.

mod cookie;
mod errors;
mod middleware;
mod refresh;
mod session;
mod state;
mod translate;

pub use cookie::{
    SameSite, build_access_cookie, build_clear_cookie, build_refresh_cookie, get_cookie,
    http_date,
};
pub use errors::GatewayError;
pub use middleware::authenticate_session;
pub use refresh::{HttpRefreshClient, RefreshError, TokenPair, TokenRefresher};
pub use session::{Session, SessionClass, classify};
pub use state::{
    ACCESS_COOKIE_NAME, ACCESS_TOKEN_HEADER, AuthSettings, GatewayState, REFRESH_COOKIE_NAME,
    REFRESH_ENDPOINT_PATH, REFRESH_TOKEN_HEADER,
};
pub use translate::{
    CookieAction, apply_cookie_action, reject_ambiguous, set_bearer, take_rotated_tokens,
};
