//! `AuthenticatedUser` extractor: resolves the caller's session into an
//! [`Identity`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;

use crate::app_state::AppState;
use crate::domain::Identity;
use crate::error::HubError;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Header consulted when no session cookie is present.
pub const SESSION_HEADER: &str = "x-session-token";

/// Identity of the caller, resolved from its session token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Identity);

impl std::ops::Deref for AuthenticatedUser {
    type Target = Identity;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Returns the session token carried by a request, preferring the cookie.
fn session_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    parts
        .headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = HubError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(HubError::Unauthorized)?;
        let identity = state
            .sessions
            .resolve(&token)
            .await?
            .ok_or(HubError::Unauthorized)?;
        Ok(Self(identity))
    }
}
