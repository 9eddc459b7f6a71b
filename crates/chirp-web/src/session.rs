//! Session cookie handling and the request context extractor

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use tracing::debug;

use chirp_core::{RequestContext, SessionKey};

use crate::error::WebError;
use crate::server::WebConfig;
use crate::AppState;

/// Find a cookie value by name in the request headers
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value that stores a session key in the browser
pub fn session_cookie(config: &WebConfig, key: &SessionKey) -> Result<HeaderValue, WebError> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        config.cookie_name,
        key.as_str(),
        config.session_ttl_secs
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(config: &WebConfig) -> Result<HeaderValue, WebError> {
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        config.cookie_name
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    Ok(HeaderValue::from_str(&cookie)?)
}

/// Who is making the request, resolved from the session cookie.
///
/// Never rejects an anonymous request: handlers decide through the workflow
/// whether authentication is required.
pub struct CurrentContext(pub RequestContext);

impl FromRequestParts<AppState> for CurrentContext {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(raw) = parse_cookie(&parts.headers, &state.config.cookie_name) else {
            return Ok(Self(RequestContext::anonymous()));
        };
        let Some(key) = SessionKey::parse(&raw) else {
            debug!("Ignoring malformed session cookie");
            return Ok(Self(RequestContext::anonymous()));
        };

        let ctx = match state.sessions.current_user(&key).await? {
            Some(user) => RequestContext::authenticated(key, user),
            None => RequestContext::with_stale_session(key),
        };
        Ok(Self(ctx))
    }
}
