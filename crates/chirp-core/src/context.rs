//! Per-request context and redirect destinations
//!
//! The web layer resolves the session cookie once per request and hands the
//! result to every workflow call as a `RequestContext`. Workflows never look up
//! session state on their own.

use crate::types::{SessionKey, User};
use crate::{Error, Result};

/// Who is making the current request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    session: Option<SessionKey>,
    user: Option<User>,
}

impl RequestContext {
    /// Context for a caller without a valid session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context for a caller whose session resolved to `user`.
    pub fn authenticated(session: SessionKey, user: User) -> Self {
        Self {
            session: Some(session),
            user: Some(user),
        }
    }

    /// Context carrying a session key that did not resolve to a user.
    pub fn with_stale_session(session: SessionKey) -> Self {
        Self {
            session: Some(session),
            user: None,
        }
    }

    pub fn session(&self) -> Option<&SessionKey> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Guard used by every operation that needs a logged-in caller.
    pub fn require_user(&self) -> Result<&User> {
        self.user.as_ref().ok_or(Error::AuthenticationRequired)
    }
}

/// Where the caller should be sent after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The tweet list (post-login landing page)
    TweetList,
    /// The login form (post-logout landing page)
    Login,
    /// A local path requested by the caller before logging in
    Local(String),
}

impl Destination {
    pub const TWEET_LIST_PATH: &'static str = "/tweets/home/";
    pub const LOGIN_PATH: &'static str = "/accounts/login/";

    pub fn path(&self) -> &str {
        match self {
            Destination::TweetList => Self::TWEET_LIST_PATH,
            Destination::Login => Self::LOGIN_PATH,
            Destination::Local(path) => path,
        }
    }

    /// Accept a caller-supplied `next` path only when it stays on this site.
    pub fn from_next(next: Option<&str>) -> Self {
        match next.map(str::trim) {
            Some(path) if is_safe_local_path(path) => Destination::Local(path.to_string()),
            _ => Destination::TweetList,
        }
    }
}

fn is_safe_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.starts_with("/\\")
        && !path.chars().any(|c| c.is_control())
}
