//! Chirp Web
//!
//! HTML front end for the account and tweet workflows. Templates and CSS are
//! compiled into the binary.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;
pub mod session;

pub use error::{WebError, WebResult};
pub use server::{WebConfig, WebServer, build_router};

use std::sync::Arc;

use chirp_core::{AccountWorkflow, SessionStore, TweetStore, TweetWorkflow, UserStore};
use chirp_observability::Metrics;

/// Shared application state for the web server
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountWorkflow,
    pub tweets: TweetWorkflow,
    pub sessions: Arc<dyn SessionStore>,
    pub metrics: Arc<Metrics>,
    pub config: WebConfig,
}

impl AppState {
    /// Wire both workflows to one store implementing every store trait
    pub fn new<S>(store: Arc<S>, metrics: Arc<Metrics>, config: WebConfig) -> Self
    where
        S: UserStore + SessionStore + TweetStore + 'static,
    {
        Self {
            accounts: AccountWorkflow::new(store.clone(), store.clone(), store.clone()),
            tweets: TweetWorkflow::new(store.clone()),
            sessions: store,
            metrics,
            config,
        }
    }
}
