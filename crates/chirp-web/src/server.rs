//! Web server implementation

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

use chirp_observability::{HealthState, health_router};

use crate::AppState;
use crate::handlers::{accounts, static_files, tweets};
use crate::middleware::{login_redirect, security_headers, track_metrics};

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind to (default: 127.0.0.1)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Session cookie lifetime in seconds (default: two weeks)
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Add the `Secure` attribute to the session cookie
    #[serde(default)]
    pub secure_cookie: bool,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8000 }
fn default_cookie_name() -> String { "chirp_session".to_string() }
fn default_session_ttl_secs() -> u64 { 1_209_600 }

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cookie_name: default_cookie_name(),
            session_ttl_secs: default_session_ttl_secs(),
            secure_cookie: false,
        }
    }
}

/// Build the full router: HTML pages, static assets and health endpoints
pub fn build_router(state: AppState, health: HealthState) -> Router {
    let metrics = state.metrics.clone();

    let pages = Router::new()
        .route("/", get(tweets::index))
        // Accounts
        .route(
            "/accounts/signup/",
            get(accounts::signup_page).post(accounts::signup),
        )
        .route(
            "/accounts/login/",
            get(accounts::login_page).post(accounts::login),
        )
        .route("/accounts/logout/", post(accounts::logout))
        .route("/accounts/profile/", get(accounts::profile))
        // Tweets
        .route("/tweets/home/", get(tweets::home))
        .route(
            "/tweets/create/",
            get(tweets::create_page).post(tweets::create),
        )
        .route("/tweets/{id}/", get(tweets::detail))
        .route(
            "/tweets/{id}/delete/",
            get(tweets::confirm_delete).post(tweets::delete),
        )
        // Static assets (embedded in binary)
        .route("/static/css/style.css", get(static_files::serve_css))
        .route_layer(axum_middleware::from_fn_with_state(metrics, track_metrics))
        .layer(axum_middleware::from_fn(login_redirect))
        .layer(axum_middleware::from_fn(security_headers))
        .with_state(state);

    pages
        .merge(health_router(health))
        .layer(TraceLayer::new_for_http())
}

/// Web Server
pub struct WebServer {
    config: WebConfig,
    state: AppState,
    health: HealthState,
}

impl WebServer {
    /// Create a new web server
    pub fn new(state: AppState, health: HealthState) -> Self {
        Self {
            config: state.config.clone(),
            state,
            health,
        }
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

        let router = build_router(self.state, self.health);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Chirp listening on http://{}", addr);
        info!("   Home:        http://{}/tweets/home/", addr);
        info!("   Health:      http://{}/healthz", addr);
        info!("   Metrics:     http://{}/metrics", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
