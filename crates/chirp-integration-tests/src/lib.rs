//! End-to-end test harness for Chirp
//!
//! Builds the full web router over a SQLite database in a temporary
//! directory and drives it with in-process requests.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use chirp_core::password::PasswordHashing;
use chirp_observability::{HealthState, Metrics};
use chirp_store_sqlite::{SqliteStore, SqliteStoreConfig};
use chirp_web::{AppState, WebConfig, build_router};
use http_body_util::BodyExt;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "testpassword";

/// A running application with its own database
pub struct TestApp {
    pub router: Router,
    pub store: Arc<SqliteStore>,
    pub metrics: Arc<Metrics>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let config = SqliteStoreConfig {
            hashing: PasswordHashing {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..SqliteStoreConfig::default()
        };
        let store = Arc::new(
            SqliteStore::open(dir.path().join("chirp.db"), config)
                .await
                .expect("open store"),
        );
        let metrics = Arc::new(Metrics::new().expect("create metrics"));
        let state = AppState::new(store.clone(), metrics.clone(), WebConfig::default());
        let router = build_router(state, HealthState::new(metrics.clone()));

        Self {
            router,
            store,
            metrics,
            _dir: dir,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("build request"))
            .await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, form: &[(&str, &str)]) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(encode_form(form))).expect("build request"))
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Sign up with the shared test password and return the session cookie
    pub async fn signup(&self, username: &str) -> String {
        let email = format!("{}@example.com", username);
        let response = self
            .post_form(
                "/accounts/signup/",
                None,
                &[
                    ("username", username),
                    ("email", &email),
                    ("password1", PASSWORD),
                    ("password2", PASSWORD),
                ],
            )
            .await;
        assert_eq!(response.status(), StatusCode::FOUND, "signup of {} failed", username);
        session_cookie(&response).expect("signup sets a session cookie")
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.post_form(
            "/accounts/login/",
            None,
            &[("username", username), ("password", password)],
        )
        .await
    }

    /// Post a tweet and return its id
    pub async fn tweet(&self, cookie: &str, content: &str) -> i64 {
        let response = self
            .post_form("/tweets/create/", Some(cookie), &[("content", content)])
            .await;
        assert_eq!(response.status(), StatusCode::FOUND);

        use chirp_core::TweetStore;
        let tweets = self.store.list_tweets().await.expect("list tweets");
        tweets
            .iter()
            .find(|t| t.content == content.trim())
            .map(|t| t.id.0)
            .expect("tweet was stored")
    }

    pub async fn tweet_count(&self) -> usize {
        use chirp_core::TweetStore;
        self.store.list_tweets().await.expect("list tweets").len()
    }
}

/// `application/x-www-form-urlencoded` body for `pairs`
pub fn encode_form(pairs: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(pairs).expect("string pairs always encode")
}

/// The `name=value` part of the response's `Set-Cookie` header
pub fn session_cookie(response: &Response) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    value.split(';').next().map(str::to_string)
}

pub fn location(response: &Response) -> Option<&str> {
    response.headers().get(header::LOCATION)?.to_str().ok()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}
