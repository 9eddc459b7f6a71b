//! Shared web middleware

use axum::{
    extract::{MatchedPath, Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use chirp_observability::Metrics;

/// Response extension set by error responses that send the visitor to log in
#[derive(Debug, Clone, Copy)]
pub struct LoginRequired;

/// Append `?next=<original path>` to login redirects so the visitor returns
/// to the page they asked for.
pub async fn login_redirect(req: Request, next: Next) -> Response {
    let original = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut response = next.run(req).await;
    if response.extensions().get::<LoginRequired>().is_none() {
        return response;
    }

    let Some(login) = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
    else {
        return response;
    };

    match next_query(&original)
        .map(|query| format!("{}?{}", login, query))
        .and_then(|location| HeaderValue::from_str(&location).map_err(|e| e.to_string()))
    {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(e) => warn!(error = %e, "Could not build login redirect"),
    }
    response
}

/// `next=<path>` query string for the login page
fn next_query(path: &str) -> Result<String, String> {
    serde_urlencoded::to_string([("next", path)]).map_err(|e| e.to_string())
}

/// Record request count and latency by matched route
pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    metrics.record_http_request(
        &method,
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Middleware to add security headers
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("same-origin"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
    };
    use tower::ServiceExt;

    async fn needs_login() -> Response {
        let mut response = (
            StatusCode::FOUND,
            [(header::LOCATION, "/accounts/login/")],
        )
            .into_response();
        response.extensions_mut().insert(LoginRequired);
        response
    }

    async fn plain_redirect() -> Response {
        (StatusCode::FOUND, [(header::LOCATION, "/elsewhere/")]).into_response()
    }

    #[test]
    fn test_next_query() {
        assert_eq!(next_query("/tweets/home/").unwrap(), "next=%2Ftweets%2Fhome%2F");
        assert_eq!(
            next_query("/tweets/?a=1&b=2").unwrap(),
            "next=%2Ftweets%2F%3Fa%3D1%26b%3D2"
        );
    }

    #[tokio::test]
    async fn test_login_redirect_appends_next() {
        let app = Router::new()
            .route("/tweets/create/", get(needs_login))
            .layer(middleware::from_fn(login_redirect));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/tweets/create/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/accounts/login/?next=%2Ftweets%2Fcreate%2F"
        );
    }

    #[tokio::test]
    async fn test_login_redirect_leaves_other_redirects() {
        let app = Router::new()
            .route("/go/", get(plain_redirect))
            .layer(middleware::from_fn(login_redirect));

        let response = app
            .oneshot(Request::builder().uri("/go/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/elsewhere/"
        );
    }

    #[tokio::test]
    async fn test_security_headers() {
        let app = Router::new()
            .route("/", get(|| async { "OK" }))
            .layer(middleware::from_fn(security_headers));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::X_FRAME_OPTIONS).unwrap(),
            "DENY"
        );
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
    }
}
