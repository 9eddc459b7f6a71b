//! Metrics recorded by the web layer, read back through `/metrics`

use axum::http::StatusCode;
use chirp_integration_tests::{PASSWORD, TestApp, body_text};

#[tokio::test]
async fn test_workflow_counters() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let id = app.tweet(&alice, "counted").await;

    app.login("alice", "wrongpassword").await;
    app.login("alice", PASSWORD).await;
    app.post_form(&format!("/tweets/{}/delete/", id), Some(&bob), &[])
        .await;
    app.post_form(&format!("/tweets/{}/delete/", id), Some(&alice), &[])
        .await;
    app.post_form(&format!("/tweets/{}/delete/", id), Some(&alice), &[])
        .await;

    let m = &app.metrics;
    assert_eq!(m.signups_total.get(), 2.0);
    assert_eq!(m.logins_total.with_label_values(&["success"]).get(), 1.0);
    assert_eq!(m.logins_total.with_label_values(&["rejected"]).get(), 1.0);
    assert_eq!(m.tweets_created_total.get(), 1.0);
    assert_eq!(m.tweets_deleted_total.get(), 1.0);
    assert_eq!(
        m.tweet_deletes_rejected_total
            .with_label_values(&["not_owner"])
            .get(),
        1.0
    );
    assert_eq!(
        m.tweet_deletes_rejected_total
            .with_label_values(&["not_found"])
            .get(),
        1.0
    );
}

#[tokio::test]
async fn test_request_metrics_use_route_templates() {
    let app = TestApp::spawn().await;
    let alice = app.signup("alice").await;
    let id = app.tweet(&alice, "hello").await;
    app.get(&format!("/tweets/{}/", id), Some(&alice)).await;

    let response = app.get("/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("chirp_http_requests_total"));
    assert!(body.contains("route=\"/tweets/{id}/\""));
    assert!(!body.contains(&format!("route=\"/tweets/{}/\"", id)));
}

#[tokio::test]
async fn test_health_probes() {
    let app = TestApp::spawn().await;

    let response = app.get("/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("ok"));

    let response = app.get("/readyz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}
