//! Static file handlers - embedded in binary

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// Serve embedded CSS
pub async fn serve_css() -> Response {
    let css = include_str!("../static/css/style.css");
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        css,
    )
        .into_response()
}
