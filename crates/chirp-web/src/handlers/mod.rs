//! HTTP handlers

pub mod accounts;
pub mod static_files;
pub mod tweets;

use askama::Template;
use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};

use chirp_core::RequestContext;

use crate::error::WebResult;

/// 302 Found to a local path
pub fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn render<T: Template>(page: &T) -> WebResult<Response> {
    Ok(Html(page.render()?).into_response())
}

/// Username shown in the navigation bar
fn nav_user(ctx: &RequestContext) -> Option<String> {
    ctx.user().map(|user| user.username.clone())
}
