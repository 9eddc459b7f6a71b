//! Mapping of workflow errors to HTTP responses

use askama::Template;
use axum::{
    http::{StatusCode, header::InvalidHeaderValue},
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use chirp_core::{Destination, Error};

use crate::handlers::redirect;
use crate::middleware::LoginRequired;

#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    Core(#[from] Error),

    #[error("Template rendering failed: {0}")]
    Template(#[from] askama::Error),

    #[error("Invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorPage {
    nav_user: Option<String>,
    status: u16,
    title: &'static str,
    message: &'static str,
}

fn error_page(status: StatusCode, title: &'static str, message: &'static str) -> Response {
    let page = ErrorPage {
        nav_user: None,
        status: status.as_u16(),
        title,
        message,
    };
    match page.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render error page");
            (status, title).into_response()
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::Core(Error::AuthenticationRequired) => {
                // The login_redirect middleware appends ?next= for the original path
                let mut response = redirect(Destination::LOGIN_PATH);
                response.extensions_mut().insert(LoginRequired);
                response
            }
            WebError::Core(Error::NotFound(what)) => {
                debug!(%what, "Not found");
                error_page(
                    StatusCode::NOT_FOUND,
                    "Not Found",
                    "The requested page could not be found.",
                )
            }
            WebError::Core(Error::Forbidden(reason)) => {
                debug!(%reason, "Forbidden");
                error_page(
                    StatusCode::FORBIDDEN,
                    "Forbidden",
                    "You do not have permission to perform this action.",
                )
            }
            WebError::Core(e) if e.is_client_error() => {
                debug!(error = %e, "Bad request");
                error_page(
                    StatusCode::BAD_REQUEST,
                    "Bad Request",
                    "The request could not be processed.",
                )
            }
            other => {
                error!(error = %other, "Request failed");
                error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server Error",
                    "Something went wrong. Please try again later.",
                )
            }
        }
    }
}
