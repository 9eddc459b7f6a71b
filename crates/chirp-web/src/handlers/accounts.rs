//! Signup, login, logout and profile handlers

use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    http::header,
    response::Response,
};
use serde::Deserialize;

use chirp_core::accounts::authentication_errors;
use chirp_core::{Error, LoginForm, RequestContext, SessionStarted, SignupForm, ValidationErrors};
use chirp_observability::LoginOutcome;

use super::{nav_user, redirect, render};
use crate::AppState;
use crate::error::WebResult;
use crate::models::{TweetView, field_errors, format_timestamp, non_field_errors};
use crate::session::{CurrentContext, clear_session_cookie, session_cookie};

#[derive(Template)]
#[template(path = "accounts/signup.html")]
struct SignupPage {
    nav_user: Option<String>,
    username: String,
    email: String,
    username_errors: Vec<String>,
    email_errors: Vec<String>,
    password1_errors: Vec<String>,
    password2_errors: Vec<String>,
    non_field_errors: Vec<String>,
}

impl SignupPage {
    fn new(ctx: &RequestContext, form: &SignupForm, errors: &ValidationErrors) -> Self {
        Self {
            nav_user: nav_user(ctx),
            username: form.username.clone(),
            email: form.email.clone(),
            username_errors: field_errors(errors, "username"),
            email_errors: field_errors(errors, "email"),
            password1_errors: field_errors(errors, "password1"),
            password2_errors: field_errors(errors, "password2"),
            non_field_errors: non_field_errors(errors),
        }
    }
}

#[derive(Template)]
#[template(path = "accounts/login.html")]
struct LoginPage {
    nav_user: Option<String>,
    username: String,
    next: String,
    username_errors: Vec<String>,
    password_errors: Vec<String>,
    non_field_errors: Vec<String>,
}

impl LoginPage {
    fn new(ctx: &RequestContext, form: &LoginForm, errors: &ValidationErrors) -> Self {
        Self {
            nav_user: nav_user(ctx),
            username: form.username.clone(),
            next: form.next.clone().unwrap_or_default(),
            username_errors: field_errors(errors, "username"),
            password_errors: field_errors(errors, "password"),
            non_field_errors: non_field_errors(errors),
        }
    }
}

#[derive(Template)]
#[template(path = "accounts/profile.html")]
struct ProfilePage {
    nav_user: Option<String>,
    username: String,
    email: String,
    joined: String,
    tweets: Vec<TweetView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
    next: Option<String>,
}

/// Redirect to the session's landing page and hand the browser its cookie
fn start_session(state: &AppState, started: &SessionStarted) -> WebResult<Response> {
    let mut response = redirect(started.redirect.path());
    response.headers_mut().insert(
        header::SET_COOKIE,
        session_cookie(&state.config, &started.session)?,
    );
    Ok(response)
}

pub async fn signup_page(CurrentContext(ctx): CurrentContext) -> WebResult<Response> {
    render(&SignupPage::new(
        &ctx,
        &SignupForm::default(),
        &ValidationErrors::new(),
    ))
}

pub async fn signup(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Form(form): Form<SignupForm>,
) -> WebResult<Response> {
    match state.accounts.signup(&ctx, form.clone()).await {
        Ok(started) => {
            state.metrics.record_signup();
            start_session(&state, &started)
        }
        Err(Error::Validation(errors)) => render(&SignupPage::new(&ctx, &form, &errors)),
        Err(e) => Err(e.into()),
    }
}

pub async fn login_page(
    CurrentContext(ctx): CurrentContext,
    Query(params): Query<NextParam>,
) -> WebResult<Response> {
    let form = LoginForm {
        next: params.next,
        ..LoginForm::default()
    };
    render(&LoginPage::new(&ctx, &form, &ValidationErrors::new()))
}

pub async fn login(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Form(form): Form<LoginForm>,
) -> WebResult<Response> {
    match state.accounts.login(&ctx, form.clone()).await {
        Ok(started) => {
            state.metrics.record_login(LoginOutcome::Success);
            start_session(&state, &started)
        }
        Err(Error::Validation(errors)) => render(&LoginPage::new(&ctx, &form, &errors)),
        Err(Error::Authentication) => {
            state.metrics.record_login(LoginOutcome::Rejected);
            render(&LoginPage::new(&ctx, &form, &authentication_errors()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> WebResult<Response> {
    let destination = state.accounts.logout(&ctx).await?;
    if ctx.is_authenticated() {
        state.metrics.record_logout();
    }

    let mut response = redirect(destination.path());
    response
        .headers_mut()
        .insert(header::SET_COOKIE, clear_session_cookie(&state.config)?);
    Ok(response)
}

pub async fn profile(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> WebResult<Response> {
    let profile = state.accounts.profile(&ctx).await?;
    render(&ProfilePage {
        nav_user: nav_user(&ctx),
        username: profile.user.username.clone(),
        email: profile.user.email.clone(),
        joined: format_timestamp(&profile.user.created_at),
        tweets: TweetView::list(&profile.tweets, &profile.user),
    })
}
