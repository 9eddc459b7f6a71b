//! Tweet list, create, detail and delete handlers

use askama::Template;
use axum::{
    Form,
    extract::{Path, State},
    response::Response,
};

use chirp_core::{Destination, Error, TweetForm, TweetId};
use chirp_observability::DeleteRejection;

use super::{nav_user, redirect, render};
use crate::AppState;
use crate::error::WebResult;
use crate::models::{TweetView, field_errors};
use crate::session::CurrentContext;

#[derive(Template)]
#[template(path = "tweets/home.html")]
struct HomePage {
    nav_user: Option<String>,
    tweets: Vec<TweetView>,
}

#[derive(Template)]
#[template(path = "tweets/create.html")]
struct CreatePage {
    nav_user: Option<String>,
    content: String,
    content_errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "tweets/detail.html")]
struct DetailPage {
    nav_user: Option<String>,
    tweet: TweetView,
}

#[derive(Template)]
#[template(path = "tweets/delete.html")]
struct DeletePage {
    nav_user: Option<String>,
    tweet: TweetView,
}

/// Unparseable ids are reported like missing tweets
fn parse_tweet_id(raw: &str) -> Result<TweetId, Error> {
    raw.parse()
        .map_err(|_| Error::NotFound(format!("tweet {}", raw)))
}

pub async fn index() -> Response {
    redirect(Destination::TWEET_LIST_PATH)
}

pub async fn home(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> WebResult<Response> {
    let tweets = state.tweets.list_tweets(&ctx).await?;
    let viewer = ctx.require_user()?;
    render(&HomePage {
        nav_user: nav_user(&ctx),
        tweets: TweetView::list(&tweets, viewer),
    })
}

pub async fn create_page(CurrentContext(ctx): CurrentContext) -> WebResult<Response> {
    ctx.require_user()?;
    render(&CreatePage {
        nav_user: nav_user(&ctx),
        content: String::new(),
        content_errors: Vec::new(),
    })
}

pub async fn create(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Form(form): Form<TweetForm>,
) -> WebResult<Response> {
    match state.tweets.create_tweet(&ctx, form.clone()).await {
        Ok(created) => {
            state.metrics.record_tweet_created();
            Ok(redirect(created.redirect.path()))
        }
        Err(Error::Validation(errors)) => render(&CreatePage {
            nav_user: nav_user(&ctx),
            content: form.content,
            content_errors: field_errors(&errors, "content"),
        }),
        Err(e) => Err(e.into()),
    }
}

pub async fn detail(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(raw_id): Path<String>,
) -> WebResult<Response> {
    let viewer = ctx.require_user()?;
    let id = parse_tweet_id(&raw_id)?;
    let tweet = state.tweets.get_tweet(&ctx, id).await?;
    render(&DetailPage {
        nav_user: nav_user(&ctx),
        tweet: TweetView::new(&tweet, viewer),
    })
}

pub async fn confirm_delete(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(raw_id): Path<String>,
) -> WebResult<Response> {
    let viewer = ctx.require_user()?;
    let id = parse_tweet_id(&raw_id)?;
    let tweet = state.tweets.confirm_delete(&ctx, id).await?;
    render(&DeletePage {
        nav_user: nav_user(&ctx),
        tweet: TweetView::new(&tweet, viewer),
    })
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(raw_id): Path<String>,
) -> WebResult<Response> {
    ctx.require_user()?;
    let id = parse_tweet_id(&raw_id)?;
    match state.tweets.delete_tweet(&ctx, id).await {
        Ok(destination) => {
            state.metrics.record_tweet_deleted();
            Ok(redirect(destination.path()))
        }
        Err(e) => {
            match &e {
                Error::NotFound(_) => state.metrics.record_delete_rejected(DeleteRejection::NotFound),
                Error::Forbidden(_) => state.metrics.record_delete_rejected(DeleteRejection::NotOwner),
                _ => {}
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tweet_id() {
        assert_eq!(parse_tweet_id("42").unwrap(), TweetId(42));
        assert!(matches!(parse_tweet_id("abc"), Err(Error::NotFound(_))));
        assert!(matches!(parse_tweet_id(""), Err(Error::NotFound(_))));
    }
}
