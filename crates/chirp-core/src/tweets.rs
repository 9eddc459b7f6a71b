//! Tweet workflow: list, create, view and owner-only delete

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::context::{Destination, RequestContext};
use crate::store::{DeleteOutcome, TweetStore};
use crate::types::{Tweet, TweetId};
use crate::validation::{self, TWEET_MAX_LENGTH, ValidationErrors};
use crate::{Error, Result};

/// Submitted tweet form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TweetForm {
    #[serde(default)]
    pub content: String,
}

/// A tweet that was just stored, plus where to go next.
#[derive(Debug, Clone)]
pub struct Created {
    pub tweet: Tweet,
    pub redirect: Destination,
}

#[derive(Clone)]
pub struct TweetWorkflow {
    tweets: Arc<dyn TweetStore>,
}

impl TweetWorkflow {
    pub fn new(tweets: Arc<dyn TweetStore>) -> Self {
        Self { tweets }
    }

    /// All tweets, newest first.
    pub async fn list_tweets(&self, ctx: &RequestContext) -> Result<Vec<Tweet>> {
        ctx.require_user()?;
        self.tweets.list_tweets().await
    }

    pub async fn create_tweet(&self, ctx: &RequestContext, form: TweetForm) -> Result<Created> {
        let user = ctx.require_user()?;
        let content = validate_content(&form.content)?;

        let tweet = self.tweets.create_tweet(user.id, content).await?;
        info!(tweet_id = %tweet.id, user_id = %user.id, "Tweet created");
        Ok(Created {
            tweet,
            redirect: Destination::TweetList,
        })
    }

    pub async fn get_tweet(&self, ctx: &RequestContext, id: TweetId) -> Result<Tweet> {
        ctx.require_user()?;
        self.tweets
            .get_tweet(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("tweet {}", id)))
    }

    /// Load a tweet for the delete confirmation page. Applies the same
    /// existence and ownership checks as `delete_tweet` without deleting.
    pub async fn confirm_delete(&self, ctx: &RequestContext, id: TweetId) -> Result<Tweet> {
        let user = ctx.require_user()?;
        let tweet = self
            .tweets
            .get_tweet(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("tweet {}", id)))?;
        if !tweet.is_owned_by(user) {
            return Err(Error::Forbidden(format!("tweet {} belongs to another user", id)));
        }
        Ok(tweet)
    }

    pub async fn delete_tweet(&self, ctx: &RequestContext, id: TweetId) -> Result<Destination> {
        let user = ctx.require_user()?;
        match self.tweets.delete_owned_tweet(id, user.id).await? {
            DeleteOutcome::Deleted => {
                info!(tweet_id = %id, user_id = %user.id, "Tweet deleted");
                Ok(Destination::TweetList)
            }
            DeleteOutcome::NotFound => Err(Error::NotFound(format!("tweet {}", id))),
            DeleteOutcome::NotOwner => {
                warn!(tweet_id = %id, user_id = %user.id, "Rejected delete by non-owner");
                Err(Error::Forbidden(format!("tweet {} belongs to another user", id)))
            }
        }
    }
}

/// Trim tweet content and check it is present and at most 140 characters.
pub fn validate_content(raw: &str) -> Result<&str> {
    let mut errors = ValidationErrors::new();
    let content = validation::required(&mut errors, "content", raw)
        .filter(|content| validation::max_length(&mut errors, "content", content, TWEET_MAX_LENGTH));
    match content {
        Some(content) => Ok(content),
        None => Err(Error::Validation(errors)),
    }
}
