//! View models handed to templates

use chrono::{DateTime, Utc};

use chirp_core::{Tweet, User, ValidationErrors};
use chirp_core::validation::NON_FIELD_ERRORS;

/// A tweet prepared for display
#[derive(Debug, Clone)]
pub struct TweetView {
    pub id: i64,
    pub author: String,
    pub content: String,
    pub created_at: String,
    /// The viewer owns this tweet and may delete it
    pub is_own: bool,
}

impl TweetView {
    pub fn new(tweet: &Tweet, viewer: &User) -> Self {
        Self {
            id: tweet.id.0,
            author: tweet.author.clone(),
            content: tweet.content.clone(),
            created_at: format_timestamp(&tweet.created_at),
            is_own: tweet.is_owned_by(viewer),
        }
    }

    pub fn list(tweets: &[Tweet], viewer: &User) -> Vec<Self> {
        tweets.iter().map(|t| Self::new(t, viewer)).collect()
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y, %H:%M UTC").to_string()
}

/// Error messages of one form field, empty when the field is valid
pub fn field_errors(errors: &ValidationErrors, field: &str) -> Vec<String> {
    errors.get(field).to_vec()
}

pub fn non_field_errors(errors: &ValidationErrors) -> Vec<String> {
    field_errors(errors, NON_FIELD_ERRORS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_core::{TweetId, UserId};
    use chrono::TimeZone;

    fn user(id: i64, name: &str) -> User {
        User {
            id: UserId(id),
            username: name.to_string(),
            email: format!("{}@example.com", name),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_tweet_view_ownership() {
        let alice = user(1, "alice");
        let bob = user(2, "bob");
        let tweet = Tweet {
            id: TweetId(7),
            owner: alice.id,
            author: "alice".to_string(),
            content: "hello".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
        };

        let own = TweetView::new(&tweet, &alice);
        assert!(own.is_own);
        assert_eq!(own.id, 7);
        assert_eq!(own.created_at, "Mar 5, 2024, 14:30 UTC");

        assert!(!TweetView::new(&tweet, &bob).is_own);
    }

    #[test]
    fn test_field_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("username", "taken");
        errors.add(NON_FIELD_ERRORS, "bad login");

        assert_eq!(field_errors(&errors, "username"), vec!["taken".to_string()]);
        assert!(field_errors(&errors, "email").is_empty());
        assert_eq!(non_field_errors(&errors), vec!["bad login".to_string()]);
    }
}
