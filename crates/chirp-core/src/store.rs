//! Store traits for users, sessions and tweets
//!
//! The workflows only talk to these traits, which keeps them independent of
//! the storage backend.
//!
//! Implementations:
//! - `SqliteStore` (chirp-store-sqlite): SQLite via sqlx, used by the server
//! - `InMemoryStore` (`crate::memory`): process-local maps, used by tests

use async_trait::async_trait;

use crate::types::{NewUser, SessionKey, Tweet, TweetId, User, UserId};
use crate::Result;

/// Identity collaborator: account creation and credential checks.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user, hashing the password before it is stored.
    ///
    /// # Errors
    /// - `Error::DuplicateUsername` if the username is already taken
    /// - `Error::Database` / `Error::PasswordHash` for backend failures
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    /// Return the user when `username` exists and `password` matches its hash.
    /// Unknown usernames and wrong passwords both yield `Ok(None)`.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>>;

    async fn username_exists(&self, username: &str) -> Result<bool>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
}

/// Server-side sessions associating a cookie key with a user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a new session for `user` and return its key.
    async fn start_session(&self, user: UserId) -> Result<SessionKey>;

    /// End a session. Ending an unknown or already-ended session is not an error.
    async fn end_session(&self, key: &SessionKey) -> Result<()>;

    /// Resolve a session key to its user. Expired sessions resolve to `None`.
    async fn current_user(&self, key: &SessionKey) -> Result<Option<User>>;

    /// Number of unexpired sessions held by `user`.
    async fn active_sessions(&self, user: UserId) -> Result<usize>;
}

/// Result of an ownership-checked delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    NotOwner,
}

/// Persistence collaborator for tweets.
#[async_trait]
pub trait TweetStore: Send + Sync {
    async fn create_tweet(&self, owner: UserId, content: &str) -> Result<Tweet>;

    /// Every tweet, newest first.
    async fn list_tweets(&self) -> Result<Vec<Tweet>>;

    /// Tweets of one owner, newest first.
    async fn list_tweets_by_owner(&self, owner: UserId) -> Result<Vec<Tweet>>;

    async fn get_tweet(&self, id: TweetId) -> Result<Option<Tweet>>;

    /// Delete `id` only if `requester` owns it.
    ///
    /// The existence check, the ownership check and the delete happen as one
    /// atomic unit: of two concurrent calls for the same tweet, exactly one
    /// returns `Deleted` and the other `NotFound`.
    async fn delete_owned_tweet(&self, id: TweetId, requester: UserId) -> Result<DeleteOutcome>;
}
