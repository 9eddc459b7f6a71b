//! In-memory implementation of every store trait
//!
//! Backs the workflow tests and any caller that wants a throwaway instance.
//! Each operation runs under a single mutex, so compound operations such as
//! `delete_owned_tweet` are atomic just like a database transaction.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::password::{self, PasswordHashing};
use crate::store::{DeleteOutcome, SessionStore, TweetStore, UserStore};
use crate::types::{NewUser, SessionKey, Tweet, TweetId, User, UserId};
use crate::{Error, Result};

struct StoredUser {
    user: User,
    password_hash: String,
}

struct StoredSession {
    user: UserId,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: BTreeMap<UserId, StoredUser>,
    tweets: BTreeMap<TweetId, Tweet>,
    sessions: HashMap<SessionKey, StoredSession>,
    next_user_id: i64,
    next_tweet_id: i64,
}

pub struct InMemoryStore {
    state: Mutex<State>,
    hashing: PasswordHashing,
    session_ttl: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_options(PasswordHashing::default(), Duration::weeks(2))
    }

    pub fn with_options(hashing: PasswordHashing, session_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            hashing,
            session_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave State half-written
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn tweet_count(&self) -> usize {
        self.lock().tweets.len()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }
}

fn newest_first(mut tweets: Vec<Tweet>) -> Vec<Tweet> {
    tweets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    tweets
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        // Hash outside the lock; it is the slow part
        let password_hash = self.hashing.hash(&new_user.password)?;

        let mut state = self.lock();
        if state
            .users
            .values()
            .any(|u| u.user.username == new_user.username)
        {
            return Err(Error::DuplicateUsername(new_user.username));
        }
        state.next_user_id += 1;
        let user = User {
            id: UserId(state.next_user_id),
            username: new_user.username,
            email: new_user.email,
            created_at: Utc::now(),
        };
        state.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let stored = {
            let state = self.lock();
            state
                .users
                .values()
                .find(|u| u.user.username == username)
                .map(|u| (u.user.clone(), u.password_hash.clone()))
        };
        Ok(stored
            .filter(|(_, hash)| password::verify_password(password, hash))
            .map(|(user, _)| user))
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(self
            .lock()
            .users
            .values()
            .any(|u| u.user.username == username))
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.lock().users.get(&id).map(|u| u.user.clone()))
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn start_session(&self, user: UserId) -> Result<SessionKey> {
        let key = SessionKey::generate();
        let expires_at = Utc::now() + self.session_ttl;
        self.lock()
            .sessions
            .insert(key.clone(), StoredSession { user, expires_at });
        Ok(key)
    }

    async fn end_session(&self, key: &SessionKey) -> Result<()> {
        self.lock().sessions.remove(key);
        Ok(())
    }

    async fn current_user(&self, key: &SessionKey) -> Result<Option<User>> {
        let state = self.lock();
        let Some(session) = state.sessions.get(key) else {
            return Ok(None);
        };
        if session.expires_at <= Utc::now() {
            return Ok(None);
        }
        Ok(state.users.get(&session.user).map(|u| u.user.clone()))
    }

    async fn active_sessions(&self, user: UserId) -> Result<usize> {
        let now = Utc::now();
        Ok(self
            .lock()
            .sessions
            .values()
            .filter(|s| s.user == user && s.expires_at > now)
            .count())
    }
}

#[async_trait]
impl TweetStore for InMemoryStore {
    async fn create_tweet(&self, owner: UserId, content: &str) -> Result<Tweet> {
        let mut state = self.lock();
        let author = state
            .users
            .get(&owner)
            .map(|u| u.user.username.clone())
            .ok_or_else(|| Error::Database(format!("user {} does not exist", owner)))?;
        state.next_tweet_id += 1;
        let tweet = Tweet {
            id: TweetId(state.next_tweet_id),
            owner,
            author,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        state.tweets.insert(tweet.id, tweet.clone());
        Ok(tweet)
    }

    async fn list_tweets(&self) -> Result<Vec<Tweet>> {
        let tweets = self.lock().tweets.values().cloned().collect();
        Ok(newest_first(tweets))
    }

    async fn list_tweets_by_owner(&self, owner: UserId) -> Result<Vec<Tweet>> {
        let tweets = self
            .lock()
            .tweets
            .values()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect();
        Ok(newest_first(tweets))
    }

    async fn get_tweet(&self, id: TweetId) -> Result<Option<Tweet>> {
        Ok(self.lock().tweets.get(&id).cloned())
    }

    async fn delete_owned_tweet(&self, id: TweetId, requester: UserId) -> Result<DeleteOutcome> {
        let mut state = self.lock();
        let outcome = match state.tweets.get(&id) {
            None => DeleteOutcome::NotFound,
            Some(tweet) if tweet.owner != requester => DeleteOutcome::NotOwner,
            Some(_) => DeleteOutcome::Deleted,
        };
        if outcome == DeleteOutcome::Deleted {
            state.tweets.remove(&id);
        }
        Ok(outcome)
    }
}
