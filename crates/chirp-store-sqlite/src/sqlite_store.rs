//! SqliteStore - store trait implementations over one SQLite pool

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};
use std::path::Path;
use tracing::{debug, info};

use chirp_core::password::{self, PasswordHashing};
use chirp_core::{
    DeleteOutcome, Error, NewUser, Result, SessionKey, SessionStore, Tweet, TweetId, TweetStore,
    User, UserId, UserStore,
};

use crate::schema::{self, db_error};

/// Connection and security settings for a [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Maximum pooled connections
    pub max_connections: u32,
    /// Lifetime of a new session
    pub session_ttl: Duration,
    /// Argon2 cost for new password hashes
    pub hashing: PasswordHashing,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            session_ttl: Duration::weeks(2),
            hashing: PasswordHashing::default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId(row.id),
            username: row.username,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[derive(sqlx::FromRow)]
struct TweetRow {
    id: i64,
    owner_id: i64,
    author: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<TweetRow> for Tweet {
    fn from(row: TweetRow) -> Self {
        Tweet {
            id: TweetId(row.id),
            owner: UserId(row.owner_id),
            author: row.author,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

const TWEET_COLUMNS: &str = r#"
    SELECT t.id, t.owner_id, u.username AS author, t.content, t.created_at
    FROM tweets t
    JOIN users u ON u.id = t.owner_id
"#;

/// SQLite-backed user, session and tweet store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    config: SqliteStoreConfig,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and apply the schema.
    ///
    /// # Errors
    /// - `Error::Database` if the directory cannot be created, the connection
    ///   fails, or the stored schema version is not supported
    pub async fn open(db_path: impl AsRef<Path>, config: SqliteStoreConfig) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(db_path)
                    .create_if_missing(true)
                    .foreign_keys(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal),
            )
            .await
            .map_err(db_error)?;

        schema::initialize_schema(&pool).await?;
        info!(path = %db_path.display(), "SQLite store ready");

        Ok(Self { pool, config })
    }

    /// Round-trip a trivial query; used by readiness checks.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    /// Delete every expired session. Returns the number removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(db_error)?
            .rows_affected();
        if removed > 0 {
            debug!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let NewUser {
            username,
            email,
            password,
        } = new_user;

        let hashing = self.config.hashing;
        let password_hash = tokio::task::spawn_blocking(move || hashing.hash(&password))
            .await
            .map_err(|e| Error::Internal(format!("Password hashing task failed: {}", e)))??;

        let created_at = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&username)
        .bind(&email)
        .bind(&password_hash)
        .bind(created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(User {
                id: UserId(done.last_insert_rowid()),
                username,
                email,
                created_at,
            }),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::DuplicateUsername(username))
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let row: Option<CredentialRow> = sqlx::query_as(
            "SELECT id, username, email, created_at, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let password = password.to_string();
        let hash = row.password_hash;
        let verified =
            tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
                .await
                .map_err(|e| Error::Internal(format!("Password check task failed: {}", e)))?;

        Ok(verified.then(|| row.user.into()))
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(exists)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, username, email, created_at FROM users WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn start_session(&self, user: UserId) -> Result<SessionKey> {
        let key = SessionKey::generate();
        let now = Utc::now();
        let expires_at = now + self.config.session_ttl;

        sqlx::query(
            r#"
            INSERT INTO sessions (session_key, user_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(key.as_str())
        .bind(user.0)
        .bind(now)
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(key)
    }

    async fn end_session(&self, key: &SessionKey) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_key = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn current_user(&self, key: &SessionKey) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT u.id, u.username, u.email, u.created_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.session_key = ? AND s.expires_at > ?
            "#,
        )
        .bind(key.as_str())
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(User::from))
    }

    async fn active_sessions(&self, user: UserId) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = ? AND expires_at > ?")
                .bind(user.0)
                .bind(Utc::now().timestamp())
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(count as usize)
    }
}

#[async_trait]
impl TweetStore for SqliteStore {
    async fn create_tweet(&self, owner: UserId, content: &str) -> Result<Tweet> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Insert before reading so the transaction never upgrades a read lock;
        // the owner foreign key rejects unknown users
        let created_at = Utc::now();
        let id = sqlx::query("INSERT INTO tweets (owner_id, content, created_at) VALUES (?, ?, ?)")
            .bind(owner.0)
            .bind(content)
            .bind(created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .last_insert_rowid();

        let author: String = sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
            .bind(owner.0)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        Ok(Tweet {
            id: TweetId(id),
            owner,
            author,
            content: content.to_string(),
            created_at,
        })
    }

    async fn list_tweets(&self) -> Result<Vec<Tweet>> {
        let rows: Vec<TweetRow> =
            sqlx::query_as(&format!("{} ORDER BY t.created_at DESC, t.id DESC", TWEET_COLUMNS))
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(rows.into_iter().map(Tweet::from).collect())
    }

    async fn list_tweets_by_owner(&self, owner: UserId) -> Result<Vec<Tweet>> {
        let rows: Vec<TweetRow> = sqlx::query_as(&format!(
            "{} WHERE t.owner_id = ? ORDER BY t.created_at DESC, t.id DESC",
            TWEET_COLUMNS
        ))
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Tweet::from).collect())
    }

    async fn get_tweet(&self, id: TweetId) -> Result<Option<Tweet>> {
        let row: Option<TweetRow> = sqlx::query_as(&format!("{} WHERE t.id = ?", TWEET_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(Tweet::from))
    }

    async fn delete_owned_tweet(&self, id: TweetId, requester: UserId) -> Result<DeleteOutcome> {
        // IMMEDIATE takes the write lock up front, so the ownership read and
        // the delete see the same snapshot. Dropping the transaction before
        // commit rolls it back.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(db_error)?;

        let outcome = delete_if_owner(&mut *tx, id, requester).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(outcome)
    }
}

async fn delete_if_owner(
    conn: &mut SqliteConnection,
    id: TweetId,
    requester: UserId,
) -> Result<DeleteOutcome> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT owner_id FROM tweets WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;

    match owner {
        None => Ok(DeleteOutcome::NotFound),
        Some(owner) if owner != requester.0 => Ok(DeleteOutcome::NotOwner),
        Some(_) => {
            sqlx::query("DELETE FROM tweets WHERE id = ?")
                .bind(id.0)
                .execute(&mut *conn)
                .await
                .map_err(db_error)?;
            Ok(DeleteOutcome::Deleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_config() -> SqliteStoreConfig {
        SqliteStoreConfig {
            hashing: PasswordHashing {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..Default::default()
        }
    }

    async fn open_store(temp_dir: &TempDir) -> SqliteStore {
        SqliteStore::open(temp_dir.path().join("chirp.db"), fast_config())
            .await
            .unwrap()
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password: "testpassword".to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("chirp.db");

        let store = SqliteStore::open(&db_path, fast_config()).await.unwrap();
        store.ping().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let alice = {
            let store = open_store(&temp_dir).await;
            let alice = store.create_user(new_user("alice")).await.unwrap();
            store.close().await;
            alice
        };

        let store = open_store(&temp_dir).await;
        assert_eq!(store.get_user(alice.id).await.unwrap(), Some(alice));
    }

    #[tokio::test]
    async fn test_create_and_authenticate_user() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let alice = store.create_user(new_user("alice")).await.unwrap();
        assert_eq!(alice.username, "alice");
        assert!(store.username_exists("alice").await.unwrap());
        assert!(!store.username_exists("bob").await.unwrap());

        let found = store.authenticate("alice", "testpassword").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(alice.id));
        assert!(store.authenticate("alice", "wrong").await.unwrap().is_none());
        assert!(store.authenticate("bob", "testpassword").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_password_is_not_stored_in_plaintext() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        store.create_user(new_user("alice")).await.unwrap();

        let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE username = ?")
            .bind("alice")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_ne!(hash, "testpassword");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store.create_user(new_user("alice")).await.unwrap();
        let err = store.create_user(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateUsername(name) if name == "alice"));
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let alice = store.create_user(new_user("alice")).await.unwrap();

        let key = store.start_session(alice.id).await.unwrap();
        assert_eq!(store.current_user(&key).await.unwrap(), Some(alice.clone()));
        assert_eq!(store.active_sessions(alice.id).await.unwrap(), 1);

        store.end_session(&key).await.unwrap();
        assert_eq!(store.current_user(&key).await.unwrap(), None);
        assert_eq!(store.active_sessions(alice.id).await.unwrap(), 0);

        // Ending twice is fine
        store.end_session(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_sessions() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(
            temp_dir.path().join("chirp.db"),
            SqliteStoreConfig {
                session_ttl: Duration::seconds(-10),
                ..fast_config()
            },
        )
        .await
        .unwrap();
        let alice = store.create_user(new_user("alice")).await.unwrap();

        let key = store.start_session(alice.id).await.unwrap();
        assert_eq!(store.current_user(&key).await.unwrap(), None);
        assert_eq!(store.purge_expired_sessions().await.unwrap(), 1);
        assert_eq!(store.purge_expired_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tweets_listed_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let bob = store.create_user(new_user("bob")).await.unwrap();

        let first = store.create_tweet(alice.id, "first").await.unwrap();
        let second = store.create_tweet(bob.id, "second").await.unwrap();
        let third = store.create_tweet(alice.id, "third").await.unwrap();

        let all: Vec<TweetId> = store
            .list_tweets()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(all, vec![third.id, second.id, first.id]);

        let mine = store.list_tweets_by_owner(alice.id).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|t| t.author == "alice"));
    }

    #[tokio::test]
    async fn test_get_tweet() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let tweet = store.create_tweet(alice.id, "hello").await.unwrap();

        let fetched = store.get_tweet(tweet.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
        assert_eq!(fetched.owner, alice.id);
        assert_eq!(fetched.author, "alice");
        assert!(store.get_tweet(TweetId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_tweet_for_missing_user() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let err = store.create_tweet(UserId(42), "orphan").await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn test_delete_owned_tweet_outcomes() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let bob = store.create_user(new_user("bob")).await.unwrap();
        let tweet = store.create_tweet(alice.id, "hello").await.unwrap();

        assert_eq!(
            store.delete_owned_tweet(tweet.id, bob.id).await.unwrap(),
            DeleteOutcome::NotOwner
        );
        assert!(store.get_tweet(tweet.id).await.unwrap().is_some());

        assert_eq!(
            store.delete_owned_tweet(tweet.id, alice.id).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            store.delete_owned_tweet(tweet.id, alice.id).await.unwrap(),
            DeleteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_concurrent_deletes_succeed_once() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let tweet = store.create_tweet(alice.id, "race").await.unwrap();

        let (a, b) = tokio::join!(
            store.delete_owned_tweet(tweet.id, alice.id),
            store.delete_owned_tweet(tweet.id, alice.id)
        );
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o != DeleteOutcome::Deleted);
        assert_eq!(outcomes, vec![DeleteOutcome::Deleted, DeleteOutcome::NotFound]);
    }

    #[tokio::test]
    async fn test_cancelled_delete_leaves_pool_usable() {
        use std::future::Future;
        use std::task::{Context, Poll, Waker};

        let temp_dir = TempDir::new().unwrap();
        let config = SqliteStoreConfig {
            max_connections: 1,
            ..fast_config()
        };
        let store = SqliteStore::open(temp_dir.path().join("chirp.db"), config)
            .await
            .unwrap();
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let tweet = store.create_tweet(alice.id, "hello").await.unwrap();

        // Poll once and abandon, as axum does when a client disconnects
        let finished = {
            let mut pending = std::pin::pin!(store.delete_owned_tweet(tweet.id, alice.id));
            let mut cx = Context::from_waker(Waker::noop());
            matches!(pending.as_mut().poll(&mut cx), Poll::Ready(Ok(_)))
        };

        let after = store.create_tweet(alice.id, "after").await.unwrap();
        let expected = if finished {
            DeleteOutcome::NotFound
        } else {
            DeleteOutcome::Deleted
        };
        assert_eq!(
            store.delete_owned_tweet(tweet.id, alice.id).await.unwrap(),
            expected
        );
        assert_eq!(
            store.delete_owned_tweet(after.id, alice.id).await.unwrap(),
            DeleteOutcome::Deleted
        );
    }

    #[tokio::test]
    async fn test_deleting_user_cascades() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        let alice = store.create_user(new_user("alice")).await.unwrap();
        let tweet = store.create_tweet(alice.id, "hello").await.unwrap();
        let key = store.start_session(alice.id).await.unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(alice.id.0)
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(store.get_tweet(tweet.id).await.unwrap().is_none());
        assert!(store.current_user(&key).await.unwrap().is_none());
    }
}
