//! SQLite storage for Chirp
//!
//! Implements the `UserStore`, `SessionStore` and `TweetStore` traits from
//! `chirp-core` over a single SQLite database accessed through `sqlx`.
//!
//! # Features
//! - WAL journal mode for concurrent readers
//! - Foreign keys with cascading deletes from users to tweets and sessions
//! - Argon2 hashing and verification off the async runtime
//! - Ownership-checked deletes inside one transaction
//!
//! # Example
//! ```no_run
//! # use chirp_store_sqlite::{SqliteStore, SqliteStoreConfig};
//! # async fn example() -> chirp_core::Result<()> {
//! let store = SqliteStore::open("chirp.db", SqliteStoreConfig::default()).await?;
//! store.ping().await?;
//! # Ok(())
//! # }
//! ```

mod schema;
mod sqlite_store;

pub use sqlite_store::{SqliteStore, SqliteStoreConfig};
