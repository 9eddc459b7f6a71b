//! Schema creation and version check

use sqlx::sqlite::SqlitePool;

use chirp_core::{Error, Result};

pub(crate) const SCHEMA_VERSION: i32 = 1;

pub(crate) async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_error)?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await
        .map_err(db_error)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_error)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tweets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_error)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tweets_created ON tweets(created_at DESC, id DESC)")
        .execute(pool)
        .await
        .map_err(db_error)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tweets_owner ON tweets(owner_id, created_at DESC)")
        .execute(pool)
        .await
        .map_err(db_error)?;

    // expires_at is unix seconds so expiry can be compared in SQL
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_key TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_error)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id, expires_at)")
        .execute(pool)
        .await
        .map_err(db_error)?;

    let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(db_error)?;

    if version != SCHEMA_VERSION {
        return Err(Error::Database(format!(
            "Unsupported schema version: {}",
            version
        )));
    }

    Ok(())
}

pub(crate) fn db_error(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}
