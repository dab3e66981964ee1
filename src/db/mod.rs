//! Database module for SQLite persistence.
//!
//! SQLite is the backing store for every realtime collection.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;
use crate::store::Collection;

/// A typed record of one collection, validated when read from a row.
pub trait Record: Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn from_row(row: &SqliteRow) -> Result<Self, AppError>;
}

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // One revision counter per collection, bumped by every accepted write
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS revisions (
            collection TEXT PRIMARY KEY,
            revision_id INTEGER NOT NULL DEFAULT 0
        );

        INSERT OR IGNORE INTO revisions (collection, revision_id)
        VALUES ('notices', 0), ('learning', 0), ('chats', 0);
        "#,
    )
    .execute(pool)
    .await?;

    // created_at is microseconds since the Unix epoch, assigned by the store
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notices (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS learning (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            period INTEGER NOT NULL CHECK (period > 0),
            subject TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chats (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            text TEXT NOT NULL,
            user_id TEXT NOT NULL,
            user_name TEXT NOT NULL,
            user_photo TEXT,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for the feed queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_notices_created_at ON notices(created_at);
        CREATE INDEX IF NOT EXISTS idx_learning_period ON learning(period);
        CREATE INDEX IF NOT EXISTS idx_chats_created_at ON chats(created_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
