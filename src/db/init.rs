//! Database initialization
//!
//! Creates the schema on first use. All statements are idempotent so
//! hosts can run this on every startup.

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use tracing::info;

/// Create all tables backing the persistence surface.
pub async fn initialize_database(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Initializing database structures");

    // One row per known media identity; pitch (semitones) and tempo
    // (percent) remember the last adjustments a host applied to it
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_items (
            kind TEXT NOT NULL,
            id TEXT NOT NULL,
            pitch INTEGER NOT NULL DEFAULT 0,
            tempo INTEGER NOT NULL DEFAULT 100,
            PRIMARY KEY (kind, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookmarks (
            guid TEXT PRIMARY KEY,
            media_kind TEXT NOT NULL,
            media_id TEXT NOT NULL,
            time_secs REAL NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_bookmarks_media ON bookmarks (media_kind, media_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlists (
            name TEXT PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist_entries (
            playlist_name TEXT NOT NULL,
            position INTEGER NOT NULL,
            media_kind TEXT NOT NULL,
            media_id TEXT NOT NULL,
            PRIMARY KEY (playlist_name, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database initialization complete");
    Ok(())
}
