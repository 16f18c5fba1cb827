//! Database access layer
//!
//! Free async query functions over a shared `Pool<Sqlite>`. Persistence
//! is an optional collaborator: the engine runs fully in memory when no
//! pool is supplied.

pub mod bookmarks;
pub mod init;
pub mod items;
pub mod playlists;

use crate::error::Result;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open the SQLite database at `path` (creating the file if missing)
/// and make sure the schema exists.
pub async fn connect(path: &Path) -> Result<Pool<Sqlite>> {
    let url = format!("sqlite:{}?mode=rwc", path.display());
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(60)))
        .connect(&url)
        .await?;
    info!("Connected to database: {:?}", path);

    init::initialize_database(&pool).await?;
    Ok(pool)
}
