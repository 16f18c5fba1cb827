//! Named playlist persistence
//!
//! A playlist is an ordered list of item identities stored under a name.
//! Saving replaces the stored order wholesale; while the engine runs,
//! the in-memory playlist is the source of truth.

use crate::error::Result;
use crate::playback::types::ItemIdentity;
use sqlx::{Pool, Row, Sqlite};

/// Replace the stored entries of `name` with `identities`, creating the
/// playlist row when missing.
pub async fn save_playlist(
    db: &Pool<Sqlite>,
    name: &str,
    identities: &[ItemIdentity],
) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query("INSERT INTO playlists (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM playlist_entries WHERE playlist_name = ?")
        .bind(name)
        .execute(&mut *tx)
        .await?;

    for (position, identity) in identities.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO playlist_entries (playlist_name, position, media_kind, media_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(position as i64)
        .bind(&identity.kind)
        .bind(&identity.id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Stored entries of `name` in playlist order; empty when the playlist
/// does not exist.
pub async fn load_playlist(db: &Pool<Sqlite>, name: &str) -> Result<Vec<ItemIdentity>> {
    let rows = sqlx::query(
        r#"
        SELECT media_kind, media_id FROM playlist_entries
        WHERE playlist_name = ?
        ORDER BY position
        "#,
    )
    .bind(name)
    .fetch_all(db)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            ItemIdentity::new(
                row.get::<String, _>("media_kind"),
                row.get::<String, _>("media_id"),
            )
        })
        .collect())
}
