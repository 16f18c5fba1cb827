//! Media item rows and remembered per-item adjustments
//!
//! Hosts that restore a player's last pitch/tempo for an item read and
//! write these; the engine itself never does.

use crate::error::Result;
use crate::playback::types::ItemIdentity;
use sqlx::{Pool, Row, Sqlite};

/// Ensure a media item row exists for `identity`.
pub async fn upsert_item(db: &Pool<Sqlite>, identity: &ItemIdentity) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO media_items (kind, id) VALUES (?, ?)
        ON CONFLICT (kind, id) DO NOTHING
        "#,
    )
    .bind(&identity.kind)
    .bind(&identity.id)
    .execute(db)
    .await?;
    Ok(())
}

/// Remember pitch (semitones) and tempo (percent) for `identity`,
/// creating its row when missing.
pub async fn set_adjustments(
    db: &Pool<Sqlite>,
    identity: &ItemIdentity,
    pitch_semitones: i32,
    tempo_percent: u32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO media_items (kind, id, pitch, tempo) VALUES (?, ?, ?, ?)
        ON CONFLICT (kind, id) DO UPDATE SET pitch = excluded.pitch, tempo = excluded.tempo
        "#,
    )
    .bind(&identity.kind)
    .bind(&identity.id)
    .bind(pitch_semitones)
    .bind(tempo_percent as i64)
    .execute(db)
    .await?;
    Ok(())
}

/// Remembered `(pitch semitones, tempo percent)` for `identity`, `None`
/// when it has no row yet.
pub async fn adjustments(db: &Pool<Sqlite>, identity: &ItemIdentity) -> Result<Option<(i32, u32)>> {
    let row = sqlx::query("SELECT pitch, tempo FROM media_items WHERE kind = ? AND id = ?")
        .bind(&identity.kind)
        .bind(&identity.id)
        .fetch_optional(db)
        .await?;

    Ok(row.map(|r| {
        (
            r.get::<i64, _>("pitch") as i32,
            r.get::<i64, _>("tempo") as u32,
        )
    }))
}
