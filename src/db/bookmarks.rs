//! Bookmark persistence
//!
//! A bookmark remembers one position within one media item. Find-or-
//! create matches on the exact stored time, so observers can record the
//! same moment repeatedly without stacking duplicates.

use crate::db::items;
use crate::error::{Error, Result};
use crate::playback::types::ItemIdentity;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

/// One persisted bookmark row.
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub guid: Uuid,
    pub identity: ItemIdentity,
    pub time_secs: f64,
    pub created_at: DateTime<Utc>,
}

/// Existing bookmark at exactly `time_secs` for `identity`, or a newly
/// created one. The media item row is created first when missing.
pub async fn find_or_create(
    db: &Pool<Sqlite>,
    identity: &ItemIdentity,
    time_secs: f64,
) -> Result<Bookmark> {
    items::upsert_item(db, identity).await?;

    let existing = sqlx::query(
        r#"
        SELECT guid, time_secs, created_at FROM bookmarks
        WHERE media_kind = ? AND media_id = ? AND time_secs = ?
        "#,
    )
    .bind(&identity.kind)
    .bind(&identity.id)
    .bind(time_secs)
    .fetch_optional(db)
    .await?;

    if let Some(row) = existing {
        return bookmark_from_row(identity.clone(), &row);
    }

    let guid = Uuid::new_v4();
    let created_at = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO bookmarks (guid, media_kind, media_id, time_secs, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(&identity.kind)
    .bind(&identity.id)
    .bind(time_secs)
    .bind(created_at)
    .execute(db)
    .await?;

    Ok(Bookmark {
        guid,
        identity: identity.clone(),
        time_secs,
        created_at,
    })
}

/// All bookmarks for `identity`, ordered by time.
pub async fn bookmarks_for(db: &Pool<Sqlite>, identity: &ItemIdentity) -> Result<Vec<Bookmark>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, time_secs, created_at FROM bookmarks
        WHERE media_kind = ? AND media_id = ?
        ORDER BY time_secs
        "#,
    )
    .bind(&identity.kind)
    .bind(&identity.id)
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| bookmark_from_row(identity.clone(), row))
        .collect()
}

/// Delete a bookmark by id; `false` when no row matched.
pub async fn remove(db: &Pool<Sqlite>, guid: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM bookmarks WHERE guid = ?")
        .bind(guid.to_string())
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn bookmark_from_row(identity: ItemIdentity, row: &SqliteRow) -> Result<Bookmark> {
    let guid = Uuid::parse_str(&row.get::<String, _>("guid"))
        .map_err(|e| Error::Internal(format!("malformed bookmark id: {}", e)))?;
    Ok(Bookmark {
        guid,
        identity,
        time_secs: row.get("time_secs"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init::initialize_database(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent_at_exact_time() {
        let pool = setup_test_db().await;
        let identity = ItemIdentity::new("file", "/music/sonata.mp3");

        let first = find_or_create(&pool, &identity, 12.5).await.unwrap();
        let second = find_or_create(&pool, &identity, 12.5).await.unwrap();
        assert_eq!(first.guid, second.guid);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn different_times_create_distinct_bookmarks() {
        let pool = setup_test_db().await;
        let identity = ItemIdentity::new("file", "/music/sonata.mp3");

        let late = find_or_create(&pool, &identity, 30.25).await.unwrap();
        let early = find_or_create(&pool, &identity, 4.0).await.unwrap();
        assert_ne!(early.guid, late.guid);

        let listed = bookmarks_for(&pool, &identity).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].time_secs, 4.0);
        assert_eq!(listed[1].time_secs, 30.25);
    }

    #[tokio::test]
    async fn creating_a_bookmark_ensures_the_media_item_row() {
        let pool = setup_test_db().await;
        let identity = ItemIdentity::new("file", "/music/waltz.flac");

        find_or_create(&pool, &identity, 1.0).await.unwrap();

        assert_eq!(
            items::adjustments(&pool, &identity).await.unwrap(),
            Some((0, 100))
        );
    }

    #[tokio::test]
    async fn remove_deletes_by_id() {
        let pool = setup_test_db().await;
        let identity = ItemIdentity::new("file", "/music/sonata.mp3");

        let bookmark = find_or_create(&pool, &identity, 7.0).await.unwrap();
        assert!(remove(&pool, bookmark.guid).await.unwrap());
        assert!(!remove(&pool, bookmark.guid).await.unwrap());
        assert!(bookmarks_for(&pool, &identity).await.unwrap().is_empty());
    }
}
