//! Persistence integration tests
//!
//! Playlist writes ride along engine commands; bookmarks are recorded by
//! observers reacting to the event feed.

mod helpers;

use helpers::*;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use woodshed::db;
use woodshed::events::PlayerEvent;
use woodshed::playback::types::{LoopRegion, TransportState};
use woodshed::EngineConfig;

async fn memory_pool() -> anyhow::Result<Pool<Sqlite>> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    db::init::initialize_database(&pool).await?;
    Ok(pool)
}

#[tokio::test]
async fn playlist_changes_are_saved_under_the_configured_name() -> anyhow::Result<()> {
    let pool = memory_pool().await?;
    let config = EngineConfig {
        playlist_name: "Session".to_string(),
        ..EngineConfig::default()
    };
    let rig = Rig::build_with(
        FixtureResolver::new(&[
            ("/fixtures/a.wav", 1.0),
            ("/fixtures/b.wav", 1.0),
            ("/fixtures/c.wav", 1.0),
        ]),
        Some(pool.clone()),
        config,
    );

    rig.engine
        .add_files(descriptors(&["/fixtures/a.wav", "/fixtures/b.wav"]))
        .await;
    assert!(
        wait_until(WAIT, || async {
            db::playlists::load_playlist(&pool, "Session")
                .await
                .unwrap()
                .len()
                == 2
        })
        .await
    );

    rig.engine.add_files(descriptors(&["/fixtures/c.wav"])).await;
    assert!(
        wait_until(WAIT, || async {
            db::playlists::load_playlist(&pool, "Session")
                .await
                .unwrap()
                .len()
                == 3
        })
        .await
    );

    let stored = db::playlists::load_playlist(&pool, "Session").await?;
    let listed: Vec<_> = rig
        .engine
        .playlist()
        .await
        .into_iter()
        .map(|d| d.identity)
        .collect();
    assert_eq!(stored, listed);
    Ok(())
}

#[tokio::test]
async fn persistence_failures_never_affect_playback() -> anyhow::Result<()> {
    // A pool with no schema makes every save fail
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let rig = Rig::build_with(
        FixtureResolver::new(&[("/fixtures/a.wav", 1.0)]),
        Some(pool.clone()),
        EngineConfig::default(),
    );

    rig.engine.add_files(descriptors(&["/fixtures/a.wav"])).await;
    rig.engine.play().await?;
    assert!(
        wait_until(WAIT, || async {
            rig.engine.transport().await == TransportState::Playing
        })
        .await
    );

    rig.driver(0).advance_frames(4410);
    assert!((rig.engine.current_time().await - 0.1).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn loop_observer_records_an_idempotent_bookmark() -> anyhow::Result<()> {
    let pool = memory_pool().await?;
    let rig = Rig::build_with(
        FixtureResolver::new(&[("/fixtures/a.wav", 100.0)]),
        Some(pool.clone()),
        EngineConfig::default(),
    );
    rig.engine.add_files(descriptors(&["/fixtures/a.wav"])).await;
    rig.engine.play().await?;
    assert!(
        wait_until(WAIT, || async {
            rig.engine.transport().await == TransportState::Playing
        })
        .await
    );

    let mut rx = rig.engine.events().subscribe();
    rig.engine.set_loop(LoopRegion::new(40.0, 70.0)?).await?;
    let identity = rig.engine.playlist().await[0].identity.clone();

    // Each lap, remember where the practiced region starts
    let driver = rig.driver(0);
    for _ in 0..2 {
        driver.advance_seconds(30.0);
        assert!(wait_for_event(&mut rx, PlayerEvent::LoopCompleted, WAIT).await);
        let region = rig.engine.active_loop().await.unwrap();
        db::bookmarks::find_or_create(&pool, &identity, region.start).await?;
    }

    let recorded = db::bookmarks::bookmarks_for(&pool, &identity).await?;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].time_secs, 40.0);
    assert_eq!(recorded[0].identity, identity);
    Ok(())
}
