//! Shared fixtures for engine integration tests
//!
//! Engines are wired to synthetic resolvers and manually driven output
//! hosts so tests control decode timing and rendering exactly.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use woodshed::audio::{ManualDriver, ManualHostFactory, MediaResolver, Pcm};
use woodshed::events::PlayerEvent;
use woodshed::playback::types::ItemDescriptor;
use woodshed::{EngineConfig, Error, PlaylistEngine, Result};

pub const RATE: u32 = 44100;

/// Generous bound for background work (decode tasks, the notice pump)
pub const WAIT: Duration = Duration::from_secs(2);

/// Blocks fixture decodes until released, letting tests act while a
/// load is verifiably still in flight.
pub struct LoadGate {
    released: Mutex<bool>,
    cv: Condvar,
}

impl LoadGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            released: Mutex::new(false),
            cv: Condvar::new(),
        })
    }

    pub fn release(&self) {
        let mut released = self.released.lock().unwrap();
        *released = true;
        self.cv.notify_all();
    }

    fn wait(&self) {
        let mut released = self.released.lock().unwrap();
        while !*released {
            released = self.cv.wait(released).unwrap();
        }
    }
}

/// Resolves known paths to silent PCM of a configured length; unknown
/// paths fail like unreadable files.
pub struct FixtureResolver {
    tracks: HashMap<PathBuf, f64>,
    gate: Option<Arc<LoadGate>>,
}

impl FixtureResolver {
    pub fn new(tracks: &[(&str, f64)]) -> Self {
        Self {
            tracks: tracks.iter().map(|(p, s)| (PathBuf::from(p), *s)).collect(),
            gate: None,
        }
    }

    pub fn gated(tracks: &[(&str, f64)], gate: Arc<LoadGate>) -> Self {
        let mut resolver = Self::new(tracks);
        resolver.gate = Some(gate);
        resolver
    }
}

impl MediaResolver for FixtureResolver {
    fn resolve(&self, locator: &Path) -> Result<Pcm> {
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        match self.tracks.get(locator) {
            Some(seconds) => {
                let frames = (seconds * RATE as f64) as usize;
                Ok(Pcm::new(vec![0.0; frames * 2], RATE))
            }
            None => Err(Error::Load(format!(
                "no such fixture: {}",
                locator.display()
            ))),
        }
    }
}

/// Engine plus handles to its manually driven output hosts.
pub struct Rig {
    pub engine: PlaylistEngine,
    hosts: Arc<ManualHostFactory>,
}

impl Rig {
    pub fn build(resolver: FixtureResolver) -> Self {
        Self::build_with(resolver, None, EngineConfig::default())
    }

    pub fn build_with(
        resolver: FixtureResolver,
        pool: Option<sqlx::Pool<sqlx::Sqlite>>,
        config: EngineConfig,
    ) -> Self {
        // RUST_LOG selects engine diagnostics when a test needs them
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let hosts = Arc::new(ManualHostFactory::new(config.working_sample_rate));
        let engine =
            PlaylistEngine::with_parts(config, Arc::new(resolver), hosts.clone(), pool);
        Self { engine, hosts }
    }

    /// Driver for the item added at `index` (hosts open in playlist
    /// insertion order).
    pub fn driver(&self, index: usize) -> ManualDriver {
        self.hosts
            .driver(index)
            .expect("no host opened at this index")
    }
}

pub fn descriptor(path: &str) -> ItemDescriptor {
    ItemDescriptor::from_path(PathBuf::from(path))
}

pub fn descriptors(paths: &[&str]) -> Vec<ItemDescriptor> {
    paths.iter().map(|p| descriptor(p)).collect()
}

/// Polls an async probe until it returns true or the timeout lapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if probe().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Receives events until `wanted` arrives; false on timeout or a closed
/// feed. Lagged receivers keep going.
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<PlayerEvent>,
    wanted: PlayerEvent,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return false;
        }
        match tokio::time::timeout(deadline - now, rx.recv()).await {
            Ok(Ok(event)) if event == wanted => return true,
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return false,
        }
    }
}

/// Everything currently buffered on the receiver.
pub fn drain_events(rx: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
