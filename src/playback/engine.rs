//! Playlist engine
//!
//! [`PlaylistEngine`] is the playback state machine: an ordered list of
//! [`PlayableItem`]s, a current index, transport state, engine-level
//! pitch/tempo mirrored onto the current item, and at most one pending
//! intent waiting for a load to finish.
//!
//! All state lives behind one async mutex. Commands lock it, mutate, then
//! emit change events; completion notices from the render side arrive on
//! an unbounded channel and are applied by a pump task on the same lock,
//! so nothing observes a half-applied transition.

use crate::audio::graph::SegmentComplete;
use crate::audio::host::RenderHostFactory;
use crate::audio::output::CpalHostFactory;
use crate::audio::resolver::{MediaResolver, SymphoniaResolver};
use crate::audio::types::Pcm;
use crate::config::EngineConfig;
use crate::db;
use crate::error::{Error, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::playback::item::{CompletionOutcome, LoadOutcome, PlayOutcome, PlayableItem};
use crate::playback::types::{
    ItemDescriptor, ItemIdentity, LoopRegion, PendingIntent, TransportState,
};
use sqlx::{Pool, Sqlite};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// The playback engine. Cheap to clone handles are not provided; share it
/// behind an `Arc` if multiple tasks issue commands.
pub struct PlaylistEngine {
    core: Arc<Mutex<Core>>,
    bus: EventBus,
}

impl PlaylistEngine {
    /// Production wiring: symphonia decode and cpal output.
    ///
    /// `pool` enables best-effort playlist persistence; pass `None` to run
    /// purely in memory. Must be called from within a tokio runtime.
    pub fn new(config: EngineConfig, pool: Option<Pool<Sqlite>>) -> Self {
        let rate = config.working_sample_rate;
        Self::with_parts(
            config,
            Arc::new(SymphoniaResolver::new(rate)),
            Arc::new(CpalHostFactory::new(rate)),
            pool,
        )
    }

    /// Engine with explicit collaborators. Tests inject synthetic
    /// resolvers and manually driven hosts here.
    pub fn with_parts(
        config: EngineConfig,
        resolver: Arc<dyn MediaResolver>,
        host_factory: Arc<dyn RenderHostFactory>,
        pool: Option<Pool<Sqlite>>,
    ) -> Self {
        let bus = EventBus::new(config.event_capacity);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let core = Arc::new_cyclic(|weak: &Weak<Mutex<Core>>| {
            Mutex::new(Core {
                items: Vec::new(),
                current: None,
                transport: TransportState::Stopped,
                pitch_semitones: 0,
                tempo_percent: 100,
                pending: None,
                resolver,
                host_factory,
                completion_tx,
                bus: bus.clone(),
                pool,
                playlist_name: config.playlist_name,
                weak: weak.clone(),
            })
        });

        tokio::spawn(notice_pump(Arc::downgrade(&core), completion_rx));

        Self { core, bus }
    }

    /// Event feed for observers; subscribe before issuing commands to see
    /// everything they cause.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Append items to the playlist.
    ///
    /// If the playlist was empty, decoding of the new first item begins in
    /// the background so a following `play` starts quickly. Playback state
    /// is not touched.
    pub async fn add_files(&self, descriptors: Vec<ItemDescriptor>) {
        info!("AddFiles command received ({} items)", descriptors.len());
        self.core.lock().await.add_files(descriptors);
    }

    /// Make the item at `index` current and play it from the start.
    ///
    /// # Errors
    /// `IndexOutOfBounds` leaves the engine entirely unchanged.
    pub async fn play_at_index(&self, index: usize) -> Result<()> {
        info!("PlayAtIndex command received: {}", index);
        self.core.lock().await.play_at_index(index)
    }

    /// Play the current item (selecting the first when none is current),
    /// resuming from a pause point if one exists.
    pub async fn play(&self) -> Result<()> {
        info!("Play command received");
        self.core.lock().await.play(None)
    }

    /// Play the current item from `time` seconds.
    pub async fn seek(&self, time: f64) -> Result<()> {
        info!("Seek command received: {:.3}s", time);
        self.core.lock().await.play(Some(time))
    }

    pub async fn pause(&self) {
        info!("Pause command received");
        self.core.lock().await.pause();
    }

    /// Full stop: clears the current index, pending intent, and any loop.
    pub async fn stop(&self) {
        info!("Stop command received");
        self.core.lock().await.stop();
    }

    /// Loop `region` on the current item and start playing it.
    pub async fn set_loop(&self, region: LoopRegion) -> Result<()> {
        info!(
            "SetLoop command received: [{:.3}, {:.3})",
            region.start, region.end
        );
        self.core.lock().await.set_loop(region)
    }

    /// Drop the active loop; playback continues to the item's end.
    pub async fn clear_loop(&self) -> Result<()> {
        info!("ClearLoop command received");
        self.core.lock().await.clear_loop()
    }

    /// Pitch adjustment in semitones, clamped to ±12.
    pub async fn set_pitch(&self, semitones: i32) {
        info!("SetPitch command received: {}", semitones);
        self.core.lock().await.set_pitch(semitones);
    }

    /// Tempo as a percentage of normal speed, clamped to 50..=200.
    pub async fn set_tempo(&self, percent: u32) {
        info!("SetTempo command received: {}%", percent);
        self.core.lock().await.set_tempo(percent);
    }

    pub async fn transport(&self) -> TransportState {
        self.core.lock().await.transport
    }

    pub async fn current_index(&self) -> Option<usize> {
        self.core.lock().await.current
    }

    /// Playhead position of the current item, 0 when none is current.
    pub async fn current_time(&self) -> f64 {
        let core = self.core.lock().await;
        match core.current {
            Some(index) => core.items[index].time(),
            None => 0.0,
        }
    }

    pub async fn current_duration(&self) -> Option<f64> {
        let core = self.core.lock().await;
        core.current.and_then(|index| core.items[index].duration())
    }

    pub async fn current_title(&self) -> Option<String> {
        let core = self.core.lock().await;
        core.current.map(|index| core.items[index].title().to_string())
    }

    pub async fn playlist(&self) -> Vec<ItemDescriptor> {
        let core = self.core.lock().await;
        core.items.iter().map(|i| i.descriptor().clone()).collect()
    }

    pub async fn pitch(&self) -> i32 {
        self.core.lock().await.pitch_semitones
    }

    pub async fn tempo(&self) -> u32 {
        self.core.lock().await.tempo_percent
    }

    /// Loop applied to the current item, if any
    pub async fn active_loop(&self) -> Option<LoopRegion> {
        let core = self.core.lock().await;
        core.current.and_then(|index| core.items[index].loop_region())
    }

    /// `(pitch cents, tempo ratio)` on the current item's stretch node,
    /// for hosts that display the effective values.
    pub async fn current_node_parameters(&self) -> Option<(f32, f64)> {
        let core = self.core.lock().await;
        core.current
            .map(|index| (core.items[index].pitch_cents(), core.items[index].tempo_ratio()))
    }
}

/// Applies render-side completion notices on the engine lock. Exits when
/// the engine is dropped.
async fn notice_pump(core: Weak<Mutex<Core>>, mut rx: UnboundedReceiver<SegmentComplete>) {
    while let Some(note) = rx.recv().await {
        let Some(core) = core.upgrade() else { break };
        core.lock().await.handle_segment_complete(note);
    }
    debug!("Completion pump exited");
}

struct Core {
    items: Vec<PlayableItem>,
    current: Option<usize>,
    transport: TransportState,
    pitch_semitones: i32,
    tempo_percent: u32,
    /// Deferred command and the item instance it targets
    pending: Option<(Uuid, PendingIntent)>,
    resolver: Arc<dyn MediaResolver>,
    host_factory: Arc<dyn RenderHostFactory>,
    completion_tx: UnboundedSender<SegmentComplete>,
    bus: EventBus,
    pool: Option<Pool<Sqlite>>,
    playlist_name: String,
    weak: Weak<Mutex<Core>>,
}

impl Core {
    fn add_files(&mut self, descriptors: Vec<ItemDescriptor>) {
        if descriptors.is_empty() {
            return;
        }
        let was_empty = self.items.is_empty();
        for descriptor in descriptors {
            debug!("Adding '{}' to playlist", descriptor.title);
            self.items.push(PlayableItem::new(
                descriptor,
                self.host_factory.as_ref(),
                self.completion_tx.clone(),
            ));
        }
        if was_empty {
            // Warm up the likely first play
            self.ensure_enqueued(0);
        }
        self.persist_playlist();
        self.bus.emit_lossy(PlayerEvent::PlaylistChanged);
    }

    fn play_at_index(&mut self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(Error::IndexOutOfBounds(index));
        }
        self.pending = None;
        self.detach_current();
        if self.current != Some(index) {
            self.current = Some(index);
            self.bus.emit_lossy(PlayerEvent::CurrentItemChanged);
        }
        self.play(None)
    }

    fn play(&mut self, time: Option<f64>) -> Result<()> {
        let index = match self.current {
            Some(index) => index,
            None => {
                if self.items.is_empty() {
                    debug!("Play ignored: playlist is empty");
                    return Ok(());
                }
                self.current = Some(0);
                self.bus.emit_lossy(PlayerEvent::CurrentItemChanged);
                0
            }
        };

        if self.items[index].is_loaded() {
            self.pending = None;
            self.start_current(time)
        } else {
            let instance = self.items[index].instance();
            debug!(
                "'{}' not loaded yet, deferring play",
                self.items[index].title()
            );
            self.pending = Some((instance, PendingIntent::Play(time)));
            self.ensure_enqueued(index);
            Ok(())
        }
    }

    fn pause(&mut self) {
        self.pending = None;
        let Some(index) = self.current else { return };
        if self.transport != TransportState::Playing {
            return;
        }
        self.items[index].pause();
        self.transport = TransportState::Paused;
    }

    fn stop(&mut self) {
        self.pending = None;
        let mut had_loop = false;
        if let Some(index) = self.current {
            had_loop = self.items[index].loop_region().is_some();
            self.items[index].stop();
            self.items[index].clear_loop();
        }
        if had_loop {
            self.bus.emit_lossy(PlayerEvent::LoopChanged);
        }
        if self.current.take().is_some() {
            self.bus.emit_lossy(PlayerEvent::CurrentItemChanged);
        }
        self.transport = TransportState::Stopped;
    }

    fn set_loop(&mut self, region: LoopRegion) -> Result<()> {
        let index = match self.current {
            Some(index) => index,
            None => {
                if self.items.is_empty() {
                    debug!("SetLoop ignored: playlist is empty");
                    return Ok(());
                }
                self.current = Some(0);
                self.bus.emit_lossy(PlayerEvent::CurrentItemChanged);
                0
            }
        };

        if self.items[index].is_loaded() {
            self.pending = None;
            self.apply_loop(region)
        } else {
            let instance = self.items[index].instance();
            debug!(
                "'{}' not loaded yet, deferring loop",
                self.items[index].title()
            );
            self.pending = Some((instance, PendingIntent::Loop(region)));
            self.ensure_enqueued(index);
            Ok(())
        }
    }

    fn clear_loop(&mut self) -> Result<()> {
        if matches!(self.pending, Some((_, PendingIntent::Loop(_)))) {
            // Never became active, so no LoopChanged for dropping it
            self.pending = None;
        }
        let Some(index) = self.current else {
            return Ok(());
        };
        if self.items[index].loop_region().is_none() {
            return Ok(());
        }
        let t = self.items[index].time();
        self.items[index].clear_loop();
        self.bus.emit_lossy(PlayerEvent::LoopChanged);
        if self.transport == TransportState::Playing {
            let outcome = self.items[index].play(Some(t))?;
            self.after_play_outcome(outcome);
        }
        Ok(())
    }

    fn set_pitch(&mut self, semitones: i32) {
        let clamped = semitones.clamp(-12, 12);
        if clamped != semitones {
            debug!("Pitch {} clamped to {}", semitones, clamped);
        }
        self.pitch_semitones = clamped;
        if let Some(index) = self.current {
            self.items[index].set_pitch_cents((clamped * 100) as f32);
        }
        self.bus.emit_lossy(PlayerEvent::PitchChanged);
    }

    fn set_tempo(&mut self, percent: u32) {
        let clamped = percent.clamp(50, 200);
        if clamped != percent {
            debug!("Tempo {}% clamped to {}%", percent, clamped);
        }
        self.tempo_percent = clamped;
        if let Some(index) = self.current {
            self.items[index].set_tempo_ratio(clamped as f64 / 100.0);
        }
        self.bus.emit_lossy(PlayerEvent::TempoChanged);
    }

    /// Stop the outgoing current item and drop its loop.
    fn detach_current(&mut self) {
        let Some(index) = self.current else { return };
        let item = &mut self.items[index];
        let had_loop = item.loop_region().is_some();
        item.stop();
        item.clear_loop();
        if had_loop {
            self.bus.emit_lossy(PlayerEvent::LoopChanged);
        }
    }

    /// Play the loaded current item, mirroring engine adjustments first.
    fn start_current(&mut self, time: Option<f64>) -> Result<()> {
        let Some(index) = self.current else {
            return Ok(());
        };
        self.apply_adjustments_to(index);
        let outcome = self.items[index].play(time)?;
        self.transport = TransportState::Playing;
        self.after_play_outcome(outcome);
        Ok(())
    }

    fn apply_loop(&mut self, region: LoopRegion) -> Result<()> {
        let Some(index) = self.current else {
            return Ok(());
        };
        self.apply_adjustments_to(index);
        let outcome = self.items[index].set_loop(region)?;
        self.transport = TransportState::Playing;
        self.bus.emit_lossy(PlayerEvent::LoopChanged);
        self.after_play_outcome(outcome);
        Ok(())
    }

    fn after_play_outcome(&mut self, outcome: PlayOutcome) {
        match outcome {
            PlayOutcome::Started => {}
            PlayOutcome::LoopWrapped => self.bus.emit_lossy(PlayerEvent::LoopCompleted),
            PlayOutcome::Finished => self.advance_or_stop(),
        }
    }

    fn apply_adjustments_to(&self, index: usize) {
        let item = &self.items[index];
        item.set_pitch_cents((self.pitch_semitones * 100) as f32);
        item.set_tempo_ratio(self.tempo_percent as f64 / 100.0);
    }

    /// Begin decoding the item at `index` unless a load is underway or
    /// already done. The decode runs on the blocking pool; the outcome is
    /// applied back under the engine lock.
    fn ensure_enqueued(&mut self, index: usize) {
        let Some(item) = self.items.get_mut(index) else {
            return;
        };
        let instance = item.instance();
        let Some(locator) = item.begin_load() else {
            return;
        };
        debug!("Enqueueing '{}' for decode", item.title());

        let resolver = Arc::clone(&self.resolver);
        let weak = self.weak.clone();
        tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(move || resolver.resolve(&locator)).await
            {
                Ok(result) => result,
                Err(e) => Err(Error::Internal(format!("decode task panicked: {}", e))),
            };
            let Some(core) = weak.upgrade() else { return };
            core.lock().await.finish_load(instance, result);
        });
    }

    fn finish_load(&mut self, instance: Uuid, result: Result<Pcm>) {
        let Some(index) = self.items.iter().position(|i| i.instance() == instance) else {
            return;
        };
        match self.items[index].finish_load(result) {
            LoadOutcome::Loaded => {
                self.bus.emit_lossy(PlayerEvent::ItemLoaded);
                self.run_pending_intent(instance);
            }
            LoadOutcome::Failed => {
                // A deferred command for this item can never run now
                if matches!(self.pending, Some((target, _)) if target == instance) {
                    self.pending = None;
                    if self.current == Some(index) {
                        // The engine was waiting on this item to render
                        self.transport = TransportState::Stopped;
                    }
                }
                self.bus.emit_lossy(PlayerEvent::ItemFailed);
            }
            LoadOutcome::Ignored => {}
        }
    }

    fn run_pending_intent(&mut self, instance: Uuid) {
        let Some((target, intent)) = self.pending else {
            return;
        };
        if target != instance {
            return;
        }
        self.pending = None;
        let result = match intent {
            PendingIntent::Play(time) => self.start_current(time),
            PendingIntent::Loop(region) => self.apply_loop(region),
        };
        if let Err(e) = result {
            error!("Deferred command failed: {}", e);
        }
    }

    fn handle_segment_complete(&mut self, note: SegmentComplete) {
        let Some(index) = self.current else { return };
        if self.items[index].instance() != note.item {
            return;
        }
        match self.items[index].handle_completion(note.generation) {
            CompletionOutcome::Stale => {}
            CompletionOutcome::LoopCompleted => self.bus.emit_lossy(PlayerEvent::LoopCompleted),
            CompletionOutcome::Finished => self.advance_or_stop(),
            CompletionOutcome::Failed(e) => {
                error!("Failed to restart loop playback: {}", e);
                self.stop();
            }
        }
    }

    /// Natural finish: next item from its start, or full stop at the end
    /// of the playlist.
    fn advance_or_stop(&mut self) {
        let Some(index) = self.current else { return };
        let next = index + 1;
        if next < self.items.len() {
            debug!("Advancing to playlist index {}", next);
            self.current = Some(next);
            self.bus.emit_lossy(PlayerEvent::CurrentItemChanged);
            if let Err(e) = self.play(Some(0.0)) {
                error!("Auto-advance failed to start item: {}", e);
                self.stop();
            }
        } else {
            debug!("Playlist finished");
            self.stop();
        }
    }

    /// Best-effort persistence of the ordered identity list; failures are
    /// logged and never affect playback state.
    fn persist_playlist(&self) {
        let Some(pool) = self.pool.clone() else { return };
        let name = self.playlist_name.clone();
        let identities: Vec<ItemIdentity> =
            self.items.iter().map(|i| i.identity().clone()).collect();
        tokio::spawn(async move {
            if let Err(e) = db::playlists::save_playlist(&pool, &name, &identities).await {
                warn!("Failed to persist playlist '{}': {}", name, e);
            }
        });
    }
}
