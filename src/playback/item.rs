//! Playable item state machine
//!
//! A [`PlayableItem`] is one schedulable audio source: identity and title,
//! a load lifecycle (`Unloaded → Loading → Loaded | Errored`), and the
//! seek/pause bookkeeping that turns the owned graph's render clock into a
//! playhead position. Each item owns exactly one [`AudioGraph`], created
//! with it and torn down when the item is dropped.

use crate::audio::graph::AudioGraph;
use crate::audio::graph::SegmentComplete;
use crate::audio::host::RenderHostFactory;
use crate::audio::types::Pcm;
use crate::error::{Error, Result};
use crate::playback::types::{ItemDescriptor, ItemIdentity, LoopRegion};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use uuid::Uuid;

/// Load lifecycle. `Errored` is terminal until an explicit re-enqueue.
enum LoadState {
    Unloaded,
    Loading,
    Loaded(LoadedAudio),
    Errored,
}

struct LoadedAudio {
    pcm: Arc<Pcm>,
    duration: f64,
}

/// Result of a play-shaped command on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A segment was scheduled
    Started,
    /// The resolved position was at/past the loop end: counted as one
    /// completed lap and restarted from the loop start
    LoopWrapped,
    /// The resolved position was at/past the end; nothing scheduled
    Finished,
}

/// What a completion notice meant, once checked against the generation.
#[derive(Debug)]
pub enum CompletionOutcome {
    /// From a superseded segment; no effect
    Stale,
    /// The active loop lapped and was re-scheduled from its start
    LoopCompleted,
    /// The item ran to its natural end
    Finished,
    /// Loop re-scheduling failed
    Failed(Error),
}

/// Load attempt result as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed,
    /// The item was not waiting for a load (superseded attempt)
    Ignored,
}

/// One entry of the playlist, bound 1:1 to its render graph.
pub struct PlayableItem {
    instance: Uuid,
    descriptor: ItemDescriptor,
    load: LoadState,
    graph: AudioGraph,
    /// Position the active segment was scheduled from
    seek_offset: f64,
    /// Resume point recorded by pause, cleared by play/stop
    pause_offset: Option<f64>,
    region: Option<LoopRegion>,
    /// Bumped by every transport command; completion notices carrying an
    /// older value are stale
    generation: u64,
}

impl PlayableItem {
    pub fn new(
        descriptor: ItemDescriptor,
        host_factory: &dyn RenderHostFactory,
        completion_tx: UnboundedSender<SegmentComplete>,
    ) -> Self {
        Self {
            instance: Uuid::new_v4(),
            descriptor,
            load: LoadState::Unloaded,
            graph: AudioGraph::new(host_factory.open(), completion_tx),
            seek_offset: 0.0,
            pause_offset: None,
            region: None,
            generation: 0,
        }
    }

    /// Unique handle for this playlist entry (identities may repeat)
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn identity(&self) -> &ItemIdentity {
        &self.descriptor.identity
    }

    pub fn title(&self) -> &str {
        &self.descriptor.title
    }

    pub fn locator(&self) -> &Path {
        &self.descriptor.locator
    }

    pub fn descriptor(&self) -> &ItemDescriptor {
        &self.descriptor
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.load, LoadState::Loaded(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.load, LoadState::Loading)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.load, LoadState::Errored)
    }

    /// Duration in seconds, known only once loaded
    pub fn duration(&self) -> Option<f64> {
        match &self.load {
            LoadState::Loaded(audio) => Some(audio.duration),
            _ => None,
        }
    }

    /// Sample rate of the loaded audio (the working rate)
    pub fn sample_rate(&self) -> Option<u32> {
        match &self.load {
            LoadState::Loaded(audio) => Some(audio.pcm.sample_rate()),
            _ => None,
        }
    }

    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.region
    }

    /// Current playhead position in seconds; 0 before the item is loaded.
    pub fn time(&self) -> f64 {
        if !self.is_loaded() {
            return 0.0;
        }
        if let Some(t) = self.pause_offset {
            return t;
        }
        self.seek_offset + self.graph.render_elapsed_seconds().unwrap_or(0.0)
    }

    /// Move to `Loading` and hand back the locator to decode, or `None`
    /// when a load is already underway or done.
    pub fn begin_load(&mut self) -> Option<PathBuf> {
        match self.load {
            LoadState::Loading | LoadState::Loaded(_) => None,
            LoadState::Unloaded | LoadState::Errored => {
                self.load = LoadState::Loading;
                Some(self.descriptor.locator.clone())
            }
        }
    }

    /// Record the outcome of the decode started by [`Self::begin_load`].
    pub fn finish_load(&mut self, result: Result<Pcm>) -> LoadOutcome {
        if !matches!(self.load, LoadState::Loading) {
            return LoadOutcome::Ignored;
        }
        match result {
            Ok(pcm) => {
                let duration = pcm.duration_seconds();
                debug!(
                    "'{}' loaded: {:.2}s at {} Hz",
                    self.descriptor.title,
                    duration,
                    pcm.sample_rate()
                );
                self.load = LoadState::Loaded(LoadedAudio {
                    pcm: Arc::new(pcm),
                    duration,
                });
                LoadOutcome::Loaded
            }
            Err(e) => {
                warn!("'{}' failed to load: {}", self.descriptor.title, e);
                self.load = LoadState::Errored;
                LoadOutcome::Failed
            }
        }
    }

    /// Start (or re-start) playback.
    ///
    /// The position is the explicit `time`, else the pause resume point,
    /// else 0, then constrained by the active loop: below the loop start
    /// clamps up to it, at or past the loop end counts one lap and
    /// restarts from the start.
    ///
    /// # Errors
    /// `InvalidState` when the item is not loaded (the engine defers the
    /// command as a pending intent instead of calling this), or the
    /// host's engine-start error.
    pub fn play(&mut self, time: Option<f64>) -> Result<PlayOutcome> {
        let (pcm, duration) = match &self.load {
            LoadState::Loaded(audio) => (Arc::clone(&audio.pcm), audio.duration),
            _ => {
                return Err(Error::InvalidState(format!(
                    "'{}' is not loaded",
                    self.descriptor.title
                )))
            }
        };

        self.generation += 1;
        self.graph.ensure_started()?;

        let mut resolved = time.or(self.pause_offset).unwrap_or(0.0).max(0.0);
        let mut wrapped = false;
        if let Some(region) = self.region {
            if resolved >= region.end {
                wrapped = true;
                resolved = region.start;
            } else if resolved < region.start {
                resolved = region.start;
            }
        }
        self.pause_offset = None;

        let end_seconds = self.region.map(|r| r.end).unwrap_or(duration).min(duration);
        let start_frame = pcm.frame_at(resolved);
        let end_frame = pcm.frame_at(end_seconds);

        if start_frame >= end_frame {
            // Nothing left to render from here
            self.graph.stop();
            self.seek_offset = duration;
            return Ok(PlayOutcome::Finished);
        }

        self.seek_offset = resolved;
        self.graph
            .schedule(pcm, start_frame, end_frame, self.instance, self.generation);
        debug!(
            "'{}' scheduled frames {}..{} (gen {})",
            self.descriptor.title, start_frame, end_frame, self.generation
        );

        Ok(if wrapped {
            PlayOutcome::LoopWrapped
        } else {
            PlayOutcome::Started
        })
    }

    /// Freeze the playhead and stop rendering; the next play resumes here.
    pub fn pause(&mut self) {
        if !self.is_loaded() {
            return;
        }
        let t = self.time();
        self.generation += 1;
        self.pause_offset = Some(t);
        self.seek_offset = t;
        self.graph.stop();
    }

    /// Stop rendering and clear the resume point.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.pause_offset = None;
        self.graph.stop();
    }

    /// Apply a loop and start playing it from its start.
    ///
    /// # Errors
    /// `InvalidState` before load; `InvalidTiming` when the region lies
    /// past the item's duration.
    pub fn set_loop(&mut self, region: LoopRegion) -> Result<PlayOutcome> {
        let duration = self.duration().ok_or_else(|| {
            Error::InvalidState(format!("'{}' is not loaded", self.descriptor.title))
        })?;
        let clamped = region.clamped_to(duration)?;
        self.region = Some(clamped);
        self.play(Some(clamped.start))
    }

    /// Drop the loop constraint. The caller re-schedules if needed.
    pub fn clear_loop(&mut self) {
        self.region = None;
    }

    /// React to a completion notice from the render side.
    ///
    /// Only a notice carrying the current generation takes effect; with a
    /// loop set it re-schedules the next lap, otherwise the item parks at
    /// its end.
    pub fn handle_completion(&mut self, generation: u64) -> CompletionOutcome {
        if generation != self.generation {
            return CompletionOutcome::Stale;
        }
        if self.region.is_some() {
            match self.play(None) {
                Ok(_) => CompletionOutcome::LoopCompleted,
                Err(e) => CompletionOutcome::Failed(e),
            }
        } else {
            let duration = self.duration().unwrap_or(0.0);
            self.graph.stop();
            self.pause_offset = None;
            self.seek_offset = duration;
            CompletionOutcome::Finished
        }
    }

    pub fn set_pitch_cents(&self, cents: f32) {
        self.graph.set_pitch_cents(cents);
    }

    pub fn pitch_cents(&self) -> f32 {
        self.graph.pitch_cents()
    }

    pub fn set_tempo_ratio(&self, ratio: f64) {
        self.graph.set_tempo_ratio(ratio);
    }

    pub fn tempo_ratio(&self) -> f64 {
        self.graph.tempo_ratio()
    }
}
