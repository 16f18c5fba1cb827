//! Per-item render graph
//!
//! Each playable item owns one [`AudioGraph`]: a render host pulling
//! interleaved stereo at the working rate, a time/pitch node, and at most
//! one scheduled source segment. The graph renders the segment (through
//! the node, or bypassing it when both parameters are neutral), counts
//! consumed source frames as the playback clock, and reports segment
//! completion over a channel exactly once per schedule.

use crate::audio::host::{RenderFn, RenderHost};
use crate::audio::timepitch::TimePitchNode;
use crate::audio::types::Pcm;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Sent when a scheduled segment has consumed its last source frame.
///
/// Carries the scheduling generation so stale completions (from a segment
/// that was since replaced) can be discarded by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentComplete {
    pub item: Uuid,
    pub generation: u64,
}

/// The segment currently being rendered.
struct ActiveSegment {
    source: Arc<Pcm>,
    next_frame: usize,
    end_frame: usize,
    item: Uuid,
    generation: u64,
}

/// State shared with the render callback.
struct GraphState {
    active: Option<ActiveSegment>,
    node: TimePitchNode,
    prev_bypass: bool,
    scratch: Vec<f32>,
}

/// Render graph for one playable item.
pub struct AudioGraph {
    host: Box<dyn RenderHost>,
    state: Arc<Mutex<GraphState>>,
    /// Source frames consumed since the last schedule (the playback clock)
    rendered_frames: Arc<AtomicU64>,
    ever_started: AtomicBool,
    sample_rate: u32,
    completion_tx: UnboundedSender<SegmentComplete>,
}

impl AudioGraph {
    /// Build a graph over `host`, reporting completions on `completion_tx`.
    pub fn new(host: Box<dyn RenderHost>, completion_tx: UnboundedSender<SegmentComplete>) -> Self {
        let sample_rate = host.sample_rate();
        let state = GraphState {
            active: None,
            node: TimePitchNode::new(sample_rate),
            prev_bypass: true,
            scratch: Vec::new(),
        };
        Self {
            host,
            state: Arc::new(Mutex::new(state)),
            rendered_frames: Arc::new(AtomicU64::new(0)),
            ever_started: AtomicBool::new(false),
            sample_rate,
            completion_tx,
        }
    }

    /// Start the host if it is not already pulling audio.
    ///
    /// # Errors
    /// Propagates host start failures (device acquisition, stream build).
    pub fn ensure_started(&mut self) -> Result<()> {
        if self.host.is_running() {
            return Ok(());
        }
        let state = Arc::clone(&self.state);
        let rendered = Arc::clone(&self.rendered_frames);
        let tx = self.completion_tx.clone();
        let render: RenderFn = Box::new(move |buf| render_block(&state, &rendered, &tx, buf));
        self.host.start(render)?;
        self.ever_started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Replace the scheduled segment and reset the playback clock.
    ///
    /// `start_frame..end_frame` is clamped to the source length. Rendering
    /// begins on the next host callback (once the host is started).
    pub fn schedule(
        &self,
        source: Arc<Pcm>,
        start_frame: usize,
        end_frame: usize,
        item: Uuid,
        generation: u64,
    ) {
        let end_frame = end_frame.min(source.frame_count());
        let start_frame = start_frame.min(end_frame);

        let mut state = self.state.lock().unwrap();
        state.node.reset();
        state.prev_bypass = state.node.is_bypass();
        state.active = Some(ActiveSegment {
            source,
            next_frame: start_frame,
            end_frame,
            item,
            generation,
        });
        self.rendered_frames.store(0, Ordering::SeqCst);
    }

    /// Stop the host and drop any scheduled segment without completing it.
    pub fn stop(&mut self) {
        self.host.stop();
        let mut state = self.state.lock().unwrap();
        state.active = None;
        state.node.reset();
        self.rendered_frames.store(0, Ordering::SeqCst);
    }

    /// Whether a segment is scheduled and not yet finished
    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active.is_some()
    }

    /// Whether the host is pulling audio
    pub fn is_running(&self) -> bool {
        self.host.is_running()
    }

    /// Source seconds consumed since the last schedule, or `None` if this
    /// graph has never been started.
    pub fn render_elapsed_seconds(&self) -> Option<f64> {
        if !self.ever_started.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.rendered_frames.load(Ordering::SeqCst) as f64 / self.sample_rate as f64)
    }

    /// Working sample rate of the graph's host
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_pitch_cents(&self, cents: f32) {
        self.state.lock().unwrap().node.set_pitch_cents(cents);
    }

    pub fn pitch_cents(&self) -> f32 {
        self.state.lock().unwrap().node.pitch_cents()
    }

    pub fn set_tempo_ratio(&self, ratio: f64) {
        self.state.lock().unwrap().node.set_tempo_ratio(ratio);
    }

    pub fn tempo_ratio(&self) -> f64 {
        self.state.lock().unwrap().node.tempo_ratio()
    }
}

/// One host callback: render into `buf` (interleaved stereo, zeroed on
/// entry) and advance the active segment.
fn render_block(
    state: &Mutex<GraphState>,
    rendered: &AtomicU64,
    tx: &UnboundedSender<SegmentComplete>,
    buf: &mut [f32],
) {
    buf.fill(0.0);

    let mut guard = state.lock().unwrap();
    let state = &mut *guard;
    let Some(active) = state.active.as_mut() else {
        return;
    };

    let bypass = state.node.is_bypass();
    if bypass != state.prev_bypass {
        // Parameter flip mid-stream: discard stale stretch state
        state.node.reset();
        state.prev_bypass = bypass;
    }

    let out_frames = buf.len() / 2;
    let remaining = active.end_frame.saturating_sub(active.next_frame);

    let consumed = if remaining == 0 {
        0
    } else if bypass {
        let want = out_frames.min(remaining);
        active.source.read_frames(active.next_frame, &mut buf[..want * 2])
    } else {
        let want = state.node.source_frames_for(out_frames).min(remaining);
        if state.scratch.len() < want * 2 {
            state.scratch.resize(want * 2, 0.0);
        }
        let got = active
            .source
            .read_frames(active.next_frame, &mut state.scratch[..want * 2]);
        state.node.process(&state.scratch[..got * 2], buf);
        got
    };

    active.next_frame += consumed;
    rendered.fetch_add(consumed as u64, Ordering::SeqCst);

    if active.next_frame >= active.end_frame {
        let item = active.item;
        let generation = active.generation;
        state.active = None;
        let _ = tx.send(SegmentComplete { item, generation });
    }
}
