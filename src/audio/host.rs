//! Output host abstraction
//!
//! A render graph pulls audio through a [`RenderHost`]: the host owns the
//! real-time side (device stream or a hand-driven equivalent) and invokes
//! the installed render callback to fill interleaved stereo buffers at the
//! working sample rate. One host is opened per graph, so each playable
//! item owns its output end to end.

use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Render callback: fills an interleaved stereo buffer at the working rate.
pub type RenderFn = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// One output endpoint a graph renders into.
pub trait RenderHost: Send {
    /// Install `render` and begin pulling audio.
    ///
    /// Callers must not invoke this while the host is running; graphs
    /// check [`RenderHost::is_running`] first. Fails with an engine-start
    /// error when the platform output cannot be acquired.
    fn start(&mut self, render: RenderFn) -> Result<()>;

    /// Stop pulling audio and drop the installed callback. Idempotent.
    fn stop(&mut self);

    /// Whether the host is currently pulling audio
    fn is_running(&self) -> bool;

    /// Sample rate the host renders at (the working rate)
    fn sample_rate(&self) -> u32;
}

/// Opens one host per render graph.
pub trait RenderHostFactory: Send + Sync {
    fn open(&self) -> Box<dyn RenderHost>;
}

type CallbackSlot = Arc<Mutex<Option<RenderFn>>>;

/// Host with no device behind it: audio advances only when its
/// [`ManualDriver`] is told to render.
///
/// This is the render-thread model made explicit, used by the test suites
/// and by headless embeddings that render offline.
pub struct ManualHost {
    slot: CallbackSlot,
    running: Arc<AtomicBool>,
    sample_rate: u32,
}

impl ManualHost {
    /// Create a host and the driver that advances it.
    pub fn new(sample_rate: u32) -> (Self, ManualDriver) {
        let slot: CallbackSlot = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(false));
        let driver = ManualDriver {
            slot: Arc::clone(&slot),
            running: Arc::clone(&running),
            sample_rate,
        };
        (
            Self {
                slot,
                running,
                sample_rate,
            },
            driver,
        )
    }
}

impl Drop for ManualHost {
    fn drop(&mut self) {
        // Leave any outstanding driver clones inert
        self.stop();
    }
}

impl RenderHost for ManualHost {
    fn start(&mut self, render: RenderFn) -> Result<()> {
        *self.slot.lock().unwrap() = Some(render);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        *self.slot.lock().unwrap() = None;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Drives a [`ManualHost`]'s render callback from the calling thread.
#[derive(Clone)]
pub struct ManualDriver {
    slot: CallbackSlot,
    running: Arc<AtomicBool>,
    sample_rate: u32,
}

impl ManualDriver {
    /// Render `frames` frames in device-sized chunks, discarding output.
    ///
    /// No-op while the host is stopped, exactly as a real device callback
    /// never fires on a stopped stream.
    pub fn advance_frames(&self, frames: usize) {
        let _ = self.render(frames, false);
    }

    /// Render `seconds` worth of frames at the host rate.
    pub fn advance_seconds(&self, seconds: f64) {
        self.advance_frames((seconds * self.sample_rate as f64).round() as usize);
    }

    /// Render `frames` frames and return the produced interleaved audio.
    pub fn advance_collect(&self, frames: usize) -> Vec<f32> {
        self.render(frames, true).unwrap_or_default()
    }

    /// Whether the host end is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Host sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn render(&self, frames: usize, collect: bool) -> Option<Vec<f32>> {
        const CHUNK_FRAMES: usize = 1024;

        let mut collected = if collect {
            Some(Vec::with_capacity(frames * 2))
        } else {
            None
        };
        let mut remaining = frames;
        let mut chunk = vec![0.0f32; CHUNK_FRAMES * 2];

        while remaining > 0 {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let n = remaining.min(CHUNK_FRAMES);
            let buf = &mut chunk[..n * 2];
            {
                let mut slot = self.slot.lock().unwrap();
                match slot.as_mut() {
                    Some(render) => render(buf),
                    None => break,
                }
            }
            if let Some(ref mut out) = collected {
                out.extend_from_slice(buf);
            }
            remaining -= n;
        }

        collected
    }
}

/// Factory producing [`ManualHost`]s, retaining each driver in open order.
pub struct ManualHostFactory {
    sample_rate: u32,
    drivers: Mutex<Vec<ManualDriver>>,
}

impl ManualHostFactory {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            drivers: Mutex::new(Vec::new()),
        }
    }

    /// Driver for the `index`-th opened host (items open hosts in
    /// playlist insertion order).
    pub fn driver(&self, index: usize) -> Option<ManualDriver> {
        self.drivers.lock().unwrap().get(index).cloned()
    }

    /// Number of hosts opened so far
    pub fn opened(&self) -> usize {
        self.drivers.lock().unwrap().len()
    }
}

impl RenderHostFactory for ManualHostFactory {
    fn open(&self) -> Box<dyn RenderHost> {
        let (host, driver) = ManualHost::new(self.sample_rate);
        self.drivers.lock().unwrap().push(driver);
        Box::new(host)
    }
}
