//! Core audio data types
//!
//! Decoded audio buffers shared between the loader and the render path.

/// Pcm holds one item's decoded and resampled audio, ready to schedule.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Stereo interleaved: [L, R, L, R, ...]
/// - Sample rate is the engine's working rate after resampling
#[derive(Debug, Clone)]
pub struct Pcm {
    /// PCM audio samples (interleaved stereo)
    samples: Vec<f32>,

    /// Sample rate after resampling (working rate)
    sample_rate: u32,

    /// Number of stereo frames (samples.len() / 2)
    frame_count: usize,
}

impl Pcm {
    /// Create a Pcm buffer from interleaved stereo samples
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        debug_assert!(samples.len() % 2 == 0, "samples must be stereo pairs");
        let frame_count = samples.len() / 2;
        Self {
            samples,
            sample_rate,
            frame_count,
        }
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of stereo frames
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.sample_rate as f64
    }

    /// Copy frames starting at `start_frame` into `out` (interleaved stereo).
    ///
    /// Copies as many whole frames as fit in `out` and remain in the
    /// buffer; returns the number of frames copied. Short or zero copies
    /// past the end are not an error.
    pub fn read_frames(&self, start_frame: usize, out: &mut [f32]) -> usize {
        if start_frame >= self.frame_count {
            return 0;
        }
        let want = out.len() / 2;
        let have = self.frame_count - start_frame;
        let n = want.min(have);
        let src = start_frame * 2;
        out[..n * 2].copy_from_slice(&self.samples[src..src + n * 2]);
        n
    }

    /// Convert a time in seconds to a frame index, clamped to the buffer
    pub fn frame_at(&self, seconds: f64) -> usize {
        if seconds <= 0.0 {
            return 0;
        }
        let frame = (seconds * self.sample_rate as f64) as usize;
        frame.min(self.frame_count)
    }
}
