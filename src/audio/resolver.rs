//! Media source resolution
//!
//! The [`MediaResolver`] trait is the seam between playback and media
//! access: given an item's locator it produces the decoded, stereo,
//! working-rate PCM the render graph schedules from. Load failures
//! surface as [`Error::Load`] and leave the item errored.

use crate::audio::{decode, resample, types::Pcm};
use crate::error::Result;
use std::path::Path;
use tracing::debug;

/// Resolves an item locator into schedulable PCM.
///
/// Implementations run on the blocking pool (decode is CPU-bound), so
/// they must be `Send + Sync` and self-contained.
pub trait MediaResolver: Send + Sync {
    /// Decode the source at `locator` into stereo PCM at the working rate.
    fn resolve(&self, locator: &Path) -> Result<Pcm>;
}

/// File resolver backed by symphonia + rubato.
pub struct SymphoniaResolver {
    working_sample_rate: u32,
}

impl SymphoniaResolver {
    /// Create a resolver targeting the engine's working sample rate.
    pub fn new(working_sample_rate: u32) -> Self {
        Self {
            working_sample_rate,
        }
    }
}

impl MediaResolver for SymphoniaResolver {
    fn resolve(&self, locator: &Path) -> Result<Pcm> {
        let (samples, source_rate, channels) = decode::decode_file(locator)?;
        let stereo = resample::to_stereo(samples, channels);
        let converted = resample::resample(&stereo, source_rate, self.working_sample_rate, 2)?;

        let pcm = Pcm::new(converted, self.working_sample_rate);
        debug!(
            "Resolved {}: {:.3}s at {}Hz",
            locator.display(),
            pcm.duration_seconds(),
            self.working_sample_rate
        );
        Ok(pcm)
    }
}
