//! Engine configuration

/// Default working sample rate for the render path (Hz)
///
/// All decoded audio is resampled to this rate at load, and output
/// hosts open their device at it.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Playlist engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Working sample rate (Hz) shared by resolver, graphs, and hosts
    pub working_sample_rate: u32,
    /// Event bus channel capacity
    pub event_capacity: usize,
    /// Name the playlist is persisted under when a database is attached
    pub playlist_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            working_sample_rate: DEFAULT_SAMPLE_RATE,
            event_capacity: 100,
            playlist_name: "Default".to_string(),
        }
    }
}
