//! # Woodshed
//!
//! Gapless, loop-capable playback engine with live pitch and tempo
//! control, built for music practice.
//!
//! **Purpose:** Decode audio files into memory, play them as an ordered
//! playlist with seamless auto-advance, loop arbitrary regions, shift
//! pitch in semitones and tempo in percent without affecting each other,
//! and persist playlists and practice bookmarks.
//!
//! **Architecture:** One render graph per playlist item (decode →
//! time/pitch stretch → output host), a playlist engine serializing all
//! control-path state behind an async mutex, and a broadcast event feed
//! observers re-query state on.

pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod playback;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use events::{EventBus, PlayerEvent};
pub use playback::{
    ItemDescriptor, ItemIdentity, LoopRegion, PlaylistEngine, TransportState,
};
