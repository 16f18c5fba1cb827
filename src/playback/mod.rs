//! Playback orchestration
//!
//! The playlist engine, its items, and the shared playback vocabulary
//! types. Audio rendering lives in [`crate::audio`]; this module owns
//! the control path.

pub mod engine;
pub mod item;
pub mod types;

pub use engine::PlaylistEngine;
pub use item::{CompletionOutcome, LoadOutcome, PlayOutcome, PlayableItem};
pub use types::{ItemDescriptor, ItemIdentity, LoopRegion, PendingIntent, TransportState};
