//! Playback types shared across modules

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable identity of a playable item, independent of playlist position.
///
/// `kind` namespaces the id: "file" for local paths, or whatever tag a
/// host library uses for its own identifiers. Bookmarks and persisted
/// adjustments key on this pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemIdentity {
    pub kind: String,
    pub id: String,
}

impl ItemIdentity {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Identity for a local file, keyed by its path
    pub fn file(path: &Path) -> Self {
        Self::new("file", path.to_string_lossy())
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Everything needed to add one item to the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDescriptor {
    pub identity: ItemIdentity,
    pub title: String,
    /// Source the media resolver decodes from
    pub locator: PathBuf,
}

impl ItemDescriptor {
    pub fn new(identity: ItemIdentity, title: impl Into<String>, locator: PathBuf) -> Self {
        Self {
            identity,
            title: title.into(),
            locator,
        }
    }

    /// Descriptor for a local file, titled by its file stem
    pub fn from_path(path: PathBuf) -> Self {
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            identity: ItemIdentity::file(&path),
            title,
            locator: path,
        }
    }
}

/// Engine transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// A loop constraint: playback stays within `[start, end)` seconds.
///
/// Construction checks only internal consistency; the region is clamped
/// against the owning item's duration when applied, since duration is
/// unknown until the item loads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopRegion {
    pub start: f64,
    pub end: f64,
}

impl LoopRegion {
    /// # Errors
    /// `InvalidTiming` when `start` is negative or not before `end`.
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if start < 0.0 || start >= end {
            return Err(Error::InvalidTiming(format!(
                "loop region [{:.3}, {:.3}) is not a valid range",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Clamp the region's end to a known duration.
    ///
    /// # Errors
    /// `InvalidTiming` when the region lies entirely past the duration.
    pub fn clamped_to(self, duration: f64) -> Result<Self> {
        let end = self.end.min(duration);
        if self.start >= end {
            return Err(Error::InvalidTiming(format!(
                "loop start {:.3} is past the item duration {:.3}",
                self.start, duration
            )));
        }
        Ok(Self {
            start: self.start,
            end,
        })
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// A command deferred until the current item finishes loading.
///
/// At most one exists at a time; a newer command replaces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingIntent {
    /// Play, optionally seeking first
    Play(Option<f64>),
    /// Apply a loop and start playing it
    Loop(LoopRegion),
}
