//! Event types for the woodshed engine
//!
//! Provides the event feed emitted by the playlist engine and the EventBus
//! observers subscribe to.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Engine event types
///
/// Events are change signals, not state carriers: observers re-query the
/// engine for whatever they need. Broadcast via [`EventBus`]; serializable
/// so hosts can forward them over whatever transport they embed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playlist composition changed (items added)
    ///
    /// Triggers:
    /// - UI: Re-query the playlist listing
    /// - Persistence: Ordered identity list was re-saved
    PlaylistChanged,

    /// A different item became current (or none is current after a stop)
    ///
    /// Triggers:
    /// - UI: Re-query current index, title, duration
    /// - Bookmark display: Re-query bookmarks for the new identity
    CurrentItemChanged,

    /// An item finished loading and is ready to schedule
    ///
    /// Emitted for every load completion, whether or not a pending
    /// intent consumed it.
    ItemLoaded,

    /// An item failed to load
    ///
    /// The item stays errored until explicitly re-enqueued; playback
    /// never auto-advances past it.
    ItemFailed,

    /// Engine pitch adjustment changed
    PitchChanged,

    /// Engine tempo adjustment changed
    TempoChanged,

    /// Active loop set, replaced, or cleared
    LoopChanged,

    /// The active loop wrapped one lap
    ///
    /// No engine-level transition; emitted for bookmark/UI observers
    /// (lap counters, loop-practice statistics).
    LoopCompleted,
}

impl PlayerEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::PlaylistChanged => "PlaylistChanged",
            PlayerEvent::CurrentItemChanged => "CurrentItemChanged",
            PlayerEvent::ItemLoaded => "ItemLoaded",
            PlayerEvent::ItemFailed => "ItemFailed",
            PlayerEvent::PitchChanged => "PitchChanged",
            PlayerEvent::TempoChanged => "TempoChanged",
            PlayerEvent::LoopChanged => "LoopChanged",
            PlayerEvent::LoopCompleted => "LoopCompleted",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the engine)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use woodshed::events::{EventBus, PlayerEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit(PlayerEvent::PlaylistChanged).ok();
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Capacity is the number of events buffered per subscriber before
    /// old events are dropped (the subscriber then observes a lag error,
    /// not a missed-state bug, since events carry no payload).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` when no subscribers are listening.
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// The engine emits this way: running without observers is normal.
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
