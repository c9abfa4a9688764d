//! State-change events and the bounded, non-blocking publisher.
//!
//! Events are a diagnostic side channel, not a correctness channel:
//! when the buffer is full the event is dropped and counted rather
//! than blocking the engine. Consumers that need a lossless stream
//! must buffer on their side.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::state::{Direction, DoorSide, DoorState, OperationMode};

/// Buffered events before the publisher starts dropping.
pub const EVENT_CAPACITY: usize = 1024;

/// A saturated channel logs on the first drop, then every Nth.
const DROP_LOG_INTERVAL: u64 = 100;

// ─── Event types ────────────────────────────────────────────────────

/// Category of a state-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    FloorChange,
    DirectionChange,
    DoorChange,
    ModeChange,
    Arrived,
    Error,
}

impl EventType {
    /// Wire name, identical to the variant name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FloorChange => "FloorChange",
            Self::DirectionChange => "DirectionChange",
            Self::DoorChange => "DoorChange",
            Self::ModeChange => "ModeChange",
            Self::Arrived => "Arrived",
            Self::Error => "Error",
        }
    }
}

/// Payload carried by an [`Event`], one variant per [`EventType`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// New floor after a completed hop.
    Floor(i32),
    /// New heading.
    Direction(Direction),
    /// One panel changed state.
    Door { side: DoorSide, state: DoorState },
    /// New operation mode. Mode crosses the wire as an integer, like
    /// everywhere else in the transport contract.
    Mode(#[serde(serialize_with = "mode_as_wire_int")] OperationMode),
    /// The car arrived and is opening the configured side(s).
    #[serde(rename_all = "camelCase")]
    Arrived {
        floor: i32,
        open_door_side: DoorSide,
    },
    /// Free-form diagnostic.
    Message(String),
}

fn mode_as_wire_int<S>(mode: &OperationMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u8(*mode as u8)
}

/// A state-change notification with its wall-clock timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: EventType,
    pub payload: EventPayload,
    pub timestamp: SystemTime,
}

// ─── Event bus ──────────────────────────────────────────────────────

/// Bounded fan-out channel for engine events.
///
/// `publish` never blocks; overflow increments the drop counter.
/// The bus keeps one receiver alive internally so publishing before
/// any observer subscribes is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue an event, timestamped now. Drops on a full buffer.
    pub fn publish(&self, event_type: EventType, payload: EventPayload) {
        let event = Event {
            event_type,
            payload,
            timestamp: SystemTime::now(),
        };
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % DROP_LOG_INTERVAL == 1 {
                    warn!(dropped, event_type = event_type.as_str(), "event channel saturated");
                }
            }
        }
    }

    /// The read side. Multiple subscribers compete for events.
    pub fn subscribe(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    /// Events discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
