//! JSON wire format for a transport host.
//!
//! The engine itself knows nothing about sockets; a host marshals
//! [`ClientRequest`] frames into engine commands and engine state /
//! events back into [`ServerFrame`]s. Durations cross the wire as
//! fractional seconds and become `Duration` internally.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::config::ElevatorConfig;
use crate::event::{Event, EventPayload};
use crate::state::{Direction, DoorState, Snapshot};

/// Overload threshold applied to wire-initialised cars, which cannot
/// configure one.
pub const DEFAULT_MAX_WEIGHT: i32 = 1000;

/// Edge-time ratio applied to wire-initialised cars.
const EDGE_TIME_FACTOR: f64 = 1.5;

// ─── Client → server ────────────────────────────────────────────────

/// One client frame, tagged by its `action` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientRequest {
    Init { config: InitConfig },
    AddCall { floor: i32 },
    RemoveCall { floor: i32 },
    PressOpen,
    ReleaseOpen,
    PressClose,
    SetMode { mode: u8 },
    AddWeight { weight: i32 },
    SetWeight { weight: i32 },
    Reset,
    Stop,
    GetState,
}

/// Car configuration as sent by clients: durations in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitConfig {
    pub id: String,
    pub min_floor: i32,
    pub max_floor: i32,
    pub initial_floor: i32,
    pub travel_time: f64,
    pub door_speed: f64,
    pub door_open_time: f64,
    #[serde(default)]
    pub door_reopen_time: f64,
}

impl InitConfig {
    /// Build the engine configuration. The wire format carries no
    /// edge time or overload limit; both take their conventional
    /// defaults here.
    pub fn into_config(self) -> ElevatorConfig {
        ElevatorConfig {
            id: self.id,
            min_floor: self.min_floor,
            max_floor: self.max_floor,
            initial_floor: self.initial_floor,
            travel_time: Duration::from_secs_f64(self.travel_time.max(0.0)),
            travel_time_edge: Duration::from_secs_f64(
                (self.travel_time * EDGE_TIME_FACTOR).max(0.0),
            ),
            door_speed: Duration::from_secs_f64(self.door_speed.max(0.0)),
            door_open_time: Duration::from_secs_f64(self.door_open_time.max(0.0)),
            door_reopen_time: Duration::from_secs_f64(self.door_reopen_time.max(0.0)),
            max_weight: DEFAULT_MAX_WEIGHT,
            floor_configs: Default::default(),
        }
        .normalized()
    }
}

// ─── Server → client ────────────────────────────────────────────────

/// Door pair as rendered on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoorFrames {
    pub front: DoorState,
    pub rear: DoorState,
}

/// One server frame, tagged by its `type` field. A state frame
/// follows every event frame so clients never render stale state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    State {
        floor: i32,
        direction: Direction,
        doors: DoorFrames,
        mode: u8,
        call_floors: Vec<i32>,
        weight: i32,
        max_weight: i32,
    },
    #[serde(rename_all = "camelCase")]
    Event {
        event_type: &'static str,
        payload: EventPayload,
        timestamp: String,
    },
}

impl ServerFrame {
    /// Render a snapshot as a state frame.
    pub fn state(snapshot: &Snapshot, max_weight: i32) -> Self {
        Self::State {
            floor: snapshot.floor,
            direction: snapshot.direction,
            doors: DoorFrames {
                front: snapshot.doors.front,
                rear: snapshot.doors.rear,
            },
            mode: snapshot.mode as u8,
            call_floors: snapshot.call_floors.clone(),
            weight: snapshot.weight,
            max_weight,
        }
    }

    /// Render an engine event as an event frame.
    pub fn event(event: &Event) -> Self {
        Self::Event {
            event_type: event.event_type.as_str(),
            payload: event.payload.clone(),
            timestamp: format_timestamp(event.timestamp),
        }
    }
}

/// Wall-clock time of day as `HH:MM:SS` (UTC).
fn format_timestamp(time: SystemTime) -> String {
    let since_epoch = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    let in_day = since_epoch % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        in_day / 3600,
        (in_day % 3600) / 60,
        in_day % 60
    )
}

// ─── Tests ──────────────────────────────────────────────────────────
