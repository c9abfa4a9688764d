//! Domain enums and shared value types for the elevator engine.
//!
//! All enums use `#[repr(u8)]` for compact layout and stable wire
//! integers. String forms (serde variant names) match the JSON wire
//! format of the transport layer.

use serde::{Deserialize, Serialize};

// ─── Direction ──────────────────────────────────────────────────────

/// Vertical movement vector of the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Moving or scheduled to move upward.
    Up = 0,
    /// Moving or scheduled to move downward.
    Down = 1,
    /// At rest, no heading.
    None = 2,
}

impl Direction {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::None),
            _ => None,
        }
    }

    /// Returns true for an actual heading (Up or Down).
    #[inline]
    pub const fn is_moving(&self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::None
    }
}

// ─── Door side ──────────────────────────────────────────────────────

/// Door location selector. `Front` and `Rear` are single panels;
/// `Both` selects the two of them (bitmask semantics: 1 | 2 = 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DoorSide {
    Front = 1,
    Rear = 2,
    Both = 3,
}

impl DoorSide {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Front),
            2 => Some(Self::Rear),
            3 => Some(Self::Both),
            _ => None,
        }
    }

    /// Whether this selector covers the given single panel.
    #[inline]
    pub const fn includes(&self, side: DoorSide) -> bool {
        (*self as u8) & (side as u8) != 0
    }
}

impl Default for DoorSide {
    fn default() -> Self {
        Self::Front
    }
}

// ─── Door state ─────────────────────────────────────────────────────

/// Physical state of one door panel.
///
/// Legal progression is Close → Opening → Open → Closing → Close; the
/// only backward edge is the reopen path Closing → Opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DoorState {
    Close = 0,
    Opening = 1,
    Open = 2,
    Closing = 3,
}

impl DoorState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Close),
            1 => Some(Self::Opening),
            2 => Some(Self::Open),
            3 => Some(Self::Closing),
            _ => None,
        }
    }
}

impl Default for DoorState {
    fn default() -> Self {
        Self::Close
    }
}

// ─── Operation mode ─────────────────────────────────────────────────

/// Control strategy of the car. Wire integers are part of the
/// transport contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationMode {
    /// Automatic operation (default).
    Auto = 0,
    /// Manual override, e.g. inspection.
    Manual = 1,
    /// Furniture-moving mode: the scheduler is suspended.
    Moving = 2,
    /// Emergency stop: no motion, timers halted.
    Emergency = 3,
}

impl OperationMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Auto),
            1 => Some(Self::Manual),
            2 => Some(Self::Moving),
            3 => Some(Self::Emergency),
            _ => None,
        }
    }
}

impl Default for OperationMode {
    fn default() -> Self {
        Self::Auto
    }
}

// ─── Call origin ────────────────────────────────────────────────────

/// Where a call came from. The engine treats both identically; the
/// origin only labels log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallOrigin {
    /// Button inside the car.
    Car,
    /// Button on a landing.
    Hall,
}

impl CallOrigin {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Hall => "hall",
        }
    }
}

// ─── Door bank ──────────────────────────────────────────────────────

/// The front/rear door pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorBank {
    pub front: DoorState,
    pub rear: DoorState,
}

impl DoorBank {
    /// State of a single panel. `Both` reads the front panel.
    #[inline]
    pub const fn get(&self, side: DoorSide) -> DoorState {
        match side {
            DoorSide::Rear => self.rear,
            _ => self.front,
        }
    }

    /// Set one panel, or both for `DoorSide::Both`.
    pub fn set(&mut self, side: DoorSide, state: DoorState) {
        if side.includes(DoorSide::Front) {
            self.front = state;
        }
        if side.includes(DoorSide::Rear) {
            self.rear = state;
        }
    }

    /// True when both panels are fully closed.
    #[inline]
    pub const fn all_closed(&self) -> bool {
        matches!(self.front, DoorState::Close) && matches!(self.rear, DoorState::Close)
    }

    /// The state of whichever panel is active: the front panel unless
    /// it is closed, then the rear panel. `Close` means both are idle.
    #[inline]
    pub const fn active_state(&self) -> DoorState {
        match self.front {
            DoorState::Close => self.rear,
            state => state,
        }
    }
}

// ─── Snapshot ───────────────────────────────────────────────────────

/// Consistent point-in-time view of the car, taken atomically under
/// the state lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub floor: i32,
    pub direction: Direction,
    pub doors: DoorBank,
    pub weight: i32,
    pub mode: OperationMode,
    /// Pending call floors in ascending order.
    pub call_floors: Vec<i32>,
}

// ─── Tests ──────────────────────────────────────────────────────────
