//! Immutable engine configuration: floor range, travel and door
//! timings, overload limit, per-floor settings.
//!
//! Loading follows a raw-parse → normalise → validate pipeline: TOML
//! carries durations as fractional seconds, the runtime config holds
//! `std::time::Duration`. Missing per-floor entries are filled with
//! defaults so lookups never miss at runtime.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::state::DoorSide;

/// Default edge-to-cruise ratio when `travel_time_edge` is not given:
/// starting and stopping takes half again as long as cruising.
const EDGE_TIME_FACTOR: f64 = 1.5;

// ─── Per-floor settings ─────────────────────────────────────────────

/// Settings for a single floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FloorConfig {
    /// Floor number. May be negative (basements); 0 is ground.
    pub floor: i32,
    /// Whether the car may be called to this floor.
    #[serde(default = "default_accessible")]
    pub accessible: bool,
    /// Which panel(s) open on arrival.
    #[serde(default)]
    pub open_door_side: DoorSide,
}

fn default_accessible() -> bool {
    true
}

impl FloorConfig {
    /// The default settings for a floor missing from the config:
    /// accessible, front door.
    pub const fn fallback(floor: i32) -> Self {
        Self {
            floor,
            accessible: true,
            open_door_side: DoorSide::Front,
        }
    }
}

// ─── Engine configuration ───────────────────────────────────────────

/// Immutable configuration for one car. Construct directly or load
/// from TOML; pass through [`ElevatorConfig::normalized`] and
/// [`ElevatorConfig::validate`] before handing it to the engine
/// (`Elevator::start` does both).
#[derive(Debug, Clone)]
pub struct ElevatorConfig {
    /// Identifier used in log lines and the engine thread name.
    pub id: String,
    pub min_floor: i32,
    pub max_floor: i32,
    pub initial_floor: i32,
    /// Single-floor hop at cruise speed.
    pub travel_time: Duration,
    /// Single-floor hop when departing from rest or stopping next
    /// floor. Zero means "derive from travel_time".
    pub travel_time_edge: Duration,
    /// Time for a panel to traverse Opening or Closing.
    pub door_speed: Duration,
    /// Hold after an arrival.
    pub door_open_time: Duration,
    /// Hold after a button-triggered reopen. Zero means "same as
    /// door_open_time".
    pub door_reopen_time: Duration,
    /// Overload threshold in kg; 0 disables the check.
    pub max_weight: i32,
    /// Per-floor settings, keyed by floor number.
    pub floor_configs: HashMap<i32, FloorConfig>,
}

impl ElevatorConfig {
    /// Load from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse, normalise and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        let config = raw.into_config().normalized();
        config.validate()?;
        Ok(config)
    }

    /// Fill derived defaults: edge travel time, reopen hold, and a
    /// floor entry for every floor in range.
    pub fn normalized(mut self) -> Self {
        if self.travel_time_edge.is_zero() {
            self.travel_time_edge = self.travel_time.mul_f64(EDGE_TIME_FACTOR);
        }
        if self.door_reopen_time.is_zero() {
            self.door_reopen_time = self.door_open_time;
        }
        for floor in self.min_floor..=self.max_floor {
            self.floor_configs
                .entry(floor)
                .or_insert_with(|| FloorConfig::fallback(floor));
        }
        self
    }

    /// Reject impossible configurations. Run after [`Self::normalized`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_floor > self.max_floor {
            return Err(ConfigError::FloorRange {
                min: self.min_floor,
                max: self.max_floor,
            });
        }
        if self.initial_floor < self.min_floor || self.initial_floor > self.max_floor {
            return Err(ConfigError::InitialFloor {
                floor: self.initial_floor,
                min: self.min_floor,
                max: self.max_floor,
            });
        }
        for (name, duration) in [
            ("travel_time", self.travel_time),
            ("door_speed", self.door_speed),
            ("door_open_time", self.door_open_time),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::NonPositiveDuration { name });
            }
        }
        Ok(())
    }

    /// Settings for a floor. Falls back to the accessible/front
    /// default for floors missing from the map.
    pub fn floor_config(&self, floor: i32) -> FloorConfig {
        self.floor_configs
            .get(&floor)
            .copied()
            .unwrap_or_else(|| FloorConfig::fallback(floor))
    }

    /// Whether the car may be called to the floor.
    #[inline]
    pub fn is_accessible(&self, floor: i32) -> bool {
        self.floor_config(floor).accessible
    }

    /// Which panel(s) open on arrival at the floor.
    #[inline]
    pub fn open_side(&self, floor: i32) -> DoorSide {
        self.floor_config(floor).open_door_side
    }
}

// ─── Raw TOML form ──────────────────────────────────────────────────

/// On-disk form of the configuration: durations in fractional
/// seconds, floors as an array of tables.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default = "default_id")]
    id: String,
    min_floor: i32,
    max_floor: i32,
    initial_floor: i32,
    travel_time: f64,
    #[serde(default)]
    travel_time_edge: f64,
    door_speed: f64,
    door_open_time: f64,
    #[serde(default)]
    door_reopen_time: f64,
    #[serde(default)]
    max_weight: i32,
    #[serde(default)]
    floors: Vec<FloorConfig>,
}

fn default_id() -> String {
    "lift".to_string()
}

impl RawConfig {
    fn into_config(self) -> ElevatorConfig {
        ElevatorConfig {
            id: self.id,
            min_floor: self.min_floor,
            max_floor: self.max_floor,
            initial_floor: self.initial_floor,
            travel_time: secs(self.travel_time),
            travel_time_edge: secs(self.travel_time_edge),
            door_speed: secs(self.door_speed),
            door_open_time: secs(self.door_open_time),
            door_reopen_time: secs(self.door_reopen_time),
            max_weight: self.max_weight,
            floor_configs: self
                .floors
                .into_iter()
                .map(|f| (f.floor, f))
                .collect(),
        }
    }
}

/// Fractional seconds to `Duration`, treating non-finite or negative
/// input as zero (caught by validation where it matters).
fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
