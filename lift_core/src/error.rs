//! Error types for the elevator engine.
//!
//! Configuration errors abort startup; call errors are local to the
//! offending command and leave the engine running.

use thiserror::Error;

/// Rejected configuration at engine startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `min_floor` exceeds `max_floor`.
    #[error("invalid floor range: min_floor ({min}) > max_floor ({max})")]
    FloorRange { min: i32, max: i32 },

    /// `initial_floor` is outside the configured range.
    #[error("initial_floor {floor} outside [{min}, {max}]")]
    InitialFloor { floor: i32, min: i32, max: i32 },

    /// A duration that must be positive was zero or negative.
    #[error("{name} must be a positive duration")]
    NonPositiveDuration { name: &'static str },

    /// Reading the configuration file failed.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file did not parse as TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Rejected call registration. No state change occurred.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallError {
    /// Requested floor lies outside the configured range.
    #[error("floor {floor} out of range [{min}, {max}]")]
    OutOfRange { floor: i32, min: i32, max: i32 },

    /// Requested floor is configured as inaccessible.
    #[error("floor {floor} is not accessible")]
    Inaccessible { floor: i32 },
}
