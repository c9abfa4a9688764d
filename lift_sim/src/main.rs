//! Scripted console host for the elevator engine.
//!
//! Loads a TOML configuration, starts the engine, registers the call
//! floors given on the command line and prints every event until the
//! car is back at rest.
//!
//! ```text
//! lift_sim [config-path] [floor...]
//! ```

use std::path::Path;
use std::process;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lift_core::state::{CallOrigin, Direction};
use lift_core::{Elevator, ElevatorConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .unwrap_or_else(|| "config/lift.toml".to_string());
    let call_floors: Vec<i32> = args
        .filter_map(|arg| match arg.parse() {
            Ok(floor) => Some(floor),
            Err(_) => {
                warn!(%arg, "ignoring non-numeric call floor");
                None
            }
        })
        .collect();

    let config = match ElevatorConfig::from_toml_file(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };

    let elevator = match Elevator::start(config) {
        Ok(elevator) => elevator,
        Err(e) => {
            eprintln!("FATAL: {e}");
            process::exit(1);
        }
    };
    let events = elevator.events();

    for floor in call_floors {
        if let Err(e) = elevator.add_call(floor, CallOrigin::Hall) {
            warn!(floor, error = %e, "call rejected");
        }
    }

    // Print events until the car has settled back at rest.
    loop {
        match events.recv_timeout(Duration::from_millis(500)) {
            Ok(event) => {
                info!(kind = event.event_type.as_str(), payload = ?event.payload, "event");
            }
            Err(_) => {
                let snapshot = elevator.snapshot();
                if snapshot.direction == Direction::None
                    && snapshot.doors.all_closed()
                    && snapshot.call_floors.is_empty()
                {
                    info!(floor = snapshot.floor, "car is idle, shutting down");
                    break;
                }
            }
        }
    }

    if elevator.dropped_events() > 0 {
        warn!(
            dropped = elevator.dropped_events(),
            "event buffer overflowed during the run"
        );
    }
    elevator.shutdown();
}
