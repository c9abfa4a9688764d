//! The elevator engine: public command surface and the background
//! loop that drives timers and the scheduler.
//!
//! One engine thread owns timer dispatch; commands run on caller
//! threads and mutate state only inside the single lock. Nobody
//! sleeps while holding it. The loop wakes on the earliest pending
//! deadline, on a command poke, or on the periodic tick, whichever
//! comes first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::info;

use crate::car::Car;
use crate::config::ElevatorConfig;
use crate::error::{CallError, ConfigError};
use crate::event::{Event, EventBus};
use crate::state::{CallOrigin, DoorSide, DoorState, OperationMode, Snapshot};

/// Re-evaluation period when no timer is pending. Guarantees forward
/// progress even if no command or deadline wakes the loop.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Thread-safe handle to a running elevator engine. Cloning is cheap
/// and all clones drive the same car.
#[derive(Clone)]
pub struct Elevator {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<ElevatorConfig>,
    car: Mutex<Car>,
    wake_tx: Sender<()>,
    shutdown_tx: Sender<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Elevator {
    /// Validate the configuration, then start the engine thread.
    ///
    /// The engine runs until [`Elevator::shutdown`]. Dropping all
    /// handles without calling it leaves the thread running for the
    /// rest of the process, like any detached worker.
    pub fn start(config: ElevatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config.normalized());

        let bus = EventBus::new();
        let car = Car::new(Arc::clone(&config), bus);

        let (wake_tx, wake_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let inner = Arc::new(Inner {
            config: Arc::clone(&config),
            car: Mutex::new(car),
            wake_tx,
            shutdown_tx,
            thread: Mutex::new(None),
        });

        let engine = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name(format!("lift-engine-{}", config.id))
            .spawn(move || engine.run(wake_rx, shutdown_rx))?;
        *lock(&inner.thread) = Some(handle);

        info!(
            id = %config.id,
            min = config.min_floor,
            max = config.max_floor,
            initial = config.initial_floor,
            "elevator engine started"
        );
        Ok(Self { inner })
    }

    // ── Command surface ─────────────────────────────────────────────

    /// Register a destination floor. Duplicates succeed quietly.
    pub fn add_call(&self, floor: i32, origin: CallOrigin) -> Result<(), CallError> {
        let result = self.inner.car().add_call(floor, origin);
        self.inner.wake();
        result
    }

    /// Cancel a pending call. Removing an absent floor succeeds.
    pub fn remove_call(&self, floor: i32) {
        self.inner.car().remove_call(floor);
        self.inner.wake();
    }

    /// Drop every pending call.
    pub fn clear_calls(&self) {
        self.inner.car().clear_calls();
        self.inner.wake();
    }

    /// Assert the OPEN input. Doors reopen or hold as long as it
    /// stays asserted.
    pub fn press_open(&self) {
        self.inner.car().press_open(Instant::now());
        self.inner.wake();
    }

    /// Release the OPEN input; the close countdown starts here.
    pub fn release_open(&self) {
        self.inner.car().release_open(Instant::now());
        self.inner.wake();
    }

    /// Request an immediate close. Ignored while OPEN is asserted;
    /// the overload guard still applies.
    pub fn press_close(&self) {
        self.inner.car().press_close(Instant::now());
        self.inner.wake();
    }

    /// Switch operation mode. Emergency halts motion and timers.
    pub fn set_mode(&self, mode: OperationMode) {
        self.inner.car().set_mode(mode);
        self.inner.wake();
    }

    /// Manual door override; only honoured in Manual mode.
    pub fn set_door(&self, side: DoorSide, state: DoorState) {
        self.inner.car().set_door_manual(side, state);
        self.inner.wake();
    }

    /// Add passenger weight in kg; negative deltas unload. The total
    /// never goes below zero.
    pub fn add_weight(&self, delta: i32) {
        self.inner.car().add_weight(delta);
        self.inner.wake();
    }

    /// Set the absolute payload weight in kg.
    pub fn set_weight(&self, weight: i32) {
        let mut car = self.inner.car();
        let delta = weight - car.weight;
        car.add_weight(delta);
        drop(car);
        self.inner.wake();
    }

    /// Clear calls and bring the car to rest with doors closed. The
    /// floor is preserved.
    pub fn reset(&self) {
        self.inner.car().reset();
        self.inner.wake();
    }

    /// Atomic view of the current state.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.car().snapshot()
    }

    /// The event stream. Multiple subscribers compete for events;
    /// hand each observer its own receiver.
    pub fn events(&self) -> Receiver<Event> {
        self.inner.car().bus.subscribe()
    }

    /// Events discarded because the buffer was full.
    pub fn dropped_events(&self) -> u64 {
        self.inner.car().bus.dropped()
    }

    /// The validated, normalised configuration the engine runs with.
    pub fn config(&self) -> &ElevatorConfig {
        &self.inner.config
    }

    /// Stop the engine thread and wait for it to exit. Idempotent;
    /// commands issued afterwards mutate frozen state but drive
    /// nothing.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.try_send(());
        let handle = lock(&self.inner.thread).take();
        if let Some(handle) = handle {
            let _ = handle.join();
            info!(id = %self.inner.config.id, "elevator engine stopped");
        }
    }
}

impl Inner {
    fn car(&self) -> MutexGuard<'_, Car> {
        lock(&self.car)
    }

    /// Poke the engine loop. Coalesces: one pending wake is enough.
    fn wake(&self) {
        let _ = self.wake_tx.try_send(());
    }

    /// Engine loop: sleep until the earliest deadline (or the tick),
    /// dispatch expired timers, then evaluate the scheduler.
    fn run(&self, wake_rx: Receiver<()>, shutdown_rx: Receiver<()>) {
        info!("engine loop running");

        loop {
            let timeout = {
                let car = self.car();
                match car.next_due() {
                    Some(due) => due
                        .saturating_duration_since(Instant::now())
                        .min(TICK_INTERVAL),
                    None => TICK_INTERVAL,
                }
            };

            select! {
                recv(shutdown_rx) -> _ => {
                    let mut car = self.car();
                    car.travel_due = None;
                    car.door_due = None;
                    car.moving = false;
                    info!("engine loop stopped");
                    return;
                }
                recv(wake_rx) -> _ => {}
                default(timeout) => {}
            }

            let mut car = self.car();
            let now = Instant::now();
            if car.travel_due.is_some_and(|due| due <= now) {
                car.on_travel_complete(now);
            }
            if car.door_due.is_some_and(|due| due <= now) {
                car.on_door_timer(now);
            }
            car.step(now);
        }
    }
}

/// Lock that shrugs off poisoning: the engine must keep serving even
/// if some caller thread died mid-command.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Tests ──────────────────────────────────────────────────────────
