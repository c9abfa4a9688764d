//! Mutable car state and its transition logic: motion, the door
//! state machine, buttons, weight and mode handling.
//!
//! Everything here runs under the engine's single state lock and is
//! written against an explicit `now: Instant` so transitions are
//! deterministic in tests. The two one-shot timers are deadlines
//! stored next to the state they guard; restarting one can therefore
//! never race a stale fire.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::ElevatorConfig;
use crate::error::CallError;
use crate::event::{EventBus, EventPayload, EventType};
use crate::scheduler::{next_target, Decision};
use crate::state::{
    CallOrigin, Direction, DoorBank, DoorSide, DoorState, OperationMode, Snapshot,
};

pub(crate) struct Car {
    cfg: Arc<ElevatorConfig>,
    pub(crate) bus: EventBus,

    // ── Mutable state ──
    pub(crate) floor: i32,
    pub(crate) direction: Direction,
    pub(crate) doors: DoorBank,
    pub(crate) weight: i32,
    pub(crate) mode: OperationMode,
    pub(crate) calls: BTreeSet<i32>,
    /// Whether the OPEN input is currently asserted.
    pub(crate) open_button_held: bool,
    /// Hold duration for the next Open → Closing attempt.
    pub(crate) open_wait: Duration,

    // ── One-shot timer deadlines ──
    /// Pending single-floor hop completes at this instant.
    pub(crate) travel_due: Option<Instant>,
    /// Pending door phase transition at this instant.
    pub(crate) door_due: Option<Instant>,
    /// A hop is in flight; the scheduler must not start another.
    pub(crate) moving: bool,
}

impl Car {
    pub(crate) fn new(cfg: Arc<ElevatorConfig>, bus: EventBus) -> Self {
        let open_wait = cfg.door_open_time;
        Self {
            floor: cfg.initial_floor,
            direction: Direction::None,
            doors: DoorBank::default(),
            weight: 0,
            mode: OperationMode::Auto,
            calls: BTreeSet::new(),
            open_button_held: false,
            open_wait,
            travel_due: None,
            door_due: None,
            moving: false,
            cfg,
            bus,
        }
    }

    /// The earliest pending deadline, for the engine's sleep budget.
    pub(crate) fn next_due(&self) -> Option<Instant> {
        match (self.travel_due, self.door_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ── Event-emitting setters ──────────────────────────────────────

    fn set_floor(&mut self, floor: i32) {
        if self.floor != floor {
            self.floor = floor;
            self.bus
                .publish(EventType::FloorChange, EventPayload::Floor(floor));
        }
    }

    fn set_direction(&mut self, direction: Direction) {
        if self.direction != direction {
            self.direction = direction;
            self.bus.publish(
                EventType::DirectionChange,
                EventPayload::Direction(direction),
            );
        }
    }

    fn set_door(&mut self, side: DoorSide, state: DoorState) {
        if self.doors.get(side) != state {
            self.doors.set(side, state);
            self.bus
                .publish(EventType::DoorChange, EventPayload::Door { side, state });
        }
    }

    /// Move every panel currently in `from` to `to`. Panels advance
    /// together when both were activated on arrival; an inactive
    /// panel stays closed.
    fn advance_panels(&mut self, from: DoorState, to: DoorState) {
        for side in [DoorSide::Front, DoorSide::Rear] {
            if self.doors.get(side) == from {
                self.set_door(side, to);
            }
        }
    }

    // ── Scheduling step ─────────────────────────────────────────────

    /// Evaluate the scheduler and start the next action. Called on
    /// every engine wake-up; all guards are re-checked here.
    pub(crate) fn step(&mut self, now: Instant) {
        if self.mode != OperationMode::Auto {
            return;
        }
        if self.moving {
            return;
        }
        // Physical safety: never start motion unless fully closed.
        if !self.doors.all_closed() {
            return;
        }

        // A call at the current floor is serviced on the spot, before
        // the sweep looks further.
        if self.calls.contains(&self.floor) {
            self.arrive(self.floor, now);
            return;
        }

        match next_target(self.floor, self.direction, &self.calls) {
            Decision::Idle => {
                if self.direction != Direction::None {
                    debug!(floor = self.floor, "idle, no pending calls");
                    self.set_direction(Direction::None);
                }
            }
            Decision::ArriveHere => self.arrive(self.floor, now),
            Decision::MoveTo { target, direction } => self.begin_move(target, direction, now),
        }
    }

    // ── Motion ──────────────────────────────────────────────────────

    /// Start a hop toward `target`. Precondition (checked by `step`):
    /// doors closed, Auto mode, not already moving.
    fn begin_move(&mut self, target: i32, direction: Direction, now: Instant) {
        if self.direction != direction {
            info!(target, dir = ?direction, "heading changed");
        } else {
            debug!(target, dir = ?direction, "moving");
        }
        self.set_direction(direction);
        self.moving = true;
        // Every departure is from rest and pays the edge time.
        self.travel_due = Some(now + self.cfg.travel_time_edge);
    }

    /// One single-floor hop finished: advance the floor, then either
    /// stop here, keep cruising, or come to rest.
    pub(crate) fn on_travel_complete(&mut self, now: Instant) {
        self.travel_due = None;

        match self.direction {
            Direction::Up => self.set_floor(self.floor + 1),
            Direction::Down => self.set_floor(self.floor - 1),
            Direction::None => {}
        }

        if self.calls.contains(&self.floor) {
            info!(floor = self.floor, "stopping at called floor");
            self.moving = false;
            self.arrive(self.floor, now);
            return;
        }

        match next_target(self.floor, self.direction, &self.calls) {
            // Same heading: keep cruising without stopping.
            Decision::MoveTo { target, direction } if direction == self.direction => {
                self.travel_due = Some(now + self.hop_duration(target));
            }
            // Reversal or nothing left: come to rest. A reversal is
            // picked up by the next step() from standstill.
            _ => {
                self.moving = false;
                self.set_direction(Direction::None);
            }
        }
    }

    /// Duration of the next in-flight hop: the final hop before a
    /// stop pays the edge time, anything further cruises.
    fn hop_duration(&self, target: i32) -> Duration {
        if (target - self.floor).abs() == 1 {
            self.cfg.travel_time_edge
        } else {
            self.cfg.travel_time
        }
    }

    /// Arrival procedure: open the configured side(s), clear the
    /// call, announce, arm the door timer.
    fn arrive(&mut self, floor: i32, now: Instant) {
        info!(floor, "arrived");

        let open_door_side = self.cfg.open_side(floor);
        if open_door_side.includes(DoorSide::Front) {
            self.set_door(DoorSide::Front, DoorState::Opening);
        }
        if open_door_side.includes(DoorSide::Rear) {
            self.set_door(DoorSide::Rear, DoorState::Opening);
        }

        self.calls.remove(&floor);
        self.bus.publish(
            EventType::Arrived,
            EventPayload::Arrived {
                floor,
                open_door_side,
            },
        );

        self.open_wait = self.cfg.door_open_time;
        self.door_due = Some(now + self.cfg.door_speed);
    }

    // ── Door state machine ──────────────────────────────────────────

    /// Advance the door machine by one timer fire.
    pub(crate) fn on_door_timer(&mut self, now: Instant) {
        self.door_due = None;

        match self.doors.active_state() {
            // Both panels idle: a stale fire, ignore.
            DoorState::Close => {}

            DoorState::Opening => {
                self.advance_panels(DoorState::Opening, DoorState::Open);
                debug!(hold = ?self.open_wait, "doors fully open");
                self.door_due = Some(now + self.open_wait);
            }

            DoorState::Open => {
                // Closing is refused while the OPEN input is asserted
                // or the car is overloaded; both re-arm the hold and
                // are re-evaluated on the next fire.
                if self.open_button_held {
                    debug!("holding doors, open button asserted");
                    self.door_due = Some(now + self.cfg.door_reopen_time);
                    return;
                }
                if self.overloaded() {
                    warn!(
                        weight = self.weight,
                        max_weight = self.cfg.max_weight,
                        "overloaded, doors stay open"
                    );
                    self.door_due = Some(now + self.open_wait);
                    return;
                }
                self.advance_panels(DoorState::Open, DoorState::Closing);
                debug!("doors closing");
                self.door_due = Some(now + self.cfg.door_speed);
            }

            DoorState::Closing => {
                self.advance_panels(DoorState::Closing, DoorState::Close);
                info!("doors fully closed");
            }
        }
    }

    fn overloaded(&self) -> bool {
        self.cfg.max_weight > 0 && self.weight > self.cfg.max_weight
    }

    // ── Buttons ─────────────────────────────────────────────────────

    pub(crate) fn press_open(&mut self, now: Instant) {
        self.open_button_held = true;

        match self.doors.active_state() {
            DoorState::Closing => {
                // Reopen: the closing panel(s) swing back.
                info!("open button: reopening doors");
                self.advance_panels(DoorState::Closing, DoorState::Opening);
                self.open_wait = self.cfg.door_reopen_time;
                self.door_due = Some(now + self.cfg.door_speed);
            }
            DoorState::Open => {
                debug!("open button: extending hold");
                self.open_wait = self.cfg.door_reopen_time;
                self.door_due = Some(now + self.cfg.door_reopen_time);
            }
            DoorState::Close => {
                // Only a resting car opens its doors on demand.
                if self.direction == Direction::None {
                    info!(floor = self.floor, "open button: opening from standstill");
                    let side = self.cfg.open_side(self.floor);
                    if side.includes(DoorSide::Front) {
                        self.set_door(DoorSide::Front, DoorState::Opening);
                    }
                    if side.includes(DoorSide::Rear) {
                        self.set_door(DoorSide::Rear, DoorState::Opening);
                    }
                    self.open_wait = self.cfg.door_reopen_time;
                    self.door_due = Some(now + self.cfg.door_speed);
                }
            }
            DoorState::Opening => {}
        }
    }

    pub(crate) fn release_open(&mut self, now: Instant) {
        self.open_button_held = false;
        debug!("open button released");

        // The close countdown starts when the rider lets go, not when
        // the hold timer first expired.
        if self.doors.active_state() == DoorState::Open {
            self.open_wait = self.cfg.door_reopen_time;
            self.door_due = Some(now + self.cfg.door_reopen_time);
        }
    }

    pub(crate) fn press_close(&mut self, now: Instant) {
        if self.open_button_held {
            debug!("close button ignored, open button asserted");
            return;
        }
        if self.doors.active_state() == DoorState::Open {
            info!("close button: closing now");
            // Fire the door timer immediately; the hold and overload
            // guards still apply on that path.
            self.door_due = Some(now);
        }
    }

    // ── Calls ───────────────────────────────────────────────────────

    pub(crate) fn add_call(&mut self, floor: i32, origin: CallOrigin) -> Result<(), CallError> {
        if floor < self.cfg.min_floor || floor > self.cfg.max_floor {
            warn!(
                floor,
                min = self.cfg.min_floor,
                max = self.cfg.max_floor,
                "call rejected: floor out of range"
            );
            return Err(CallError::OutOfRange {
                floor,
                min: self.cfg.min_floor,
                max: self.cfg.max_floor,
            });
        }
        if !self.cfg.is_accessible(floor) {
            warn!(floor, "call rejected: floor not accessible");
            return Err(CallError::Inaccessible { floor });
        }
        if !self.calls.insert(floor) {
            debug!(floor, "call already registered");
            return Ok(());
        }
        info!(floor, origin = origin.as_str(), "call registered");
        Ok(())
    }

    pub(crate) fn remove_call(&mut self, floor: i32) {
        debug!(floor, "call removed");
        self.calls.remove(&floor);
    }

    pub(crate) fn clear_calls(&mut self) {
        info!("all calls cleared");
        self.calls.clear();
    }

    // ── Mode, weight, overrides ─────────────────────────────────────

    pub(crate) fn set_mode(&mut self, mode: OperationMode) {
        if self.mode == mode {
            return;
        }
        info!(from = ?self.mode, to = ?mode, "operation mode changed");
        self.mode = mode;
        self.bus
            .publish(EventType::ModeChange, EventPayload::Mode(mode));

        if mode == OperationMode::Emergency {
            // Hard stop: both timers die, the car halts at the last
            // completed floor. Doors caught mid-phase stay where they
            // are until reset or a door button.
            warn!("emergency stop engaged");
            self.travel_due = None;
            self.door_due = None;
            self.moving = false;
            self.set_direction(Direction::None);
        }
    }

    /// Manual door override. Outside Manual mode the request is
    /// ignored; the automatic machine owns the doors.
    pub(crate) fn set_door_manual(&mut self, side: DoorSide, state: DoorState) {
        if self.mode != OperationMode::Manual {
            warn!(?side, ?state, mode = ?self.mode, "door override ignored outside manual mode");
            return;
        }
        info!(?side, ?state, "manual door override");
        self.set_door(side, state);
    }

    /// Add (or remove) payload weight. Total weight never goes below
    /// zero.
    pub(crate) fn add_weight(&mut self, delta: i32) {
        self.weight = (self.weight + delta).max(0);
        info!(weight = self.weight, "weight changed");
    }

    /// Clear calls and bring the car to a defined rest: no heading,
    /// doors closed, timers disarmed. The floor is a physical
    /// position and is preserved.
    pub(crate) fn reset(&mut self) {
        info!("resetting car state");
        self.calls.clear();
        self.set_direction(Direction::None);
        self.set_door(DoorSide::Front, DoorState::Close);
        self.set_door(DoorSide::Rear, DoorState::Close);
        self.travel_due = None;
        self.door_due = None;
        self.moving = false;
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            floor: self.floor,
            direction: self.direction,
            doors: self.doors,
            weight: self.weight,
            mode: self.mode,
            call_floors: self.calls.iter().copied().collect(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FloorConfig;
    use crate::event::Event;
    use crossbeam_channel::Receiver;
    use std::collections::HashMap;

    fn test_config() -> ElevatorConfig {
        ElevatorConfig {
            id: "test".to_string(),
            min_floor: 1,
            max_floor: 10,
            initial_floor: 1,
            travel_time: Duration::from_secs(1),
            travel_time_edge: Duration::from_millis(1500),
            door_speed: Duration::from_millis(500),
            door_open_time: Duration::from_secs(3),
            door_reopen_time: Duration::from_secs(2),
            max_weight: 1000,
            floor_configs: HashMap::new(),
        }
        .normalized()
    }

    fn car_with(cfg: ElevatorConfig) -> (Car, Receiver<Event>) {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        (Car::new(Arc::new(cfg), bus), rx)
    }

    fn car() -> (Car, Receiver<Event>) {
        car_with(test_config())
    }

    fn drain(rx: &Receiver<Event>) -> Vec<(EventType, EventPayload)> {
        rx.try_iter().map(|e| (e.event_type, e.payload)).collect()
    }

    /// Drive a full door cycle from Opening to Close.
    fn cycle_doors_closed(car: &mut Car, mut now: Instant) -> Instant {
        for _ in 0..4 {
            if let Some(due) = car.door_due {
                now = due;
                car.on_door_timer(now);
            }
        }
        now
    }

    // ── Motion ──

    #[test]
    fn step_starts_move_with_edge_time() {
        let (mut car, _rx) = car();
        let now = Instant::now();
        car.add_call(5, CallOrigin::Hall).unwrap();

        car.step(now);
        assert_eq!(car.direction, Direction::Up);
        assert!(car.moving);
        // Departing from rest pays the edge time.
        assert_eq!(car.travel_due, Some(now + car.cfg.travel_time_edge));
    }

    #[test]
    fn cruise_uses_travel_time_until_final_hop() {
        let (mut car, _rx) = car();
        let mut now = Instant::now();
        car.add_call(4, CallOrigin::Hall).unwrap();
        car.step(now);

        // Hop 1 -> 2: two floors remain, cruise speed.
        now += car.cfg.travel_time_edge;
        car.on_travel_complete(now);
        assert_eq!(car.floor, 2);
        assert_eq!(car.travel_due, Some(now + car.cfg.travel_time));

        // Hop 2 -> 3: final hop is one floor away, edge speed.
        now += car.cfg.travel_time;
        car.on_travel_complete(now);
        assert_eq!(car.floor, 3);
        assert_eq!(car.travel_due, Some(now + car.cfg.travel_time_edge));

        // Hop 3 -> 4: called floor, stop and open.
        now += car.cfg.travel_time_edge;
        car.on_travel_complete(now);
        assert_eq!(car.floor, 4);
        assert!(!car.moving);
        assert!(car.travel_due.is_none());
        assert_eq!(car.doors.front, DoorState::Opening);
        assert!(car.calls.is_empty());
    }

    #[test]
    fn floor_change_precedes_arrival_event() {
        let (mut car, rx) = car();
        let mut now = Instant::now();
        car.add_call(2, CallOrigin::Car).unwrap();
        car.step(now);
        now += car.cfg.travel_time_edge;
        car.on_travel_complete(now);

        let events: Vec<EventType> = drain(&rx).into_iter().map(|(t, _)| t).collect();
        let floor_pos = events
            .iter()
            .position(|t| *t == EventType::FloorChange)
            .unwrap();
        let arrived_pos = events.iter().position(|t| *t == EventType::Arrived).unwrap();
        assert!(floor_pos < arrived_pos);
    }

    #[test]
    fn reversal_stops_before_heading_back() {
        let (mut car, _rx) = car();
        let mut now = Instant::now();
        car.floor = 5;
        car.add_call(6, CallOrigin::Hall).unwrap();
        car.step(now);

        now += car.cfg.travel_time_edge;
        car.on_travel_complete(now);
        assert_eq!(car.floor, 6);

        // Doors cycle; a call below arrives meanwhile.
        car.add_call(3, CallOrigin::Hall).unwrap();
        now = cycle_doors_closed(&mut car, now);

        // The car comes to rest, then departs downward from standstill.
        car.step(now);
        assert_eq!(car.direction, Direction::Down);
        assert_eq!(car.travel_due, Some(now + car.cfg.travel_time_edge));
    }

    #[test]
    fn call_at_current_floor_opens_without_motion() {
        let (mut car, rx) = car();
        let now = Instant::now();
        car.add_call(1, CallOrigin::Hall).unwrap();
        car.step(now);

        assert!(!car.moving);
        assert_eq!(car.doors.front, DoorState::Opening);
        let events = drain(&rx);
        assert!(events.iter().all(|(t, _)| *t != EventType::FloorChange));
        assert!(events.iter().any(|(t, _)| *t == EventType::Arrived));
    }

    #[test]
    fn step_refuses_motion_with_open_doors() {
        let (mut car, _rx) = car();
        let now = Instant::now();
        car.doors.set(DoorSide::Front, DoorState::Open);
        car.add_call(5, CallOrigin::Hall).unwrap();

        car.step(now);
        assert!(!car.moving);
        assert!(car.travel_due.is_none());
    }

    #[test]
    fn step_is_inert_outside_auto_mode() {
        let (mut car, _rx) = car();
        let now = Instant::now();
        car.add_call(5, CallOrigin::Hall).unwrap();

        for mode in [
            OperationMode::Manual,
            OperationMode::Moving,
            OperationMode::Emergency,
        ] {
            car.set_mode(mode);
            car.step(now);
            assert!(!car.moving, "no motion in {mode:?}");
        }
    }

    #[test]
    fn idle_step_clears_stale_heading() {
        let (mut car, rx) = car();
        let now = Instant::now();
        car.direction = Direction::Up;

        car.step(now);
        assert_eq!(car.direction, Direction::None);
        assert!(drain(&rx)
            .iter()
            .any(|(t, p)| *t == EventType::DirectionChange
                && *p == EventPayload::Direction(Direction::None)));
    }

    // ── Door machine ──

    #[test]
    fn door_cycle_walks_full_progression() {
        let (mut car, rx) = car();
        let mut now = Instant::now();
        car.add_call(1, CallOrigin::Hall).unwrap();
        car.step(now); // Arrive here: Opening armed.
        assert_eq!(car.door_due, Some(now + car.cfg.door_speed));

        now += car.cfg.door_speed;
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Open);
        // Hold uses the arrival wait.
        assert_eq!(car.door_due, Some(now + car.cfg.door_open_time));

        now += car.cfg.door_open_time;
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Closing);

        now += car.cfg.door_speed;
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Close);
        assert!(car.door_due.is_none());

        let door_events: Vec<EventPayload> = drain(&rx)
            .into_iter()
            .filter(|(t, _)| *t == EventType::DoorChange)
            .map(|(_, p)| p)
            .collect();
        let states: Vec<DoorState> = door_events
            .iter()
            .map(|p| match p {
                EventPayload::Door { state, .. } => *state,
                other => panic!("unexpected payload {other:?}"),
            })
            .collect();
        assert_eq!(
            states,
            vec![
                DoorState::Opening,
                DoorState::Open,
                DoorState::Closing,
                DoorState::Close
            ]
        );
    }

    #[test]
    fn both_panels_advance_together() {
        let mut cfg = test_config();
        cfg.floor_configs.insert(
            1,
            FloorConfig {
                floor: 1,
                accessible: true,
                open_door_side: DoorSide::Both,
            },
        );
        let (mut car, _rx) = car_with(cfg);
        let mut now = Instant::now();
        car.add_call(1, CallOrigin::Hall).unwrap();
        car.step(now);
        assert_eq!(car.doors.front, DoorState::Opening);
        assert_eq!(car.doors.rear, DoorState::Opening);

        now += car.cfg.door_speed;
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Open);
        assert_eq!(car.doors.rear, DoorState::Open);
    }

    #[test]
    fn rear_only_floor_keeps_front_closed() {
        let mut cfg = test_config();
        cfg.floor_configs.insert(
            1,
            FloorConfig {
                floor: 1,
                accessible: true,
                open_door_side: DoorSide::Rear,
            },
        );
        let (mut car, _rx) = car_with(cfg);
        let mut now = Instant::now();
        car.add_call(1, CallOrigin::Hall).unwrap();
        car.step(now);
        assert_eq!(car.doors.front, DoorState::Close);
        assert_eq!(car.doors.rear, DoorState::Opening);

        now += car.cfg.door_speed;
        car.on_door_timer(now);
        assert_eq!(car.doors.rear, DoorState::Open);
        assert_eq!(car.doors.front, DoorState::Close);
    }

    #[test]
    fn stale_door_fire_is_ignored() {
        let (mut car, rx) = car();
        car.on_door_timer(Instant::now());
        assert!(car.doors.all_closed());
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn held_button_defers_closing() {
        let (mut car, _rx) = car();
        let mut now = Instant::now();
        car.press_open(now); // Standstill: doors begin opening.
        now += car.cfg.door_speed;
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Open);

        // Hold expires while the button is held: stay open.
        now += car.cfg.door_reopen_time;
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Open);
        assert_eq!(car.door_due, Some(now + car.cfg.door_reopen_time));

        // Release restarts the countdown from now.
        now += Duration::from_millis(100);
        car.release_open(now);
        assert_eq!(car.door_due, Some(now + car.cfg.door_reopen_time));

        now += car.cfg.door_reopen_time;
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Closing);
    }

    #[test]
    fn overload_defers_closing_until_cleared() {
        let (mut car, rx) = car();
        let mut now = Instant::now();
        car.press_open(now);
        now += car.cfg.door_speed;
        car.on_door_timer(now);
        car.release_open(now);
        assert_eq!(car.doors.front, DoorState::Open);

        car.add_weight(1500);

        // Every expiry re-evaluates the guard and re-arms.
        for _ in 0..3 {
            now += car.cfg.door_reopen_time;
            car.on_door_timer(now);
            assert_eq!(car.doors.front, DoorState::Open);
        }
        let closing_seen = drain(&rx).iter().any(|(_, p)| {
            matches!(
                p,
                EventPayload::Door {
                    state: DoorState::Closing,
                    ..
                }
            )
        });
        assert!(!closing_seen);

        // Load drops below the limit: next expiry closes.
        car.add_weight(-600);
        now += car.cfg.door_reopen_time;
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Closing);
    }

    #[test]
    fn zero_max_weight_disables_overload_check() {
        let mut cfg = test_config();
        cfg.max_weight = 0;
        let (mut car, _rx) = car_with(cfg);
        let mut now = Instant::now();
        car.press_open(now);
        now += car.cfg.door_speed;
        car.on_door_timer(now);
        car.release_open(now);
        car.add_weight(99_999);

        now += car.cfg.door_reopen_time;
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Closing);
    }

    // ── Buttons ──

    #[test]
    fn open_button_reopens_closing_doors() {
        let (mut car, _rx) = car();
        let mut now = Instant::now();
        car.press_open(now);
        now += car.cfg.door_speed;
        car.on_door_timer(now); // Open
        car.release_open(now);
        now += car.cfg.door_reopen_time;
        car.on_door_timer(now); // Closing

        car.press_open(now);
        assert_eq!(car.doors.front, DoorState::Opening);
        assert_eq!(car.door_due, Some(now + car.cfg.door_speed));
        assert_eq!(car.open_wait, car.cfg.door_reopen_time);
    }

    #[test]
    fn open_button_opens_resting_car() {
        let (mut car, _rx) = car();
        let now = Instant::now();
        car.press_open(now);
        assert_eq!(car.doors.front, DoorState::Opening);
        assert_eq!(car.door_due, Some(now + car.cfg.door_speed));
    }

    #[test]
    fn open_button_ignored_while_heading_somewhere() {
        let (mut car, _rx) = car();
        let now = Instant::now();
        car.add_call(5, CallOrigin::Hall).unwrap();
        car.step(now);
        let due = car.travel_due;

        car.press_open(now);
        assert!(car.doors.all_closed());
        assert_eq!(car.travel_due, due);
    }

    #[test]
    fn close_button_fires_door_timer_immediately() {
        let (mut car, _rx) = car();
        let mut now = Instant::now();
        car.press_open(now);
        now += car.cfg.door_speed;
        car.on_door_timer(now);
        car.release_open(now);
        assert_eq!(car.doors.front, DoorState::Open);

        now += Duration::from_millis(50);
        car.press_close(now);
        assert_eq!(car.door_due, Some(now));
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Closing);
    }

    #[test]
    fn close_button_ignored_while_open_held() {
        let (mut car, _rx) = car();
        let mut now = Instant::now();
        car.press_open(now);
        now += car.cfg.door_speed;
        car.on_door_timer(now);
        let due = car.door_due;

        car.press_close(now);
        assert_eq!(car.door_due, due);
    }

    #[test]
    fn close_button_respects_overload() {
        let (mut car, _rx) = car();
        let mut now = Instant::now();
        car.press_open(now);
        now += car.cfg.door_speed;
        car.on_door_timer(now);
        car.release_open(now);
        car.add_weight(2000);

        car.press_close(now);
        // The immediate fire re-evaluates the guard: still open.
        car.on_door_timer(now);
        assert_eq!(car.doors.front, DoorState::Open);
    }

    // ── Calls ──

    #[test]
    fn add_call_validates_range_and_access() {
        let mut cfg = test_config();
        cfg.floor_configs.insert(
            4,
            FloorConfig {
                floor: 4,
                accessible: false,
                open_door_side: DoorSide::Front,
            },
        );
        let (mut car, _rx) = car_with(cfg);

        assert_eq!(
            car.add_call(11, CallOrigin::Hall),
            Err(CallError::OutOfRange {
                floor: 11,
                min: 1,
                max: 10
            })
        );
        assert_eq!(
            car.add_call(4, CallOrigin::Hall),
            Err(CallError::Inaccessible { floor: 4 })
        );
        assert!(car.calls.is_empty());

        // Duplicate adds are a quiet success.
        car.add_call(5, CallOrigin::Car).unwrap();
        car.add_call(5, CallOrigin::Car).unwrap();
        assert_eq!(car.calls.len(), 1);
    }

    #[test]
    fn remove_call_is_idempotent() {
        let (mut car, _rx) = car();
        car.add_call(5, CallOrigin::Hall).unwrap();
        car.remove_call(5);
        car.remove_call(5);
        assert!(car.calls.is_empty());
    }

    // ── Mode, weight, reset ──

    #[test]
    fn emergency_kills_timers_and_heading() {
        let (mut car, _rx) = car();
        let now = Instant::now();
        car.add_call(5, CallOrigin::Hall).unwrap();
        car.step(now);
        assert!(car.travel_due.is_some());

        car.set_mode(OperationMode::Emergency);
        assert!(car.travel_due.is_none());
        assert!(car.door_due.is_none());
        assert!(!car.moving);
        assert_eq!(car.direction, Direction::None);
        // The floor stays where the last hop left it.
        assert_eq!(car.floor, 1);
    }

    #[test]
    fn emergency_mid_opening_freezes_panel_until_reset() {
        let (mut car, _rx) = car();
        let now = Instant::now();
        car.press_open(now);
        car.release_open(now);
        assert_eq!(car.doors.front, DoorState::Opening);
        assert!(car.door_due.is_some());

        car.set_mode(OperationMode::Emergency);
        assert!(car.door_due.is_none());

        // No button acts on a panel caught in Opening: the open
        // button ignores that state and the close button only acts
        // on Open.
        car.press_open(now);
        assert!(car.door_due.is_none());
        car.release_open(now);
        car.press_close(now);
        assert!(car.door_due.is_none());
        assert_eq!(car.doors.front, DoorState::Opening);

        // Only a reset recovers the panel.
        car.reset();
        assert!(car.doors.all_closed());
        assert!(car.door_due.is_none());
    }

    #[test]
    fn emergency_mid_closing_recovers_via_open_button() {
        let (mut car, _rx) = car();
        let mut now = Instant::now();
        car.press_open(now);
        now += car.cfg.door_speed;
        car.on_door_timer(now); // Open
        car.release_open(now);
        now += car.cfg.door_reopen_time;
        car.on_door_timer(now); // Closing

        car.set_mode(OperationMode::Emergency);
        assert!(car.door_due.is_none());
        assert_eq!(car.doors.front, DoorState::Closing);

        // The reopen path re-arms the door machine even here.
        car.press_open(now);
        assert_eq!(car.doors.front, DoorState::Opening);
        assert_eq!(car.door_due, Some(now + car.cfg.door_speed));
    }

    #[test]
    fn set_mode_same_value_is_a_noop() {
        let (mut car, rx) = car();
        car.set_mode(OperationMode::Auto);
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn door_override_only_in_manual_mode() {
        let (mut car, _rx) = car();
        car.set_door_manual(DoorSide::Front, DoorState::Open);
        assert_eq!(car.doors.front, DoorState::Close);

        car.set_mode(OperationMode::Manual);
        car.set_door_manual(DoorSide::Front, DoorState::Open);
        assert_eq!(car.doors.front, DoorState::Open);
    }

    #[test]
    fn weight_never_goes_negative() {
        let (mut car, _rx) = car();
        car.add_weight(300);
        car.add_weight(-500);
        assert_eq!(car.weight, 0);
    }

    #[test]
    fn reset_restores_rest_but_keeps_floor() {
        let (mut car, _rx) = car();
        let mut now = Instant::now();
        car.add_call(3, CallOrigin::Hall).unwrap();
        car.step(now);
        now += car.cfg.travel_time_edge;
        car.on_travel_complete(now);
        assert_eq!(car.floor, 2);
        car.add_call(7, CallOrigin::Hall).unwrap();

        car.reset();
        assert_eq!(car.floor, 2);
        assert_eq!(car.direction, Direction::None);
        assert!(car.doors.all_closed());
        assert!(car.calls.is_empty());
        assert!(car.travel_due.is_none());
        assert!(car.door_due.is_none());
        assert!(!car.moving);
    }

    #[test]
    fn snapshot_reports_sorted_calls() {
        let (mut car, _rx) = car();
        car.add_call(9, CallOrigin::Hall).unwrap();
        car.add_call(2, CallOrigin::Hall).unwrap();
        car.add_call(5, CallOrigin::Hall).unwrap();

        let snapshot = car.snapshot();
        assert_eq!(snapshot.call_floors, vec![2, 5, 9]);
        assert_eq!(snapshot.floor, 1);
        assert_eq!(snapshot.mode, OperationMode::Auto);
    }

    #[test]
    fn next_due_returns_earliest_deadline() {
        let (mut car, _rx) = car();
        let now = Instant::now();
        assert!(car.next_due().is_none());

        car.travel_due = Some(now + Duration::from_secs(2));
        car.door_due = Some(now + Duration::from_secs(1));
        assert_eq!(car.next_due(), Some(now + Duration::from_secs(1)));

        car.door_due = None;
        assert_eq!(car.next_due(), Some(now + Duration::from_secs(2)));
    }
}
