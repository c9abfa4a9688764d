//! SCAN (look) target selection.
//!
//! A pure function of (floor, direction, pending calls). Phase 1
//! keeps the current heading and picks the nearest call strictly
//! ahead; phase 2 (reversal or idle) picks the nearest call overall.
//! Servicing every call in the heading before reversing bounds the
//! number of reversals per sweep and avoids starving far calls.

use std::collections::BTreeSet;

use crate::state::Direction;

/// Outcome of consulting the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No pending calls.
    Idle,
    /// The nearest call is the current floor: open up, no movement.
    ArriveHere,
    /// Head toward `target`.
    MoveTo { target: i32, direction: Direction },
}

/// Select the next target floor.
///
/// Phase 1 uses strict inequality: a call at the current floor is
/// never a travel target (the engine services it via
/// [`Decision::ArriveHere`]). Equidistant phase-2 candidates resolve
/// to the lower floor.
pub fn next_target(floor: i32, direction: Direction, calls: &BTreeSet<i32>) -> Decision {
    if calls.is_empty() {
        return Decision::Idle;
    }

    // Phase 1: nearest call strictly ahead in the current heading.
    let ahead = match direction {
        Direction::Up => calls.range(floor + 1..).next().copied(),
        Direction::Down => calls.range(..floor).next_back().copied(),
        Direction::None => None,
    };
    if let Some(target) = ahead {
        return Decision::MoveTo { target, direction };
    }

    // Phase 2: nearest call overall. Ascending iteration plus a
    // strictly-closer comparison makes the lower floor win ties.
    let mut nearest: Option<(i32, i32)> = None;
    for &candidate in calls {
        let distance = (candidate - floor).abs();
        match nearest {
            Some((best, _)) if distance >= best => {}
            _ => nearest = Some((distance, candidate)),
        }
    }

    match nearest {
        Some((_, target)) if target == floor => Decision::ArriveHere,
        Some((_, target)) => Decision::MoveTo {
            target,
            direction: if target > floor {
                Direction::Up
            } else {
                Direction::Down
            },
        },
        None => Decision::Idle,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
