//! Engine invariants - sanity checks that detect bugs.
//!
//! After a frame has been fully processed these should NEVER trigger. If
//! they do, the spatial index and the roster have drifted apart or a
//! contact went unresolved.

use std::collections::BTreeSet;

use crate::game::{GameState, Motion, TileEventSystem};

/// Sanity bound: no castle garrison or army should grow past this.
pub const SANITY_MAX_UNITS: u32 = 10_000_000;

/// Invariant violation error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invariant violation: {message}")]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

fn violation(message: String) -> InvariantViolation {
    InvariantViolation { message }
}

/// Check all engine invariants.
///
/// Returns a list of violations found, or empty if all invariants hold.
#[must_use]
pub fn check_invariants(state: &GameState) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let tile_size = state.config().tile_size;
    let spatial = state.spatial();

    // Roster against index
    for army in state.armies().values() {
        if army.units == 0 {
            violations.push(violation(format!("Army {} has zero units", army.id)));
        }
        if army.units > SANITY_MAX_UNITS {
            violations.push(violation(format!(
                "Army {} has {} units > sanity max {SANITY_MAX_UNITS}",
                army.id, army.units
            )));
        }

        let expected = match army.motion {
            Motion::Settled { coord } | Motion::Engaged { coord } => coord,
            Motion::Marching { destination } => {
                if !state.map().in_bounds(destination) {
                    violations.push(violation(format!(
                        "Army {} marches to {destination} off the map",
                        army.id
                    )));
                }
                army.position.tile(tile_size)
            }
        };
        match spatial.tile_of(army.id) {
            None => violations.push(violation(format!("Army {} is not indexed", army.id))),
            Some(coord) if coord != expected => violations.push(violation(format!(
                "Army {} indexed on {coord} but stands on {expected}",
                army.id
            ))),
            Some(_) => {}
        }
        if spatial.is_settled(army.id) != army.is_settled() {
            violations.push(violation(format!(
                "Army {} settled flag disagrees with the index",
                army.id
            )));
        }
    }

    // Index against roster
    for (id, coord) in spatial.tracked() {
        if !state.armies().contains_key(&id) {
            violations.push(violation(format!("Unit {id} indexed on {coord} but not alive")));
        }
    }
    for (coord, tile) in spatial.tiles() {
        for id in tile.settled.iter().chain(&tile.moving) {
            if spatial.tile_of(*id) != Some(coord) {
                violations.push(violation(format!(
                    "Tile {coord} lists unit {id} indexed elsewhere"
                )));
            }
        }
    }

    // Castles
    let mut castle_tiles = BTreeSet::new();
    for castle in state.castles() {
        if !castle_tiles.insert(castle.coord) {
            violations.push(violation(format!("Two castles share tile {}", castle.coord)));
        }
        if spatial.occupancy(castle.coord).castle != Some(castle.id) {
            violations.push(violation(format!(
                "Castle {} is not indexed on {}",
                castle.id, castle.coord
            )));
        }
        if castle.units > SANITY_MAX_UNITS {
            violations.push(violation(format!(
                "Castle {} has {} units > sanity max {SANITY_MAX_UNITS}",
                castle.id, castle.units
            )));
        }
    }

    // Unresolved contact
    for army in state.armies().values() {
        let Some(coord) = spatial.tile_of(army.id) else {
            continue;
        };
        if TileEventSystem::is_contested(spatial, state.castles(), coord, army.owner) {
            violations.push(violation(format!(
                "Army {} shares tile {coord} with a hostile faction",
                army.id
            )));
        }
    }

    violations
}

/// Assert all engine invariants hold, panicking if any are violated.
///
/// Only active in debug builds. No-op in release builds.
///
/// # Panics
///
/// Panics with detailed message if any invariant is violated.
#[cfg(debug_assertions)]
pub fn assert_invariants(state: &GameState) {
    let violations = check_invariants(state);
    if !violations.is_empty() {
        let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        panic!("Engine invariant violations:\n  - {}", messages.join("\n  - "));
    }
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
pub fn assert_invariants(_state: &GameState) {}
