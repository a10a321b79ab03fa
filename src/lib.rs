// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Bastion: a deterministic tile engine for castle-and-army grid conquest games.
//!
//! This crate provides the simulation core designed for:
//! - Tile occupancy tracking with enter and exit events
//! - Contact detection and deterministic combat resolution
//! - Per-player fog of war
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │     Scenarios / Skirmish Soak       │
//! ├─────────────────────────────────────┤
//! │   GameState frame driver            │
//! ├──────────────┬──────────┬───────────┤
//! │ Tile events  │  Combat  │ Visibility│
//! ├──────────────┴──────────┴───────────┤
//! │         Spatial index               │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use bastion::{Coord, EngineConfig, GameState, Map};
//!
//! let mut game = GameState::new(Map::new(10, 10)?, EngineConfig::default());
//! let home = game.add_castle(Coord::new(1, 1), 1, 30)?;
//! game.add_castle(Coord::new(6, 1), 2, 10)?;
//! game.dispatch(home, 25, Coord::new(6, 1))?;
//!
//! for _ in 0..200 {
//!     game.update(0.1);
//! }
//! assert_eq!(game.castle_at(Coord::new(6, 1)).map(|c| c.owner), Some(1));
//! # Ok::<(), bastion::EngineError>(())
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod render;
pub mod scenario;
pub mod skirmish;

pub use config::{Capabilities, EngineConfig};
pub use error::{EngineError, Result};

// Re-export key game types at crate root for convenience
pub use game::{
    Army, Castle, CastleId, CombatKind, CombatSituation, Coord, FrameReport, GameState, Map,
    NEUTRAL, PlayerId, SaveState, UnitId, Visibility,
};
pub use scenario::Scenario;
