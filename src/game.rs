//! Game layer for Bastion.
//!
//! Implements the engine on top of a plain tile grid:
//! - Map geometry (tiles, pixel positions)
//! - Castles and armies
//! - Spatial index of tile occupancy
//! - Tile events and combat situation detection
//! - Combat resolution
//! - Per-player fog of war

mod combat;
mod entities;
mod invariants;
mod map;
mod snapshot;
mod spatial;
mod state;
mod tile_events;
mod visibility;

pub use combat::{Battle, CombatOutcome, Force, SituationOutcome, resolve, resolve_situation};
pub use entities::{Army, Castle, CastleId, Motion, NEUTRAL, PlayerId, Production, UnitId};
pub use invariants::{InvariantViolation, SANITY_MAX_UNITS, assert_invariants, check_invariants};
pub use map::{Coord, Map, Position};
pub use snapshot::SaveState;
pub use spatial::{SpatialIndex, TileEvent, TileEventKind, TileOccupancy};
pub use state::{Arrival, FrameReport, GameState};
pub use tile_events::{Advance, CombatKind, CombatSituation, TileEventSystem};
pub use visibility::{Visibility, VisibilityField};
