//! Error types for the engine.

use thiserror::Error;

use crate::game::{CastleId, Coord, UnitId};

/// Errors returned by engine commands and persistence.
///
/// Queries never fail; out-of-range lookups return safe defaults instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Map dimensions must be non-zero.
    #[error("invalid map size {width}x{height}")]
    InvalidMapSize {
        /// Requested width in tiles.
        width: i32,
        /// Requested height in tiles.
        height: i32,
    },
    /// No castle with the given identifier exists.
    #[error("unknown castle {0}")]
    UnknownCastle(CastleId),
    /// No army with the given identifier exists.
    #[error("unknown army {0}")]
    UnknownArmy(UnitId),
    /// Coordinate lies outside the map.
    #[error("tile {0} is outside the map")]
    OutOfBounds(Coord),
    /// Two castles were placed on the same tile.
    #[error("tile {0} already holds a castle")]
    TileOccupied(Coord),
    /// A dispatch asked for more units than the castle holds.
    #[error("castle {castle} holds {available} units, {requested} requested")]
    NotEnoughUnits {
        /// Source castle.
        castle: CastleId,
        /// Units currently garrisoned.
        available: u32,
        /// Units asked for.
        requested: u32,
    },
    /// Forces must contain at least one unit.
    #[error("an army needs at least one unit")]
    EmptyArmy,
    /// A settled army or castle was placed where a hostile faction stands.
    #[error("tile {0} is held by a hostile faction")]
    HostileTile(Coord),
    /// An engine configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// A save file is internally inconsistent.
    #[error("invalid save: {0}")]
    InvalidSave(String),
    /// A scenario order refers to something the scenario never defines.
    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
    /// Reading or writing a file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
