//! Castles and armies.
//!
//! Entities are plain records. Rendering adapters observe them from outside
//! the engine; nothing here knows how an army is drawn.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::{Coord, Position};

/// Unique identifier for a player (faction).
pub type PlayerId = u8;

/// The faction owning unclaimed castles. It never receives vision or production.
pub const NEUTRAL: PlayerId = 0;

/// Identifier of an army, assigned once when it is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a castle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CastleId(pub u32);

impl fmt::Display for CastleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "castle {}", self.0)
    }
}

/// Production cadence of a castle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Production {
    /// Frames accumulated towards the next cycle.
    pub progress: u32,
}

/// A castle. Castles persist for the whole game and only change hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Castle {
    /// Unique identifier.
    pub id: CastleId,
    /// Tile the castle stands on.
    pub coord: Coord,
    /// Current owner, [`NEUTRAL`] when unclaimed.
    pub owner: PlayerId,
    /// Garrisoned units.
    pub units: u32,
    /// Production state.
    #[serde(default)]
    pub production: Production,
}

impl Castle {
    /// Create a castle with an empty production cycle.
    #[must_use]
    pub const fn new(id: CastleId, coord: Coord, owner: PlayerId, units: u32) -> Self {
        Self {
            id,
            coord,
            owner,
            units,
            production: Production { progress: 0 },
        }
    }

    /// Advance production by one frame.
    ///
    /// Returns the number of units produced this frame.
    pub fn tick_production(&mut self, interval: u32, amount: u32, cap: u32) -> u32 {
        if self.owner == NEUTRAL || interval == 0 || self.units >= cap {
            return 0;
        }
        self.production.progress += 1;
        if self.production.progress < interval {
            return 0;
        }
        self.production.progress = 0;
        let produced = amount.min(cap - self.units);
        self.units += produced;
        produced
    }
}

/// Movement state of an army.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Motion {
    /// In transit towards a destination tile.
    Marching {
        /// Tile the march ends on.
        destination: Coord,
    },
    /// Halted on a contested tile; the rest of the order was dropped.
    Engaged {
        /// Tile the army is holding.
        coord: Coord,
    },
    /// Resting on a tile as a stationary occupant.
    Settled {
        /// Tile the army rests on.
        coord: Coord,
    },
}

/// An army, either marching or settled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Army {
    /// Unique identifier.
    pub id: UnitId,
    /// Owning faction.
    pub owner: PlayerId,
    /// Number of units. An army at zero is destroyed.
    pub units: u32,
    /// Continuous position in pixels.
    pub position: Position,
    /// Movement state.
    pub motion: Motion,
    /// Vision radius override in tiles.
    #[serde(default)]
    pub vision_range: Option<u32>,
}

impl Army {
    /// Create a marching army.
    #[must_use]
    pub const fn marching(
        id: UnitId,
        owner: PlayerId,
        units: u32,
        position: Position,
        destination: Coord,
    ) -> Self {
        Self {
            id,
            owner,
            units,
            position,
            motion: Motion::Marching { destination },
            vision_range: None,
        }
    }

    /// Create an army settled on `coord`.
    #[must_use]
    pub fn settled(id: UnitId, owner: PlayerId, units: u32, coord: Coord, tile_size: f32) -> Self {
        Self {
            id,
            owner,
            units,
            position: coord.center(tile_size),
            motion: Motion::Settled { coord },
            vision_range: None,
        }
    }

    /// Whether the army is a stationary occupant.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self.motion, Motion::Settled { .. })
    }

    /// Whether the army is tracked as a moving unit.
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        !self.is_settled()
    }

    /// Destination tile of an active march.
    #[must_use]
    pub const fn destination(&self) -> Option<Coord> {
        match self.motion {
            Motion::Marching { destination } => Some(destination),
            Motion::Engaged { .. } | Motion::Settled { .. } => None,
        }
    }

    /// Stop on `coord`, dropping whatever remains of the march.
    pub fn halt(&mut self, coord: Coord) {
        self.motion = Motion::Engaged { coord };
    }

    /// Become a stationary occupant of `coord`.
    pub fn settle(&mut self, coord: Coord, tile_size: f32) {
        self.position = coord.center(tile_size);
        self.motion = Motion::Settled { coord };
    }

    /// Vision radius, falling back to `default`.
    #[must_use]
    pub fn vision(&self, default: u32) -> u32 {
        self.vision_range.unwrap_or(default)
    }
}
