//! Spatial index: which castle and armies occupy which tile.
//!
//! The index is the only structure written by position updates. It never
//! owns entities; it records tile associations by identifier and callers
//! pass the live roster when they need the entities back.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::error::{EngineError, Result};
use crate::game::{Army, CastleId, Coord, PlayerId, UnitId};

/// Whether a unit arrived on or left a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileEventKind {
    /// The unit's derived tile became `coord`.
    Enter,
    /// The unit's derived tile stopped being `coord`.
    Exit,
}

/// A unit crossing a tile boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileEvent {
    /// Enter or exit.
    pub kind: TileEventKind,
    /// The unit that moved.
    pub unit: UnitId,
    /// Faction of the unit.
    pub owner: PlayerId,
    /// Tile entered or left.
    pub coord: Coord,
}

impl TileEvent {
    const fn enter(unit: UnitId, owner: PlayerId, coord: Coord) -> Self {
        Self {
            kind: TileEventKind::Enter,
            unit,
            owner,
            coord,
        }
    }

    const fn exit(unit: UnitId, owner: PlayerId, coord: Coord) -> Self {
        Self {
            kind: TileEventKind::Exit,
            unit,
            owner,
            coord,
        }
    }
}

/// Everything standing on one tile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileOccupancy {
    /// The castle on the tile, if any.
    pub castle: Option<CastleId>,
    /// Settled armies resting on the tile.
    pub settled: BTreeSet<UnitId>,
    /// Moving armies whose derived tile is this one.
    pub moving: BTreeSet<UnitId>,
}

impl TileOccupancy {
    /// True when nothing stands on the tile.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.castle.is_none() && self.settled.is_empty() && self.moving.is_empty()
    }

    /// True when a castle or settled army is on the tile.
    #[must_use]
    pub fn has_stationary(&self) -> bool {
        self.castle.is_some() || !self.settled.is_empty()
    }
}

static EMPTY_TILE: TileOccupancy = TileOccupancy {
    castle: None,
    settled: BTreeSet::new(),
    moving: BTreeSet::new(),
};

#[derive(Debug, Clone, Copy)]
struct Tracked {
    coord: Coord,
    owner: PlayerId,
    settled: bool,
}

/// Authoritative tile → occupants mapping.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    /// Pixel size of a tile, used to derive tiles from positions.
    tile_size: f32,
    /// Occupancy by tile. Tiles with nothing on them are dropped.
    tiles: BTreeMap<Coord, TileOccupancy>,
    /// Last known tile of every tracked army.
    units: BTreeMap<UnitId, Tracked>,
    /// Last identifier handed out.
    last_id: u32,
}

impl SpatialIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new(tile_size: f32) -> Self {
        Self {
            tile_size,
            tiles: BTreeMap::new(),
            units: BTreeMap::new(),
            last_id: 0,
        }
    }

    /// Pixel size of a tile.
    #[must_use]
    pub const fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Hand out a fresh unit identifier.
    pub fn allocate_id(&mut self) -> UnitId {
        self.last_id += 1;
        UnitId(self.last_id)
    }

    /// Make sure future identifiers do not collide with `id`.
    ///
    /// Used when armies with existing identifiers are loaded from a save.
    pub fn reserve_id(&mut self, id: UnitId) {
        self.last_id = self.last_id.max(id.0);
    }

    /// Register a castle on its tile.
    ///
    /// # Errors
    ///
    /// Returns an error if another castle already stands on `coord`.
    pub fn place_castle(&mut self, id: CastleId, coord: Coord) -> Result<()> {
        let tile = self.tiles.entry(coord).or_default();
        if tile.castle.is_some_and(|existing| existing != id) {
            return Err(EngineError::TileOccupied(coord));
        }
        tile.castle = Some(id);
        Ok(())
    }

    /// Start tracking a moving army on the tile derived from its position.
    ///
    /// Returns the enter event. An army that is already tracked is updated
    /// instead, so it never ends up on two tiles.
    pub fn track_unit(&mut self, army: &Army) -> Vec<TileEvent> {
        if self.units.contains_key(&army.id) {
            return self.update_unit(army);
        }
        self.reserve_id(army.id);
        let coord = army.position.tile(self.tile_size);
        self.insert(army.id, army.owner, coord, false);
        trace!(unit = %army.id, %coord, "tracking unit");
        vec![TileEvent::enter(army.id, army.owner, coord)]
    }

    /// Re-derive a moving army's tile from its position.
    ///
    /// Returns nothing when the tile is unchanged, otherwise the exit event
    /// for the old tile followed by the enter event for the new one.
    pub fn update_unit(&mut self, army: &Army) -> Vec<TileEvent> {
        let Some(tracked) = self.units.get(&army.id).copied() else {
            return self.track_unit(army);
        };
        if tracked.settled {
            return Vec::new();
        }
        let coord = army.position.tile(self.tile_size);
        if coord == tracked.coord {
            return Vec::new();
        }
        self.detach(army.id, tracked);
        self.insert(army.id, army.owner, coord, false);
        vec![
            TileEvent::exit(army.id, army.owner, tracked.coord),
            TileEvent::enter(army.id, army.owner, coord),
        ]
    }

    /// Record `army` as a stationary occupant of its settled tile.
    ///
    /// A moving record for the same army is replaced.
    pub fn settle_unit(&mut self, army: &Army, coord: Coord) {
        if let Some(tracked) = self.units.get(&army.id).copied() {
            self.detach(army.id, tracked);
        }
        self.reserve_id(army.id);
        self.insert(army.id, army.owner, coord, true);
    }

    /// Turn a settled record back into a moving one on the same tile.
    pub fn unsettle_unit(&mut self, id: UnitId) {
        let Some(tracked) = self.units.get(&id).copied() else {
            return;
        };
        if !tracked.settled {
            return;
        }
        self.detach(id, tracked);
        self.insert(id, tracked.owner, tracked.coord, false);
    }

    /// Stop tracking a unit.
    ///
    /// Returns the exit event for its last tile, or nothing if the unit was
    /// never tracked.
    pub fn remove_unit(&mut self, id: UnitId) -> Vec<TileEvent> {
        let Some(tracked) = self.units.get(&id).copied() else {
            return Vec::new();
        };
        self.detach(id, tracked);
        vec![TileEvent::exit(id, tracked.owner, tracked.coord)]
    }

    /// Live roster entries whose indexed tile is `coord`.
    pub fn units_on_tile<'a>(
        &self,
        coord: Coord,
        roster: impl IntoIterator<Item = &'a Army>,
    ) -> Vec<&'a Army> {
        roster
            .into_iter()
            .filter(|army| self.tile_of(army.id) == Some(coord))
            .collect()
    }

    /// Occupancy of `coord`. Unknown and out of bounds tiles are empty.
    #[must_use]
    pub fn occupancy(&self, coord: Coord) -> &TileOccupancy {
        self.tiles.get(&coord).unwrap_or(&EMPTY_TILE)
    }

    /// Tile a unit is currently indexed on.
    #[must_use]
    pub fn tile_of(&self, id: UnitId) -> Option<Coord> {
        self.units.get(&id).map(|tracked| tracked.coord)
    }

    /// Whether the unit is indexed as a stationary occupant.
    #[must_use]
    pub fn is_settled(&self, id: UnitId) -> bool {
        self.units.get(&id).is_some_and(|tracked| tracked.settled)
    }

    /// Factions of every army (moving or settled) on `coord`.
    #[must_use]
    pub fn unit_factions(&self, coord: Coord) -> BTreeSet<PlayerId> {
        let tile = self.occupancy(coord);
        tile.settled
            .iter()
            .chain(&tile.moving)
            .filter_map(|id| self.units.get(id).map(|tracked| tracked.owner))
            .collect()
    }

    /// Number of tracked units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True when no units are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Every tracked unit with its indexed tile.
    pub fn tracked(&self) -> impl Iterator<Item = (UnitId, Coord)> + '_ {
        self.units.iter().map(|(id, tracked)| (*id, tracked.coord))
    }

    /// Every non-empty tile record.
    pub fn tiles(&self) -> impl Iterator<Item = (Coord, &TileOccupancy)> {
        self.tiles.iter().map(|(coord, tile)| (*coord, tile))
    }

    fn insert(&mut self, id: UnitId, owner: PlayerId, coord: Coord, settled: bool) {
        let tile = self.tiles.entry(coord).or_default();
        if settled {
            tile.settled.insert(id);
        } else {
            tile.moving.insert(id);
        }
        self.units.insert(
            id,
            Tracked {
                coord,
                owner,
                settled,
            },
        );
    }

    fn detach(&mut self, id: UnitId, tracked: Tracked) {
        self.units.remove(&id);
        if let Some(tile) = self.tiles.get_mut(&tracked.coord) {
            if tracked.settled {
                tile.settled.remove(&id);
            } else {
                tile.moving.remove(&id);
            }
            if tile.is_empty() {
                self.tiles.remove(&tracked.coord);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Position;

    const TILE: f32 = 32.0;

    fn army_at(id: u32, owner: PlayerId, x: f32, y: f32) -> Army {
        Army::marching(UnitId(id), owner, 10, Position::new(x, y), Coord::new(9, 9))
    }

    #[test]
    fn test_track_emits_enter() {
        let mut index = SpatialIndex::new(TILE);
        let army = army_at(1, 1, 40.0, 10.0);
        let events = index.track_unit(&army);
        assert_eq!(events, vec![TileEvent::enter(UnitId(1), 1, Coord::new(1, 0))]);
        assert!(index.occupancy(Coord::new(1, 0)).moving.contains(&UnitId(1)));
    }

    #[test]
    fn test_update_same_tile_is_silent() {
        let mut index = SpatialIndex::new(TILE);
        let mut army = army_at(1, 1, 40.0, 10.0);
        index.track_unit(&army);
        army.position.x = 60.0;
        assert!(index.update_unit(&army).is_empty());
    }

    #[test]
    fn test_update_orders_exit_before_enter() {
        let mut index = SpatialIndex::new(TILE);
        let mut army = army_at(1, 1, 40.0, 10.0);
        index.track_unit(&army);
        army.position.x = 70.0;

        let events = index.update_unit(&army);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, TileEventKind::Exit);
        assert_eq!(events[0].coord, Coord::new(1, 0));
        assert_eq!(events[1].kind, TileEventKind::Enter);
        assert_eq!(events[1].coord, Coord::new(2, 0));
        assert!(index.occupancy(Coord::new(1, 0)).is_empty());
        assert_eq!(index.tile_of(UnitId(1)), Some(Coord::new(2, 0)));
    }

    #[test]
    fn test_track_twice_does_not_duplicate() {
        let mut index = SpatialIndex::new(TILE);
        let mut army = army_at(1, 1, 10.0, 10.0);
        index.track_unit(&army);
        army.position.y = 40.0;
        let events = index.track_unit(&army);
        assert_eq!(events.len(), 2);
        assert_eq!(index.len(), 1);
        assert!(index.occupancy(Coord::new(0, 0)).is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut index = SpatialIndex::new(TILE);
        assert!(index.remove_unit(UnitId(7)).is_empty());
    }

    #[test]
    fn test_remove_emits_exit() {
        let mut index = SpatialIndex::new(TILE);
        let army = army_at(3, 2, 10.0, 10.0);
        index.track_unit(&army);
        let events = index.remove_unit(UnitId(3));
        assert_eq!(events, vec![TileEvent::exit(UnitId(3), 2, Coord::new(0, 0))]);
        assert!(index.is_empty());
        assert_eq!(index.tile_of(UnitId(3)), None);
    }

    #[test]
    fn test_units_on_tile_filters_roster() {
        let mut index = SpatialIndex::new(TILE);
        let a = army_at(1, 1, 10.0, 10.0);
        let b = army_at(2, 2, 20.0, 20.0);
        let c = army_at(3, 2, 50.0, 20.0);
        for army in [&a, &b, &c] {
            index.track_unit(army);
        }
        let roster = [a, b, c];
        let ids: Vec<_> = index
            .units_on_tile(Coord::new(0, 0), &roster)
            .iter()
            .map(|army| army.id)
            .collect();
        assert_eq!(ids, vec![UnitId(1), UnitId(2)]);

        // Stale roster entries (removed from the index) are not returned.
        index.remove_unit(UnitId(2));
        assert_eq!(index.units_on_tile(Coord::new(0, 0), &roster).len(), 1);
    }

    #[test]
    fn test_settle_moves_between_sets() {
        let mut index = SpatialIndex::new(TILE);
        let army = army_at(1, 1, 10.0, 10.0);
        index.track_unit(&army);
        index.settle_unit(&army, Coord::new(0, 0));

        let tile = index.occupancy(Coord::new(0, 0));
        assert!(tile.moving.is_empty());
        assert!(tile.settled.contains(&UnitId(1)));
        assert!(index.is_settled(UnitId(1)));

        index.unsettle_unit(UnitId(1));
        assert!(index.occupancy(Coord::new(0, 0)).moving.contains(&UnitId(1)));
    }

    #[test]
    fn test_castle_conflict() {
        let mut index = SpatialIndex::new(TILE);
        index.place_castle(CastleId(1), Coord::new(2, 2)).unwrap();
        assert!(index.place_castle(CastleId(1), Coord::new(2, 2)).is_ok());
        assert!(index.place_castle(CastleId(2), Coord::new(2, 2)).is_err());
    }

    #[test]
    fn test_out_of_bounds_occupancy_is_empty() {
        let index = SpatialIndex::new(TILE);
        assert!(index.occupancy(Coord::new(-5, 1000)).is_empty());
    }

    #[test]
    fn test_allocate_respects_reserved() {
        let mut index = SpatialIndex::new(TILE);
        index.reserve_id(UnitId(41));
        assert_eq!(index.allocate_id(), UnitId(42));
    }
}
