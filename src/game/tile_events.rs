//! Tile events: turning position deltas into enter/exit events and
//! classifying contested tiles into combat situations.
//!
//! Events are buffered for the whole frame. Classification only runs once
//! every unit has moved, so several armies arriving on one tile in the same
//! frame produce a single situation rather than one per pair.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::game::{
    Army, Castle, CastleId, Coord, PlayerId, SpatialIndex, TileEvent, TileEventKind, UnitId,
};

/// What kind of contact a situation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CombatKind {
    /// A castle or settled army is involved.
    TileCombat,
    /// Only moving units collided.
    MovingUnitCombat,
}

/// Factions meeting on one tile during a frame.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CombatSituation {
    /// Stationary or moving-only contact.
    pub kind: CombatKind,
    /// The contested tile.
    pub coord: Coord,
    /// Every distinct faction present.
    pub factions: BTreeSet<PlayerId>,
    /// Castle on the tile.
    pub castle: Option<CastleId>,
    /// Settled armies on the tile.
    pub settled: Vec<UnitId>,
    /// Moving armies on the tile, earliest arrival first.
    pub moving: Vec<UnitId>,
}

/// Result of advancing one army for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Still on the way.
    Moving,
    /// Reached the center of its destination tile.
    Arrived(Coord),
    /// Entered or stands on a contested tile and stopped there.
    Blocked(Coord),
    /// Has no march order.
    Holding,
}

/// Frame-scoped event buffer and combat classifier.
#[derive(Debug, Clone, Default)]
pub struct TileEventSystem {
    /// Events recorded since the last drain, in emission order.
    pending: Vec<TileEvent>,
}

impl TileEventSystem {
    /// Create an empty event system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer events for the current frame.
    pub fn record(&mut self, events: impl IntoIterator<Item = TileEvent>) {
        self.pending.extend(events);
    }

    /// Events buffered so far this frame.
    #[must_use]
    pub fn pending(&self) -> &[TileEvent] {
        &self.pending
    }

    /// Take every buffered event, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<TileEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Move `army` up to `distance` pixels towards its destination.
    ///
    /// The move is split into sub-steps of at most half a tile so no tile on
    /// the way is skipped. Every tile change goes through the index and its
    /// events are buffered. Entering a contested tile halts the army there
    /// and drops the rest of its order.
    pub fn advance(
        &mut self,
        index: &mut SpatialIndex,
        castles: &[Castle],
        army: &mut Army,
        distance: f32,
    ) -> Advance {
        let Some(destination) = army.destination() else {
            return Advance::Holding;
        };
        let tile_size = index.tile_size();

        let here = army.position.tile(tile_size);
        if Self::is_contested(index, castles, here, army.owner) {
            army.halt(here);
            return Advance::Blocked(here);
        }

        let target = destination.center(tile_size);
        let max_step = tile_size * 0.5;
        // A degenerate tile size would never make progress.
        if !max_step.is_finite() || max_step <= 0.0 {
            return Advance::Moving;
        }
        let mut remaining = distance;

        while remaining > 0.0 {
            let left = army.position.distance(target);
            let step = remaining.min(max_step).min(left);
            let arrived = step >= left;
            army.position = if arrived {
                target
            } else {
                army.position.step_towards(target, step)
            };
            remaining -= step;

            let events = index.update_unit(army);
            let entered = events
                .iter()
                .find(|event| event.kind == TileEventKind::Enter)
                .map(|event| event.coord);
            self.pending.extend(events);

            if let Some(coord) = entered {
                if Self::is_contested(index, castles, coord, army.owner) {
                    trace!(unit = %army.id, %coord, "blocked on contested tile");
                    army.halt(coord);
                    return Advance::Blocked(coord);
                }
            }
            if arrived {
                return Advance::Arrived(destination);
            }
        }

        Advance::Moving
    }

    /// Whether `coord` holds anything hostile to `faction`.
    #[must_use]
    pub fn is_contested(
        index: &SpatialIndex,
        castles: &[Castle],
        coord: Coord,
        faction: PlayerId,
    ) -> bool {
        let tile = index.occupancy(coord);
        let hostile_castle = tile
            .castle
            .and_then(|id| find_castle(castles, id))
            .is_some_and(|castle| castle.owner != faction);
        hostile_castle || index.unit_factions(coord).iter().any(|&owner| owner != faction)
    }

    /// Classify a frame's events into combat situations.
    ///
    /// Only enter events matter. An enter whose unit has since left the tile
    /// or been removed is stale and ignored. Each tile produces at most one
    /// situation listing every faction and every moving unit on it.
    #[must_use]
    pub fn process_events(
        events: &[TileEvent],
        index: &SpatialIndex,
        castles: &[Castle],
        roster: &BTreeMap<UnitId, Army>,
    ) -> Vec<CombatSituation> {
        let mut tiles: Vec<Coord> = Vec::new();
        let mut arrivals: BTreeMap<Coord, Vec<UnitId>> = BTreeMap::new();

        for event in events {
            if event.kind != TileEventKind::Enter {
                continue;
            }
            if index.tile_of(event.unit) != Some(event.coord) || !roster.contains_key(&event.unit) {
                continue;
            }
            let entering = arrivals.entry(event.coord).or_insert_with(|| {
                tiles.push(event.coord);
                Vec::new()
            });
            if !entering.contains(&event.unit) {
                entering.push(event.unit);
            }
        }

        let mut situations = Vec::new();
        for coord in tiles {
            let entering = arrivals.remove(&coord).unwrap_or_default();
            if let Some(situation) = Self::classify_tile(coord, &entering, index, castles, roster) {
                debug!(
                    %coord,
                    kind = ?situation.kind,
                    factions = ?situation.factions,
                    "combat situation"
                );
                situations.push(situation);
            }
        }
        situations
    }

    fn classify_tile(
        coord: Coord,
        entering: &[UnitId],
        index: &SpatialIndex,
        castles: &[Castle],
        roster: &BTreeMap<UnitId, Army>,
    ) -> Option<CombatSituation> {
        let tile = index.occupancy(coord);
        let mut factions = BTreeSet::new();

        let castle = tile.castle.and_then(|id| find_castle(castles, id));
        if let Some(castle) = castle {
            factions.insert(castle.owner);
        }

        let settled: Vec<UnitId> = tile
            .settled
            .iter()
            .copied()
            .filter(|id| roster.contains_key(id))
            .collect();

        // Units that were already here before this frame arrived first.
        let mut moving: Vec<UnitId> = tile
            .moving
            .iter()
            .copied()
            .filter(|id| roster.contains_key(id) && !entering.contains(id))
            .collect();
        moving.extend_from_slice(entering);

        for id in settled.iter().chain(&moving) {
            if let Some(army) = roster.get(id) {
                factions.insert(army.owner);
            }
        }

        if factions.len() < 2 {
            return None;
        }

        let kind = if castle.is_some() || !settled.is_empty() {
            CombatKind::TileCombat
        } else {
            CombatKind::MovingUnitCombat
        };

        Some(CombatSituation {
            kind,
            coord,
            factions,
            castle: castle.map(|castle| castle.id),
            settled,
            moving,
        })
    }
}

/// Look up a castle by identifier.
pub(crate) fn find_castle(castles: &[Castle], id: CastleId) -> Option<&Castle> {
    castles.iter().find(|castle| castle.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Position;

    const TILE: f32 = 32.0;

    struct World {
        index: SpatialIndex,
        castles: Vec<Castle>,
        roster: BTreeMap<UnitId, Army>,
    }

    impl World {
        fn new() -> Self {
            Self {
                index: SpatialIndex::new(TILE),
                castles: Vec::new(),
                roster: BTreeMap::new(),
            }
        }

        fn castle(&mut self, id: u32, coord: Coord, owner: PlayerId) {
            let castle = Castle::new(CastleId(id), coord, owner, 10);
            self.index.place_castle(castle.id, coord).unwrap();
            self.castles.push(castle);
        }

        fn settled(&mut self, id: u32, coord: Coord, owner: PlayerId) {
            let army = Army::settled(UnitId(id), owner, 10, coord, TILE);
            self.index.settle_unit(&army, coord);
            self.roster.insert(army.id, army);
        }

        fn moving(&mut self, id: u32, coord: Coord, owner: PlayerId) -> Vec<TileEvent> {
            let army = Army::marching(UnitId(id), owner, 10, coord.center(TILE), Coord::new(0, 0));
            self.roster.insert(army.id, army);
            self.index.track_unit(&army)
        }

        fn teleport(&mut self, id: u32, coord: Coord) -> Vec<TileEvent> {
            let army = self.roster.get_mut(&UnitId(id)).unwrap();
            army.position = coord.center(TILE);
            self.index.update_unit(army)
        }

        fn process(&self, events: &[TileEvent]) -> Vec<CombatSituation> {
            TileEventSystem::process_events(events, &self.index, &self.castles, &self.roster)
        }
    }

    #[test]
    fn test_friendly_entry_is_not_combat() {
        let mut world = World::new();
        world.castle(1, Coord::new(3, 3), 1);
        world.settled(10, Coord::new(3, 3), 1);
        world.moving(20, Coord::new(3, 3), 1);
        let events = world.moving(21, Coord::new(3, 3), 1);

        assert!(world.process(&events).is_empty());
    }

    #[test]
    fn test_enemy_castle_entry_is_tile_combat() {
        let mut world = World::new();
        world.castle(1, Coord::new(3, 3), 2);
        world.moving(20, Coord::new(2, 3), 1);
        let events = world.teleport(20, Coord::new(3, 3));

        let situations = world.process(&events);
        assert_eq!(situations.len(), 1);
        assert_eq!(situations[0].kind, CombatKind::TileCombat);
        assert_eq!(situations[0].castle, Some(CastleId(1)));
        assert_eq!(situations[0].factions, BTreeSet::from([1, 2]));
        assert_eq!(situations[0].moving, vec![UnitId(20)]);
    }

    #[test]
    fn test_moving_only_collision() {
        let mut world = World::new();
        world.moving(1, Coord::new(4, 4), 1);
        let events = world.moving(2, Coord::new(4, 4), 2);

        let situations = world.process(&events);
        assert_eq!(situations.len(), 1);
        assert_eq!(situations[0].kind, CombatKind::MovingUnitCombat);
        assert_eq!(situations[0].moving, vec![UnitId(1), UnitId(2)]);
    }

    #[test]
    fn test_simultaneous_arrivals_coalesce() {
        let mut world = World::new();
        world.settled(1, Coord::new(5, 5), 9);
        world.moving(2, Coord::new(4, 5), 1);
        world.moving(3, Coord::new(6, 5), 2);
        world.moving(4, Coord::new(5, 4), 3);

        let mut events = Vec::new();
        events.extend(world.teleport(3, Coord::new(5, 5)));
        events.extend(world.teleport(2, Coord::new(5, 5)));
        events.extend(world.teleport(4, Coord::new(5, 5)));

        let situations = world.process(&events);
        assert_eq!(situations.len(), 1);
        let situation = &situations[0];
        assert_eq!(situation.factions, BTreeSet::from([1, 2, 3, 9]));
        assert_eq!(situation.settled, vec![UnitId(1)]);
        assert_eq!(situation.moving, vec![UnitId(3), UnitId(2), UnitId(4)]);
    }

    #[test]
    fn test_stale_enter_is_ignored() {
        let mut world = World::new();
        world.settled(1, Coord::new(5, 5), 2);
        world.moving(2, Coord::new(4, 5), 1);

        let mut events = world.teleport(2, Coord::new(5, 5));
        events.extend(world.teleport(2, Coord::new(6, 5)));

        assert!(world.process(&events).is_empty());
    }

    #[test]
    fn test_exit_events_carry_no_combat() {
        let mut world = World::new();
        world.settled(1, Coord::new(5, 5), 2);
        world.moving(2, Coord::new(5, 5), 2);
        let events = world.index.remove_unit(UnitId(2));

        assert!(world.process(&events).is_empty());
    }

    #[test]
    fn test_jump_and_steps_agree() {
        let target = Coord::new(1, 8);

        let mut jump = World::new();
        jump.settled(1, target, 2);
        jump.moving(2, Coord::new(8, 8), 3);
        let jump_events = jump.teleport(2, target);
        let jumped = jump.process(&jump_events);

        let mut walk = World::new();
        walk.settled(1, target, 2);
        walk.moving(2, Coord::new(8, 8), 3);
        let mut walked = Vec::new();
        for x in (1..8).rev() {
            let events = walk.teleport(2, Coord::new(x, 8));
            walked.extend(walk.process(&events));
        }

        assert_eq!(jumped, walked);
        assert_eq!(walked.len(), 1);
        assert_eq!(walked[0].coord, target);
    }

    #[test]
    fn test_advance_blocks_on_contested_tile() {
        let mut world = World::new();
        world.settled(1, Coord::new(3, 0), 2);
        let mut army = Army::marching(UnitId(2), 1, 5, Coord::new(0, 0).center(TILE), Coord::new(6, 0));
        world.index.track_unit(&army);

        let mut system = TileEventSystem::new();
        let result = system.advance(&mut world.index, &world.castles, &mut army, 1000.0);

        assert_eq!(result, Advance::Blocked(Coord::new(3, 0)));
        assert_eq!(army.destination(), None);
        assert_eq!(world.index.tile_of(UnitId(2)), Some(Coord::new(3, 0)));
        // Exit/enter pairs for tiles 1, 2 and 3.
        assert_eq!(system.pending().len(), 6);
    }

    #[test]
    fn test_advance_arrives() {
        let mut world = World::new();
        let mut army = Army::marching(UnitId(2), 1, 5, Coord::new(0, 0).center(TILE), Coord::new(2, 0));
        world.index.track_unit(&army);

        let mut system = TileEventSystem::new();
        assert_eq!(
            system.advance(&mut world.index, &world.castles, &mut army, 40.0),
            Advance::Moving
        );
        assert_eq!(
            system.advance(&mut world.index, &world.castles, &mut army, 40.0),
            Advance::Arrived(Coord::new(2, 0))
        );
        assert_eq!(system.drain().len(), 4);
        assert!(system.pending().is_empty());
    }

    #[test]
    fn test_advance_holds_without_order() {
        let mut world = World::new();
        let mut army = Army::settled(UnitId(1), 1, 5, Coord::new(0, 0), TILE);
        let mut system = TileEventSystem::new();
        assert_eq!(
            system.advance(&mut world.index, &world.castles, &mut army, 40.0),
            Advance::Holding
        );
    }
}
