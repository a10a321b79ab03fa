//! Game state and the per-frame update pass.
//!
//! One `update` call is one frame:
//!
//! 1. castle production
//! 2. movement, recording tile events
//! 3. classification of the frame's events into combat situations
//! 4. resolution of each situation
//! 5. arrivals and halted armies settle or merge
//! 6. vision refresh
//!
//! Everything runs on the caller's thread; nothing is shared across frames
//! except the state itself.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::game::combat::resolve_situation;
use crate::game::invariants::check_invariants;
use crate::game::tile_events::find_castle;
use crate::game::{
    Advance, Army, Castle, CastleId, CombatSituation, Coord, Map, Motion, NEUTRAL, PlayerId,
    SituationOutcome, SpatialIndex, TileEvent, TileEventSystem, UnitId, Visibility,
    VisibilityField,
};

/// How an army's march ended without a fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Arrival {
    /// Became a settled army on the tile.
    Settled {
        /// The army.
        unit: UnitId,
        /// Where it settled.
        coord: Coord,
    },
    /// Joined the garrison of a friendly castle.
    Reinforced {
        /// The army, now removed.
        unit: UnitId,
        /// The castle reinforced.
        castle: CastleId,
    },
    /// Joined a friendly settled army.
    Merged {
        /// The army, now removed.
        unit: UnitId,
        /// The army it joined.
        into: UnitId,
    },
}

/// Everything that happened during one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Frame number after the update.
    pub tick: u64,
    /// Tile events in emission order, including exits of removed armies.
    pub events: Vec<TileEvent>,
    /// Combat situations found this frame.
    pub situations: Vec<CombatSituation>,
    /// How each situation was resolved, in the same order.
    pub outcomes: Vec<SituationOutcome>,
    /// Marches that ended peacefully.
    pub arrivals: Vec<Arrival>,
    /// Units produced by castles.
    pub produced: u32,
}

/// Complete game state.
#[derive(Debug, Clone)]
pub struct GameState {
    /// Simulation tunables.
    config: EngineConfig,
    /// Map extent.
    map: Map,
    /// All castles, in creation order.
    castles: Vec<Castle>,
    /// All living armies.
    armies: BTreeMap<UnitId, Army>,
    /// Tile occupancy.
    spatial: SpatialIndex,
    /// Frame event buffer.
    tile_events: TileEventSystem,
    /// Per-player fog of war.
    visibility: VisibilityField,
    /// Frames simulated so far.
    tick: u64,
}

impl GameState {
    /// Create an empty game on `map`.
    #[must_use]
    pub fn new(map: Map, config: EngineConfig) -> Self {
        Self {
            spatial: SpatialIndex::new(config.tile_size),
            tile_events: TileEventSystem::new(),
            visibility: VisibilityField::new(map, config.vision_range, config.castle_vision_bonus),
            config,
            map,
            castles: Vec::new(),
            armies: BTreeMap::new(),
            tick: 0,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The map.
    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    /// Frames simulated so far.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// All castles.
    #[must_use]
    pub fn castles(&self) -> &[Castle] {
        &self.castles
    }

    /// Look up a castle.
    #[must_use]
    pub fn castle(&self, id: CastleId) -> Option<&Castle> {
        find_castle(&self.castles, id)
    }

    /// The castle standing on `coord`.
    #[must_use]
    pub fn castle_at(&self, coord: Coord) -> Option<&Castle> {
        self.spatial
            .occupancy(coord)
            .castle
            .and_then(|id| self.castle(id))
    }

    /// All living armies keyed by identifier.
    #[must_use]
    pub const fn armies(&self) -> &BTreeMap<UnitId, Army> {
        &self.armies
    }

    /// Look up an army.
    #[must_use]
    pub fn army(&self, id: UnitId) -> Option<&Army> {
        self.armies.get(&id)
    }

    /// Tile occupancy index.
    #[must_use]
    pub const fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Fog of war grids.
    #[must_use]
    pub const fn visibility(&self) -> &VisibilityField {
        &self.visibility
    }

    /// Visibility of `coord` for `player`, honoring the fog capability.
    #[must_use]
    pub fn visibility_at(&self, coord: Coord, player: PlayerId) -> Visibility {
        if !self.config.capabilities.fog_of_war && self.map.in_bounds(coord) {
            return Visibility::Visible;
        }
        self.visibility.get(coord, player)
    }

    /// Non-neutral factions that own a castle or an army.
    #[must_use]
    pub fn players(&self) -> BTreeSet<PlayerId> {
        self.castles
            .iter()
            .map(|castle| castle.owner)
            .chain(self.armies.values().map(|army| army.owner))
            .filter(|&owner| owner != NEUTRAL)
            .collect()
    }

    /// Total units a faction holds in castles and armies.
    #[must_use]
    pub fn strength(&self, player: PlayerId) -> u64 {
        let garrisons: u64 = self
            .castles
            .iter()
            .filter(|castle| castle.owner == player)
            .map(|castle| u64::from(castle.units))
            .sum();
        let field: u64 = self
            .armies
            .values()
            .filter(|army| army.owner == player)
            .map(|army| u64::from(army.units))
            .sum();
        garrisons + field
    }

    /// Place a castle.
    ///
    /// # Errors
    ///
    /// Returns an error if `coord` is off the map, already has a castle or
    /// holds armies of another faction.
    pub fn add_castle(&mut self, coord: Coord, owner: PlayerId, units: u32) -> Result<CastleId> {
        self.ensure_in_bounds(coord)?;
        self.ensure_friendly(coord, owner)?;
        let next = self.castles.iter().map(|castle| castle.id.0).max().unwrap_or(0);
        let id = CastleId(next.saturating_add(1));
        self.spatial.place_castle(id, coord)?;
        self.castles.push(Castle::new(id, coord, owner, units));
        Ok(id)
    }

    /// Place a settled army.
    ///
    /// # Errors
    ///
    /// Returns an error if `coord` is off the map or held by another faction,
    /// or if `units` is zero. A settled army never enters a tile, so hostile
    /// contact on placement would go unresolved.
    pub fn spawn_settled(&mut self, owner: PlayerId, units: u32, coord: Coord) -> Result<UnitId> {
        self.ensure_in_bounds(coord)?;
        if units == 0 {
            return Err(EngineError::EmptyArmy);
        }
        self.ensure_friendly(coord, owner)?;
        let id = self.spatial.allocate_id();
        let army = Army::settled(id, owner, units, coord, self.config.tile_size);
        self.spatial.settle_unit(&army, coord);
        self.armies.insert(id, army);
        Ok(id)
    }

    /// Place an army on the center of `from`, marching to `destination`.
    ///
    /// Its enter event is classified with the next frame.
    ///
    /// # Errors
    ///
    /// Returns an error if either tile is off the map or `units` is zero.
    pub fn spawn_marching(
        &mut self,
        owner: PlayerId,
        units: u32,
        from: Coord,
        destination: Coord,
    ) -> Result<UnitId> {
        self.ensure_in_bounds(from)?;
        self.ensure_in_bounds(destination)?;
        if units == 0 {
            return Err(EngineError::EmptyArmy);
        }
        let id = self.spatial.allocate_id();
        let army = Army::marching(id, owner, units, from.center(self.config.tile_size), destination);
        let events = self.spatial.track_unit(&army);
        self.tile_events.record(events);
        self.armies.insert(id, army);
        Ok(id)
    }

    /// Send `units` out of a castle towards `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the castle does not exist, holds fewer units than
    /// requested, `units` is zero or the destination is off the map.
    pub fn dispatch(&mut self, castle: CastleId, units: u32, destination: Coord) -> Result<UnitId> {
        self.ensure_in_bounds(destination)?;
        if units == 0 {
            return Err(EngineError::EmptyArmy);
        }
        let source = self
            .castles
            .iter_mut()
            .find(|c| c.id == castle)
            .ok_or(EngineError::UnknownCastle(castle))?;
        if source.units < units {
            return Err(EngineError::NotEnoughUnits {
                castle,
                available: source.units,
                requested: units,
            });
        }
        source.units -= units;
        let (owner, from) = (source.owner, source.coord);
        debug!(%castle, units, %destination, "dispatching army");
        self.spawn_marching(owner, units, from, destination)
    }

    /// Give an existing army a new destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the army does not exist or the destination is off the map.
    pub fn march(&mut self, unit: UnitId, destination: Coord) -> Result<()> {
        self.ensure_in_bounds(destination)?;
        let army = self
            .armies
            .get_mut(&unit)
            .ok_or(EngineError::UnknownArmy(unit))?;
        if army.is_settled() {
            self.spatial.unsettle_unit(unit);
        }
        army.motion = Motion::Marching { destination };
        Ok(())
    }

    /// Simulate one frame of `dt` seconds.
    pub fn update(&mut self, dt: f32) -> FrameReport {
        self.tick += 1;
        let mut report = FrameReport {
            tick: self.tick,
            ..FrameReport::default()
        };

        if self.config.capabilities.production {
            report.produced = self.tick_production();
        }

        let arrived = self.move_armies(dt.max(0.0) * self.config.march_speed);

        report.events = self.tile_events.drain();
        report.situations = TileEventSystem::process_events(
            &report.events,
            &self.spatial,
            &self.castles,
            &self.armies,
        );

        for situation in &report.situations {
            let outcome = resolve_situation(situation, &self.castles, &self.armies);
            report.events.extend(self.apply_outcome(&outcome));
            report.outcomes.push(outcome);
        }

        for (id, coord) in arrived {
            let still_marching = self
                .armies
                .get(&id)
                .is_some_and(|army| army.destination() == Some(coord));
            if still_marching {
                report.arrivals.extend(self.settle_in_place(id, coord, &mut report.events));
            }
        }

        let engaged: Vec<(UnitId, Coord)> = self
            .armies
            .values()
            .filter_map(|army| match army.motion {
                Motion::Engaged { coord } => Some((army.id, coord)),
                Motion::Marching { .. } | Motion::Settled { .. } => None,
            })
            .collect();
        for (id, coord) in engaged {
            report.arrivals.extend(self.settle_in_place(id, coord, &mut report.events));
        }

        if self.config.capabilities.fog_of_war {
            self.refresh_visibility();
        }

        if self.config.capabilities.invariant_checks {
            for violation in check_invariants(self) {
                warn!(tick = self.tick, "{violation}");
            }
        }

        report
    }

    /// Recompute every player's vision from their castles and armies.
    pub fn refresh_visibility(&mut self) {
        let tile_size = self.config.tile_size;
        for player in self.players() {
            self.visibility
                .refresh(&self.castles, self.armies.values(), tile_size, player);
        }
    }

    /// Switch the player whose view the renderer shows.
    pub fn set_current_player(&mut self, player: PlayerId) {
        self.visibility.set_current_player(player);
    }

    fn tick_production(&mut self) -> u32 {
        let EngineConfig {
            production_interval,
            production_amount,
            garrison_cap,
            ..
        } = self.config;
        self.castles
            .iter_mut()
            .map(|castle| castle.tick_production(production_interval, production_amount, garrison_cap))
            .sum()
    }

    /// Advance every marching army. Returns the armies that reached their destination.
    fn move_armies(&mut self, distance: f32) -> Vec<(UnitId, Coord)> {
        let ids: Vec<UnitId> = self.armies.keys().copied().collect();
        let mut arrived = Vec::new();
        for id in ids {
            let Some(army) = self.armies.get_mut(&id) else {
                continue;
            };
            let step = self
                .tile_events
                .advance(&mut self.spatial, &self.castles, army, distance);
            if let Advance::Arrived(coord) = step {
                arrived.push((id, coord));
            }
        }
        arrived
    }

    /// Apply a resolved situation. Returns exit events of removed armies.
    fn apply_outcome(&mut self, outcome: &SituationOutcome) -> Vec<TileEvent> {
        let mut events = Vec::new();
        for id in &outcome.removed {
            events.extend(self.spatial.remove_unit(*id));
            self.armies.remove(id);
        }

        if let Some(castle_id) = outcome.castle {
            let Some(holder) = outcome.holder else {
                return events;
            };
            if let Some(castle) = self.castles.iter_mut().find(|c| c.id == castle_id) {
                if castle.owner != holder.faction {
                    debug!(castle = %castle_id, from = castle.owner, to = holder.faction, "castle captured");
                    castle.production.progress = 0;
                }
                castle.owner = holder.faction;
                castle.units = holder.units;
            }
            return events;
        }

        if let (Some(id), Some(holder)) = (outcome.survivor, outcome.holder) {
            let tile_size = self.config.tile_size;
            if let Some(army) = self.armies.get_mut(&id) {
                army.units = holder.units;
                if !army.is_settled() {
                    army.settle(outcome.coord, tile_size);
                    self.spatial.settle_unit(army, outcome.coord);
                }
            }
        }
        events
    }

    /// End an army's movement on `coord`: join a friendly castle or settled
    /// army there, otherwise settle.
    fn settle_in_place(
        &mut self,
        id: UnitId,
        coord: Coord,
        events: &mut Vec<TileEvent>,
    ) -> Option<Arrival> {
        let army = *self.armies.get(&id)?;

        if let Some(castle_id) = self.spatial.occupancy(coord).castle {
            if let Some(castle) = self
                .castles
                .iter_mut()
                .find(|c| c.id == castle_id && c.owner == army.owner)
            {
                castle.units = castle.units.saturating_add(army.units);
                events.extend(self.spatial.remove_unit(id));
                self.armies.remove(&id);
                return Some(Arrival::Reinforced {
                    unit: id,
                    castle: castle_id,
                });
            }
        }

        let friendly = self
            .spatial
            .occupancy(coord)
            .settled
            .iter()
            .copied()
            .find(|other| {
                *other != id && self.armies.get(other).is_some_and(|a| a.owner == army.owner)
            });
        if let Some(into) = friendly {
            if let Some(target) = self.armies.get_mut(&into) {
                target.units = target.units.saturating_add(army.units);
            }
            events.extend(self.spatial.remove_unit(id));
            self.armies.remove(&id);
            return Some(Arrival::Merged { unit: id, into });
        }

        let tile_size = self.config.tile_size;
        let army = self.armies.get_mut(&id)?;
        army.settle(coord, tile_size);
        self.spatial.settle_unit(army, coord);
        Some(Arrival::Settled { unit: id, coord })
    }

    fn ensure_in_bounds(&self, coord: Coord) -> Result<()> {
        if self.map.in_bounds(coord) {
            Ok(())
        } else {
            Err(EngineError::OutOfBounds(coord))
        }
    }

    /// Mutable access for tests that corrupt a state on purpose.
    #[cfg(test)]
    pub(crate) fn parts_mut(&mut self) -> (&mut SpatialIndex, &mut BTreeMap<UnitId, Army>) {
        (&mut self.spatial, &mut self.armies)
    }

    fn ensure_friendly(&self, coord: Coord, owner: PlayerId) -> Result<()> {
        if TileEventSystem::is_contested(&self.spatial, &self.castles, coord, owner) {
            Err(EngineError::HostileTile(coord))
        } else {
            Ok(())
        }
    }

    /// Rebuild a state from its parts. The spatial index is rebuilt by
    /// re-tracking every army.
    ///
    /// Everything a save could get wrong is checked here: the configuration,
    /// tiles and destinations against the map, duplicate identifiers, fog
    /// grids of another extent, and hostile factions sharing a tile.
    pub(crate) fn from_parts(
        config: EngineConfig,
        map: Map,
        tick: u64,
        castles: Vec<Castle>,
        armies: Vec<Army>,
        visibility: VisibilityField,
    ) -> Result<Self> {
        config.validate()?;
        if !visibility.covers(&map) {
            return Err(EngineError::InvalidSave(format!(
                "fog grids do not cover the {}x{} map",
                map.width(),
                map.height()
            )));
        }
        if visibility.vision_range() != config.vision_range
            || visibility.castle_bonus() != config.castle_vision_bonus
        {
            return Err(EngineError::InvalidSave(
                "fog vision ranges differ from the configuration".to_string(),
            ));
        }

        let mut state = Self::new(map, config);
        state.tick = tick;
        for castle in castles {
            state.ensure_in_bounds(castle.coord)?;
            if state.castle(castle.id).is_some() {
                return Err(EngineError::InvalidSave(format!("castle {} appears twice", castle.id)));
            }
            state.spatial.place_castle(castle.id, castle.coord)?;
            state.castles.push(castle);
        }

        let tile_size = config.tile_size;
        for army in armies {
            if army.units == 0 {
                return Err(EngineError::EmptyArmy);
            }
            if state.armies.contains_key(&army.id) {
                return Err(EngineError::InvalidSave(format!("army {} appears twice", army.id)));
            }
            if !army.position.x.is_finite() || !army.position.y.is_finite() {
                return Err(EngineError::InvalidSave(format!("army {} has no position", army.id)));
            }
            match army.motion {
                Motion::Settled { coord } | Motion::Engaged { coord } => state.ensure_in_bounds(coord)?,
                Motion::Marching { destination } => state.ensure_in_bounds(destination)?,
            }
            let tile = match army.motion {
                Motion::Settled { coord } => coord,
                Motion::Marching { .. } | Motion::Engaged { .. } => army.position.tile(tile_size),
            };
            state.ensure_in_bounds(tile)?;
            state.ensure_friendly(tile, army.owner)?;

            if army.is_settled() {
                state.spatial.settle_unit(&army, tile);
            } else {
                state.spatial.track_unit(&army);
            }
            state.armies.insert(army.id, army);
        }
        state.visibility = visibility;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Capabilities;
    use crate::game::CombatKind;

    fn config() -> EngineConfig {
        EngineConfig {
            capabilities: Capabilities {
                fog_of_war: true,
                production: false,
                invariant_checks: true,
            },
            ..EngineConfig::default()
        }
    }

    fn create_test_game() -> GameState {
        GameState::new(Map::new(10, 10).unwrap(), config())
    }

    /// Run frames until nothing is marching or `limit` frames pass.
    fn run_until_idle(game: &mut GameState, limit: usize) -> Vec<FrameReport> {
        let mut reports = Vec::new();
        for _ in 0..limit {
            reports.push(game.update(0.25));
            if game.armies().values().all(|army| army.destination().is_none()) {
                break;
            }
        }
        reports
    }

    #[test]
    fn test_dispatch_reduces_garrison() {
        let mut game = create_test_game();
        let castle = game.add_castle(Coord::new(1, 1), 1, 20).unwrap();
        let unit = game.dispatch(castle, 8, Coord::new(5, 1)).unwrap();

        assert_eq!(game.castle(castle).unwrap().units, 12);
        assert_eq!(game.army(unit).unwrap().units, 8);
        assert_eq!(game.spatial().tile_of(unit), Some(Coord::new(1, 1)));
    }

    #[test]
    fn test_dispatch_validation() {
        let mut game = create_test_game();
        let castle = game.add_castle(Coord::new(1, 1), 1, 5).unwrap();
        assert!(matches!(
            game.dispatch(castle, 6, Coord::new(2, 2)),
            Err(EngineError::NotEnoughUnits { available: 5, .. })
        ));
        assert!(matches!(game.dispatch(castle, 0, Coord::new(2, 2)), Err(EngineError::EmptyArmy)));
        assert!(matches!(
            game.dispatch(castle, 1, Coord::new(20, 2)),
            Err(EngineError::OutOfBounds(_))
        ));
        assert!(matches!(
            game.dispatch(CastleId(9), 1, Coord::new(2, 2)),
            Err(EngineError::UnknownCastle(_))
        ));
    }

    #[test]
    fn test_castle_on_castle_rejected() {
        let mut game = create_test_game();
        game.add_castle(Coord::new(1, 1), 1, 5).unwrap();
        assert!(matches!(
            game.add_castle(Coord::new(1, 1), 2, 5),
            Err(EngineError::TileOccupied(_))
        ));
    }

    #[test]
    fn test_march_to_empty_tile_settles() {
        let mut game = create_test_game();
        let castle = game.add_castle(Coord::new(1, 1), 1, 20).unwrap();
        let unit = game.dispatch(castle, 8, Coord::new(4, 1)).unwrap();

        let reports = run_until_idle(&mut game, 100);
        assert!(reports.iter().all(|r| r.situations.is_empty()));
        let arrivals: Vec<_> = reports.iter().flat_map(|r| r.arrivals.clone()).collect();
        assert_eq!(
            arrivals,
            vec![Arrival::Settled {
                unit,
                coord: Coord::new(4, 1)
            }]
        );
        assert!(game.spatial().is_settled(unit));
    }

    #[test]
    fn test_march_into_friendly_castle_reinforces() {
        let mut game = create_test_game();
        let home = game.add_castle(Coord::new(1, 1), 1, 20).unwrap();
        let outpost = game.add_castle(Coord::new(4, 1), 1, 3).unwrap();
        let unit = game.dispatch(home, 8, Coord::new(4, 1)).unwrap();

        run_until_idle(&mut game, 100);
        assert!(game.army(unit).is_none());
        assert_eq!(game.castle(outpost).unwrap().units, 11);
        assert!(game.spatial().is_empty());
    }

    #[test]
    fn test_march_into_friendly_army_merges() {
        let mut game = create_test_game();
        let camp = game.spawn_settled(1, 4, Coord::new(5, 5)).unwrap();
        let unit = game.spawn_marching(1, 6, Coord::new(2, 5), Coord::new(5, 5)).unwrap();

        run_until_idle(&mut game, 100);
        assert!(game.army(unit).is_none());
        assert_eq!(game.army(camp).unwrap().units, 10);
    }

    #[test]
    fn test_capture_enemy_castle() {
        let mut game = create_test_game();
        let home = game.add_castle(Coord::new(1, 1), 1, 30).unwrap();
        let target = game.add_castle(Coord::new(6, 1), 2, 10).unwrap();
        game.dispatch(home, 25, Coord::new(6, 1)).unwrap();

        let reports = run_until_idle(&mut game, 200);
        let situations: Vec<_> = reports.iter().flat_map(|r| r.situations.clone()).collect();
        assert_eq!(situations.len(), 1);
        assert_eq!(situations[0].kind, CombatKind::TileCombat);

        let castle = game.castle(target).unwrap();
        assert_eq!(castle.owner, 1);
        assert_eq!(castle.units, 15);
        assert!(game.armies().is_empty());
    }

    #[test]
    fn test_blocked_march_stops_at_first_enemy() {
        let mut game = create_test_game();
        let blocker = game.spawn_settled(2, 50, Coord::new(3, 0)).unwrap();
        game.spawn_marching(1, 5, Coord::new(0, 0), Coord::new(9, 0)).unwrap();

        let reports = run_until_idle(&mut game, 200);
        let situations: Vec<_> = reports.iter().flat_map(|r| r.situations.clone()).collect();
        assert_eq!(situations.len(), 1);
        assert_eq!(situations[0].coord, Coord::new(3, 0));
        assert_eq!(game.army(blocker).unwrap().units, 45);
        assert_eq!(game.armies().len(), 1);
    }

    #[test]
    fn test_winner_settles_on_contested_tile() {
        let mut game = create_test_game();
        game.spawn_settled(2, 5, Coord::new(3, 0)).unwrap();
        let attacker = game.spawn_marching(1, 12, Coord::new(0, 0), Coord::new(9, 0)).unwrap();

        run_until_idle(&mut game, 200);
        let army = game.army(attacker).unwrap();
        assert_eq!(army.units, 7);
        assert_eq!(army.motion, Motion::Settled { coord: Coord::new(3, 0) });
    }

    #[test]
    fn test_production_runs_when_enabled() {
        let mut config = config();
        config.capabilities.production = true;
        config.production_interval = 2;
        let mut game = GameState::new(Map::new(5, 5).unwrap(), config);
        let castle = game.add_castle(Coord::new(0, 0), 1, 0).unwrap();
        let neutral = game.add_castle(Coord::new(4, 4), NEUTRAL, 0).unwrap();

        let produced: u32 = (0..4).map(|_| game.update(0.1).produced).sum();
        assert_eq!(produced, 2);
        assert_eq!(game.castle(castle).unwrap().units, 2);
        assert_eq!(game.castle(neutral).unwrap().units, 0);
    }

    #[test]
    fn test_vision_follows_armies() {
        let mut game = create_test_game();
        game.add_castle(Coord::new(0, 0), 1, 5).unwrap();
        game.spawn_marching(1, 5, Coord::new(0, 9), Coord::new(9, 9)).unwrap();
        game.update(0.0);

        assert_eq!(game.visibility_at(Coord::new(0, 9), 1), Visibility::Visible);
        assert_eq!(game.visibility_at(Coord::new(0, 0), 1), Visibility::Visible);
        assert_eq!(game.visibility_at(Coord::new(9, 0), 1), Visibility::Unexplored);

        run_until_idle(&mut game, 200);
        assert_eq!(game.visibility_at(Coord::new(0, 9), 1), Visibility::Explored);
        assert_eq!(game.visibility_at(Coord::new(9, 9), 1), Visibility::Visible);
    }

    #[test]
    fn test_fog_disabled_reads_visible() {
        let mut config = config();
        config.capabilities.fog_of_war = false;
        let game = GameState::new(Map::new(5, 5).unwrap(), config);
        assert_eq!(game.visibility_at(Coord::new(2, 2), 1), Visibility::Visible);
        assert_eq!(game.visibility_at(Coord::new(9, 9), 1), Visibility::Unexplored);
    }

    #[test]
    fn test_strength_and_players() {
        let mut game = create_test_game();
        game.add_castle(Coord::new(0, 0), 1, 5).unwrap();
        game.add_castle(Coord::new(9, 9), NEUTRAL, 5).unwrap();
        game.spawn_settled(2, 7, Coord::new(5, 5)).unwrap();
        game.spawn_settled(1, 3, Coord::new(1, 0)).unwrap();

        assert_eq!(game.players(), BTreeSet::from([1, 2]));
        assert_eq!(game.strength(1), 8);
        assert_eq!(game.strength(2), 7);
    }

    #[test]
    fn test_settled_spawn_on_enemy_castle_rejected() {
        let mut game = create_test_game();
        game.add_castle(Coord::new(3, 3), 2, 10).unwrap();
        assert!(matches!(
            game.spawn_settled(1, 5, Coord::new(3, 3)),
            Err(EngineError::HostileTile(_))
        ));
        // The owner may garrison its own tile.
        game.spawn_settled(2, 5, Coord::new(3, 3)).unwrap();
        assert_eq!(game.armies().len(), 1);
    }

    #[test]
    fn test_settled_spawn_on_enemy_army_rejected() {
        let mut game = create_test_game();
        game.spawn_settled(1, 4, Coord::new(6, 6)).unwrap();
        assert!(matches!(
            game.spawn_settled(3, 4, Coord::new(6, 6)),
            Err(EngineError::HostileTile(_))
        ));
        assert!(matches!(
            game.add_castle(Coord::new(6, 6), 3, 4),
            Err(EngineError::HostileTile(_))
        ));
        game.spawn_settled(1, 2, Coord::new(6, 6)).unwrap();
        assert!(check_invariants(&game).is_empty());
    }

    #[test]
    fn test_degenerate_tile_size_does_not_hang() {
        let config = EngineConfig {
            tile_size: -32.0,
            ..config()
        };
        let mut game = GameState::new(Map::new(10, 10).unwrap(), config);
        game.spawn_marching(1, 3, Coord::new(1, 1), Coord::new(8, 1)).unwrap();
        game.update(1.0);
        assert_eq!(game.tick(), 1);
    }

    #[test]
    fn test_march_order_unsettles() {
        let mut game = create_test_game();
        let unit = game.spawn_settled(1, 3, Coord::new(1, 1)).unwrap();
        game.march(unit, Coord::new(3, 1)).unwrap();
        assert!(!game.spatial().is_settled(unit));

        run_until_idle(&mut game, 100);
        assert_eq!(game.army(unit).unwrap().motion, Motion::Settled { coord: Coord::new(3, 1) });
        assert!(matches!(game.march(UnitId(99), Coord::new(0, 0)), Err(EngineError::UnknownArmy(_))));
    }
}
