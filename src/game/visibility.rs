//! Fog of war.
//!
//! Each player has a grid of three-state visibility values. Writes only ever
//! raise a tile; the one exception is the vision reset, which demotes
//! `Visible` back to `Explored` before vision sources are reapplied. Nothing
//! ever returns a tile to `Unexplored`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::game::{Army, Castle, Coord, Map, PlayerId};

/// Visibility of one tile for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Visibility {
    /// Never seen.
    #[default]
    Unexplored = 0,
    /// Seen before, not currently observed.
    Explored = 1,
    /// Currently observed.
    Visible = 2,
}

impl Visibility {
    /// Fog opacity the renderer should draw over a tile at this level.
    #[must_use]
    pub const fn fog_alpha(self) -> f32 {
        match self {
            Visibility::Unexplored => 1.0,
            Visibility::Explored => 0.5,
            Visibility::Visible => 0.0,
        }
    }
}

impl From<Visibility> for u8 {
    fn from(level: Visibility) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for Visibility {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Visibility::Unexplored),
            1 => Ok(Visibility::Explored),
            2 => Ok(Visibility::Visible),
            other => Err(format!("invalid visibility level {other}")),
        }
    }
}

/// Per-player visibility grids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityField {
    /// Map extent the grids cover.
    map: Map,
    /// Row-major grid per player, created on first write.
    grids: BTreeMap<PlayerId, Vec<Visibility>>,
    /// Player whose view the renderer shows.
    current_player: PlayerId,
    /// Default vision radius in tiles.
    vision_range: u32,
    /// Extra radius granted by castles.
    castle_bonus: u32,
}

impl VisibilityField {
    /// Create a field where every player starts unexplored.
    #[must_use]
    pub fn new(map: Map, vision_range: u32, castle_bonus: u32) -> Self {
        Self {
            map,
            grids: BTreeMap::new(),
            current_player: 1,
            vision_range,
            castle_bonus,
        }
    }

    /// Player whose view is being rendered.
    #[must_use]
    pub const fn current_player(&self) -> PlayerId {
        self.current_player
    }

    /// Switch the rendered view.
    pub fn set_current_player(&mut self, player: PlayerId) {
        self.current_player = player;
    }

    /// Default vision radius.
    #[must_use]
    pub const fn vision_range(&self) -> u32 {
        self.vision_range
    }

    /// Extra radius granted by castles.
    #[must_use]
    pub const fn castle_bonus(&self) -> u32 {
        self.castle_bonus
    }

    /// Map extent the grids cover.
    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    /// Whether the field covers `map` with one full grid per player.
    #[must_use]
    pub fn covers(&self, map: &Map) -> bool {
        self.map == *map && self.grids.values().all(|grid| grid.len() == map.area())
    }

    /// Players that have a grid.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.grids.keys().copied()
    }

    /// Visibility of `coord` for `player`. Out of bounds reads are unexplored.
    #[must_use]
    pub fn get(&self, coord: Coord, player: PlayerId) -> Visibility {
        match (self.map.index(coord), self.grids.get(&player)) {
            (Some(idx), Some(grid)) => grid.get(idx).copied().unwrap_or_default(),
            _ => Visibility::Unexplored,
        }
    }

    /// Fog opacity for `coord` as seen by `player`.
    #[must_use]
    pub fn fog_alpha(&self, coord: Coord, player: PlayerId) -> f32 {
        self.get(coord, player).fog_alpha()
    }

    /// Raise `coord` to `level` if that is higher than what is stored.
    pub fn set_tile_visibility(&mut self, coord: Coord, level: Visibility, player: PlayerId) {
        let Some(idx) = self.map.index(coord) else {
            return;
        };
        if let Some(cell) = self.grid_mut(player).get_mut(idx) {
            if level > *cell {
                *cell = level;
            }
        }
    }

    /// Mark every tile within `range` of `center` as explored.
    pub fn explore_area(&mut self, center: Coord, range: u32, player: PlayerId) {
        self.raise_area(center, range, Visibility::Explored, player);
    }

    /// Replace the player's live vision with the disk around `center`.
    pub fn set_vision_area(&mut self, center: Coord, range: u32, player: PlayerId) {
        self.reset_vision(player);
        self.raise_area(center, range, Visibility::Visible, player);
    }

    /// Recompute vision from the castles `player` owns.
    pub fn update_vision_from_castles(&mut self, castles: &[Castle], player: PlayerId) {
        self.reset_vision(player);
        self.apply_castles(castles, player);
    }

    /// Recompute vision from the armies `player` owns.
    ///
    /// The reset happens once for the whole call; each army only raises.
    pub fn update_vision_from_units<'a>(
        &mut self,
        armies: impl IntoIterator<Item = &'a Army>,
        tile_size: f32,
        player: PlayerId,
    ) {
        self.reset_vision(player);
        self.apply_units(armies, tile_size, player);
    }

    /// Recompute vision from both castles and armies with a single reset.
    pub fn refresh<'a>(
        &mut self,
        castles: &[Castle],
        armies: impl IntoIterator<Item = &'a Army>,
        tile_size: f32,
        player: PlayerId,
    ) {
        self.reset_vision(player);
        self.apply_castles(castles, player);
        self.apply_units(armies, tile_size, player);
    }

    /// Demote every visible tile of `player` to explored.
    pub fn reset_vision(&mut self, player: PlayerId) {
        for cell in self.grid_mut(player) {
            if *cell == Visibility::Visible {
                *cell = Visibility::Explored;
            }
        }
    }

    /// Count of tiles at each level for `player`: unexplored, explored, visible.
    #[must_use]
    pub fn summary(&self, player: PlayerId) -> [usize; 3] {
        let mut counts = [0usize; 3];
        match self.grids.get(&player) {
            Some(grid) => {
                for cell in grid {
                    counts[*cell as usize] += 1;
                }
            }
            None => counts[0] = self.map.area(),
        }
        counts
    }

    /// Serialize the whole field to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore a field produced by [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or holds invalid levels.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn apply_castles(&mut self, castles: &[Castle], player: PlayerId) {
        let range = self.vision_range.saturating_add(self.castle_bonus);
        for castle in castles.iter().filter(|castle| castle.owner == player) {
            self.raise_area(castle.coord, range, Visibility::Visible, player);
        }
    }

    fn apply_units<'a>(
        &mut self,
        armies: impl IntoIterator<Item = &'a Army>,
        tile_size: f32,
        player: PlayerId,
    ) {
        let default = self.vision_range;
        for army in armies.into_iter().filter(|army| army.owner == player) {
            let center = army.position.tile(tile_size);
            self.raise_area(center, army.vision(default), Visibility::Visible, player);
        }
    }

    fn raise_area(&mut self, center: Coord, range: u32, level: Visibility, player: PlayerId) {
        for coord in self.map.disk(center, range) {
            self.set_tile_visibility(coord, level, player);
        }
    }

    fn grid_mut(&mut self, player: PlayerId) -> &mut Vec<Visibility> {
        let area = self.map.area();
        self.grids
            .entry(player)
            .or_insert_with(|| vec![Visibility::Unexplored; area])
    }
}
