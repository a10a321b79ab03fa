//! Saving and restoring a game.
//!
//! A save holds castles, armies and the fog grids. The spatial index is not
//! stored; restoring re-tracks every army from its position and motion.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::game::{Army, Castle, GameState, Map, VisibilityField};

/// Serializable state of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    /// Engine configuration.
    pub config: EngineConfig,
    /// Frames simulated so far.
    pub tick: u64,
    /// Map extent.
    pub map: Map,
    /// Every castle.
    pub castles: Vec<Castle>,
    /// Every living army in identifier order.
    pub armies: Vec<Army>,
    /// Fog of war grids.
    pub visibility: VisibilityField,
}

impl SaveState {
    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a save from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the save to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a save from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

impl GameState {
    /// Capture the current state.
    #[must_use]
    pub fn snapshot(&self) -> SaveState {
        SaveState {
            config: *self.config(),
            tick: self.tick(),
            map: *self.map(),
            castles: self.castles().to_vec(),
            armies: self.armies().values().copied().collect(),
            visibility: self.visibility().clone(),
        }
    }

    /// Rebuild a game from a save.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range, a castle or
    /// army lies off the map, two castles share a tile, an identifier
    /// repeats, an army is empty, the fog grids do not match the map, or
    /// hostile factions share a tile.
    pub fn restore(save: SaveState) -> Result<Self> {
        Self::from_parts(
            save.config,
            save.map,
            save.tick,
            save.castles,
            save.armies,
            save.visibility,
        )
    }
}
