//! Engine configuration.
//!
//! Everything here is resolved once when a [`GameState`](crate::GameState)
//! is built. Optional subsystems are switched through [`Capabilities`]
//! rather than probed at runtime.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Largest vision radius or castle bonus accepted, in tiles.
pub const MAX_VISION_RANGE: u32 = 1_024;

/// Optional subsystems, fixed for the lifetime of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Maintain per-player visibility grids. When off every tile reads as visible.
    pub fog_of_war: bool,
    /// Run the castle production cadence.
    pub production: bool,
    /// Check engine invariants after every frame and log violations.
    pub invariant_checks: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            fog_of_war: true,
            production: true,
            invariant_checks: cfg!(debug_assertions),
        }
    }
}

/// Tunables for the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Edge length of a tile in pixels.
    pub tile_size: f32,
    /// Marching speed in pixels per second.
    pub march_speed: f32,
    /// Vision radius in tiles for armies without their own range.
    pub vision_range: u32,
    /// Extra vision radius granted by castles.
    pub castle_vision_bonus: u32,
    /// Frames between production cycles.
    pub production_interval: u32,
    /// Units produced per cycle.
    pub production_amount: u32,
    /// Production stops once a garrison reaches this size.
    pub garrison_cap: u32,
    /// Optional subsystems.
    pub capabilities: Capabilities,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: 32.0,
            march_speed: 64.0,
            vision_range: 3,
            castle_vision_bonus: 2,
            production_interval: 60,
            production_amount: 1,
            garrison_cap: 999,
            capabilities: Capabilities::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON or
    /// holds out of range values.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value keeps the frame driver finite.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the tile size is not a
    /// positive finite number, the march speed is negative or not finite, or
    /// a vision radius exceeds [`MAX_VISION_RANGE`].
    pub fn validate(&self) -> Result<()> {
        if !self.tile_size.is_finite() || self.tile_size <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "tile_size must be positive, got {}",
                self.tile_size
            )));
        }
        if !self.march_speed.is_finite() || self.march_speed < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "march_speed must be finite and non-negative, got {}",
                self.march_speed
            )));
        }
        for (name, range) in [
            ("vision_range", self.vision_range),
            ("castle_vision_bonus", self.castle_vision_bonus),
        ] {
            if range > MAX_VISION_RANGE {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be at most {MAX_VISION_RANGE}, got {range}"
                )));
            }
        }
        Ok(())
    }

    /// Vision radius granted by a castle.
    #[must_use]
    pub const fn castle_vision_range(&self) -> u32 {
        self.vision_range.saturating_add(self.castle_vision_bonus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"tile_size": 16.0, "capabilities": {"production": false}}"#)
                .unwrap();
        assert!((config.tile_size - 16.0).abs() < f32::EPSILON);
        assert_eq!(config.vision_range, 3);
        assert!(!config.capabilities.production);
        assert!(config.capabilities.fog_of_war);
    }

    #[test]
    fn test_castle_vision_range() {
        let config = EngineConfig {
            vision_range: 4,
            castle_vision_bonus: 3,
            ..EngineConfig::default()
        };
        assert_eq!(config.castle_vision_range(), 7);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"vision_range": 5}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.vision_range, 5);
        assert_eq!(config.production_interval, 60);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_tile_size_rejected() {
        for tile_size in [-32.0, 0.0, f32::NAN, f32::INFINITY] {
            let config = EngineConfig {
                tile_size,
                ..EngineConfig::default()
            };
            assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_bad_march_speed_rejected() {
        for march_speed in [-1.0, f32::NAN, f32::INFINITY] {
            let config = EngineConfig {
                march_speed,
                ..EngineConfig::default()
            };
            assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
        }
        let halted = EngineConfig {
            march_speed: 0.0,
            ..EngineConfig::default()
        };
        assert!(halted.validate().is_ok());
    }

    #[test]
    fn test_vision_ranges_capped() {
        let config = EngineConfig {
            vision_range: u32::MAX,
            castle_vision_bonus: u32::MAX,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
        assert_eq!(config.castle_vision_range(), u32::MAX);
    }

    #[test]
    fn test_load_rejects_negative_tile_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"tile_size": -32.0}"#).unwrap();

        assert!(matches!(EngineConfig::load(&path), Err(EngineError::InvalidConfig(_))));
    }
}
