//! Scenario files.
//!
//! A scenario is a JSON description of a starting position plus a script of
//! timed orders. Castles and armies in orders are referenced by their index
//! in the scenario's lists.
//!
//! ```json
//! {
//!   "name": "duel",
//!   "width": 10,
//!   "height": 10,
//!   "castles": [{ "at": { "x": 1, "y": 1 }, "owner": 1, "units": 30 }],
//!   "armies": [{ "at": { "x": 8, "y": 8 }, "owner": 2, "units": 5 }],
//!   "orders": [
//!     { "frame": 0, "order": "dispatch", "castle": 0, "units": 20, "destination": { "x": 8, "y": 8 } }
//!   ],
//!   "frames": 600
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::game::{CastleId, Coord, FrameReport, GameState, Map, PlayerId, UnitId};

fn default_frames() -> u32 {
    600
}

fn default_dt() -> f32 {
    1.0 / 60.0
}

/// A castle in the starting position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastleSpec {
    /// Tile the castle stands on.
    pub at: Coord,
    /// Owning faction, 0 for neutral.
    pub owner: PlayerId,
    /// Starting garrison.
    pub units: u32,
}

/// An army in the starting position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmySpec {
    /// Starting tile.
    pub at: Coord,
    /// Owning faction.
    pub owner: PlayerId,
    /// Number of units.
    pub units: u32,
    /// Marching target. Armies without one start settled.
    #[serde(default)]
    pub destination: Option<Coord>,
}

/// A scripted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "order", rename_all = "snake_case")]
pub enum OrderKind {
    /// Send units out of a castle.
    Dispatch {
        /// Index into the scenario's castles.
        castle: usize,
        /// Units to send.
        units: u32,
        /// Target tile.
        destination: Coord,
    },
    /// Redirect a starting army.
    March {
        /// Index into the scenario's armies.
        army: usize,
        /// Target tile.
        destination: Coord,
    },
}

/// A command issued before a given frame is simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Frames simulated before the order is issued.
    pub frame: u32,
    /// The command.
    #[serde(flatten)]
    pub kind: OrderKind,
}

/// A starting position and order script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Map width in tiles.
    pub width: i32,
    /// Map height in tiles.
    pub height: i32,
    /// Engine configuration.
    #[serde(default)]
    pub config: EngineConfig,
    /// Starting castles.
    #[serde(default)]
    pub castles: Vec<CastleSpec>,
    /// Starting armies.
    #[serde(default)]
    pub armies: Vec<ArmySpec>,
    /// Scripted orders.
    #[serde(default)]
    pub orders: Vec<Order>,
    /// Frames to simulate.
    #[serde(default = "default_frames")]
    pub frames: u32,
    /// Seconds per frame.
    #[serde(default = "default_dt")]
    pub dt: f32,
}

impl Scenario {
    /// Parse a scenario from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Build the starting position.
    ///
    /// # Errors
    ///
    /// Returns an error if the map size is invalid, something is placed off
    /// the map, two castles share a tile or an army is empty.
    pub fn start(&self) -> Result<ScenarioRun> {
        self.config.validate()?;
        let map = Map::new(self.width, self.height)?;
        let mut state = GameState::new(map, self.config);

        let castles = self
            .castles
            .iter()
            .map(|spec| state.add_castle(spec.at, spec.owner, spec.units))
            .collect::<Result<Vec<_>>>()?;
        let armies = self
            .armies
            .iter()
            .map(|spec| match spec.destination {
                Some(destination) => state.spawn_marching(spec.owner, spec.units, spec.at, destination),
                None => state.spawn_settled(spec.owner, spec.units, spec.at),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut orders = self.orders.clone();
        orders.sort_by_key(|order| order.frame);

        if state.config().capabilities.fog_of_war {
            state.refresh_visibility();
        }
        info!(
            name = %self.name,
            castles = castles.len(),
            armies = armies.len(),
            orders = orders.len(),
            "scenario started"
        );

        Ok(ScenarioRun {
            state,
            castles,
            armies,
            orders,
            next_order: 0,
            frames: self.frames,
            dt: self.dt,
            rejected: 0,
        })
    }
}

/// A scenario in progress.
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    state: GameState,
    castles: Vec<CastleId>,
    armies: Vec<UnitId>,
    orders: Vec<Order>,
    next_order: usize,
    frames: u32,
    dt: f32,
    rejected: usize,
}

impl ScenarioRun {
    /// Current game state.
    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    /// Consume the run, keeping the game state.
    #[must_use]
    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Orders the engine refused so far.
    #[must_use]
    pub const fn rejected(&self) -> usize {
        self.rejected
    }

    /// Whether every scripted frame has been simulated.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.tick() >= u64::from(self.frames)
    }

    /// Issue due orders, then simulate one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if an order refers to a castle or army the scenario
    /// never defines. Orders the engine refuses are logged and skipped.
    pub fn step(&mut self) -> Result<FrameReport> {
        let tick = self.state.tick();
        while let Some(order) = self.orders.get(self.next_order).copied() {
            if u64::from(order.frame) > tick {
                break;
            }
            self.next_order += 1;
            self.issue(order)?;
        }
        Ok(self.state.update(self.dt))
    }

    /// Simulate every remaining frame, handing each report to `observe`.
    ///
    /// # Errors
    ///
    /// Returns an error if an order refers to an undefined castle or army.
    pub fn run(&mut self, mut observe: impl FnMut(&FrameReport)) -> Result<()> {
        while !self.is_finished() {
            let report = self.step()?;
            observe(&report);
        }
        Ok(())
    }

    fn issue(&mut self, order: Order) -> Result<()> {
        debug!(frame = order.frame, kind = ?order.kind, "issuing order");
        let outcome = match order.kind {
            OrderKind::Dispatch {
                castle,
                units,
                destination,
            } => {
                let id = *self.castles.get(castle).ok_or_else(|| {
                    EngineError::InvalidScenario(format!("order references castle #{castle}"))
                })?;
                self.state.dispatch(id, units, destination).map(|_| ())
            }
            OrderKind::March { army, destination } => {
                let id = *self.armies.get(army).ok_or_else(|| {
                    EngineError::InvalidScenario(format!("order references army #{army}"))
                })?;
                self.state.march(id, destination)
            }
        };
        if let Err(err) = outcome {
            warn!(frame = order.frame, %err, "order rejected");
            self.rejected += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUEL: &str = r#"{
        "name": "duel",
        "width": 10,
        "height": 10,
        "castles": [
            { "at": { "x": 1, "y": 1 }, "owner": 1, "units": 30 },
            { "at": { "x": 8, "y": 1 }, "owner": 2, "units": 10 }
        ],
        "armies": [{ "at": { "x": 4, "y": 8 }, "owner": 2, "units": 5 }],
        "orders": [
            { "frame": 0, "order": "dispatch", "castle": 0, "units": 25, "destination": { "x": 8, "y": 1 } }
        ],
        "frames": 400,
        "dt": 0.05
    }"#;

    #[test]
    fn test_parse_defaults() {
        let scenario = Scenario::from_json(r#"{ "width": 4, "height": 3 }"#).unwrap();
        assert_eq!(scenario.frames, 600);
        assert!(scenario.castles.is_empty());
        assert_eq!(scenario.config, EngineConfig::default());
    }

    #[test]
    fn test_duel_captures_castle() {
        let scenario = Scenario::from_json(DUEL).unwrap();
        let mut run = scenario.start().unwrap();
        let mut battles = 0;
        run.run(|report| battles += report.outcomes.len()).unwrap();

        assert!(run.is_finished());
        assert_eq!(battles, 1);
        let state = run.state();
        let castle = state.castle_at(Coord::new(8, 1)).unwrap();
        assert_eq!(castle.owner, 1);
        assert!(castle.units > 0);
    }

    #[test]
    fn test_order_with_unknown_castle() {
        let mut scenario = Scenario::from_json(DUEL).unwrap();
        scenario.orders[0].kind = OrderKind::Dispatch {
            castle: 7,
            units: 1,
            destination: Coord::new(0, 0),
        };
        let mut run = scenario.start().unwrap();
        assert!(matches!(run.step(), Err(EngineError::InvalidScenario(_))));
    }

    #[test]
    fn test_refused_order_is_skipped() {
        let mut scenario = Scenario::from_json(DUEL).unwrap();
        scenario.orders[0].kind = OrderKind::Dispatch {
            castle: 0,
            units: 31,
            destination: Coord::new(8, 1),
        };
        let mut run = scenario.start().unwrap();
        run.run(|_| {}).unwrap();
        assert_eq!(run.rejected(), 1);
        assert!(run.state().castle_at(Coord::new(1, 1)).unwrap().units >= 30);
    }

    #[test]
    fn test_march_order() {
        let mut scenario = Scenario::from_json(DUEL).unwrap();
        scenario.orders = vec![Order {
            frame: 3,
            kind: OrderKind::March {
                army: 0,
                destination: Coord::new(4, 5),
            },
        }];
        let mut run = scenario.start().unwrap();
        run.run(|_| {}).unwrap();
        let army = run.state().armies().values().next().unwrap();
        assert_eq!(army.position.tile(32.0), Coord::new(4, 5));
    }

    #[test]
    fn test_json_round_trip_file() {
        let scenario = Scenario::from_json(DUEL).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duel.json");
        std::fs::write(&path, scenario.to_json().unwrap()).unwrap();
        assert_eq!(Scenario::load(&path).unwrap(), scenario);
    }

    #[test]
    fn test_castle_off_map_rejected() {
        let mut scenario = Scenario::from_json(DUEL).unwrap();
        scenario.castles[0].at = Coord::new(12, 0);
        assert!(matches!(scenario.start(), Err(EngineError::OutOfBounds(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut scenario = Scenario::from_json(DUEL).unwrap();
        scenario.config.tile_size = -32.0;
        assert!(matches!(scenario.start(), Err(EngineError::InvalidConfig(_))));

        let mut scenario = Scenario::from_json(DUEL).unwrap();
        scenario.config.march_speed = f32::NAN;
        assert!(matches!(scenario.start(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_settled_army_on_enemy_castle_rejected() {
        let mut scenario = Scenario::from_json(DUEL).unwrap();
        let enemy = scenario.castles[1];
        scenario.armies.push(ArmySpec {
            owner: scenario.castles[0].owner,
            units: 3,
            at: enemy.at,
            destination: None,
        });
        assert!(matches!(scenario.start(), Err(EngineError::HostileTile(_))));
    }
}
