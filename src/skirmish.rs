//! Deterministic random skirmish generation.
//!
//! Produces a [`Scenario`] from a seed: capitals spread around the map
//! center, extra and neutral castles scattered over the grid, field armies,
//! and a script of dispatch and march orders. Used by the soak runner,
//! benchmarks and fuzzing.

use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::game::Coord;
use crate::scenario::{ArmySpec, CastleSpec, Order, OrderKind, Scenario};

/// Simple xorshift64 PRNG for deterministic generation.
#[derive(Debug, Clone, Copy)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Create a new RNG with the given seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        // Ensure non-zero state
        let state = if seed == 0 { 0x5555_5555_5555_5555 } else { seed };
        Self { state }
    }

    /// Generate next random u64.
    pub const fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Generate random u32 in [0, max).
    #[allow(clippy::cast_possible_truncation)]
    pub const fn next_u32(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % max as u64) as u32
    }

    /// Generate random f64 in [0, 1).
    #[allow(clippy::cast_precision_loss)]
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }

    /// Pick a random tile of a `width` x `height` grid.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub const fn next_coord(&mut self, width: i32, height: i32) -> Coord {
        let x = self.next_u32(width as u32) as i32;
        let y = self.next_u32(height as u32) as i32;
        Coord::new(x, y)
    }
}

/// Error type for skirmish generation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Skirmish generation error: {reason}")]
pub struct SkirmishError {
    /// Description of the error.
    pub reason: String,
}

/// Shape of a generated skirmish.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkirmishParams {
    /// Map width in tiles.
    pub width: i32,
    /// Map height in tiles.
    pub height: i32,
    /// Number of factions (2-8).
    pub players: u8,
    /// Castles per faction, capital included.
    pub castles_per_player: u32,
    /// Unowned castles.
    pub neutral_castles: u32,
    /// Field armies per faction.
    pub armies_per_player: u32,
    /// Scripted orders.
    pub orders: u32,
    /// Frames to simulate.
    pub frames: u32,
    /// Engine configuration.
    pub config: EngineConfig,
}

impl Default for SkirmishParams {
    fn default() -> Self {
        Self {
            width: 24,
            height: 24,
            players: 2,
            castles_per_player: 2,
            neutral_castles: 4,
            armies_per_player: 3,
            orders: 40,
            frames: 900,
            config: EngineConfig::default(),
        }
    }
}

/// Generate a skirmish scenario.
///
/// # Errors
///
/// Returns an error if the player count is outside 2-8, the map is empty or
/// there are not enough tiles for everything that has to be placed.
pub fn generate(seed: u64, params: &SkirmishParams) -> Result<Scenario, SkirmishError> {
    if params.players < 2 {
        return Err(SkirmishError {
            reason: format!("Need at least 2 players, got {}", params.players),
        });
    }
    if params.players > 8 {
        return Err(SkirmishError {
            reason: format!("Maximum 8 players, got {}", params.players),
        });
    }
    if params.width <= 0 || params.height <= 0 {
        return Err(SkirmishError {
            reason: "Invalid map dimensions (must be > 0)".to_string(),
        });
    }

    let per_player =
        u64::from(params.castles_per_player.max(1)) + u64::from(params.armies_per_player);
    let needed = u64::from(params.players) * per_player + u64::from(params.neutral_castles);
    #[allow(clippy::cast_sign_loss)]
    let area = params.width as u64 * params.height as u64;
    if needed > area {
        return Err(SkirmishError {
            reason: format!("Not enough tiles: need {needed}, have {area}"),
        });
    }

    let mut rng = Rng::new(seed);
    let mut taken = BTreeSet::new();

    let capitals = place_capitals(params, &mut rng, &mut taken);
    let mut castles: Vec<CastleSpec> = capitals
        .iter()
        .zip(1..=params.players)
        .map(|(&at, owner)| CastleSpec {
            at,
            owner,
            units: 20 + rng.next_u32(20),
        })
        .collect();

    for owner in 1..=params.players {
        for _ in 1..params.castles_per_player {
            let at = free_tile(params, &mut rng, &mut taken);
            castles.push(CastleSpec {
                at,
                owner,
                units: 5 + rng.next_u32(15),
            });
        }
    }
    for _ in 0..params.neutral_castles {
        let at = free_tile(params, &mut rng, &mut taken);
        castles.push(CastleSpec {
            at,
            owner: 0,
            units: rng.next_u32(12),
        });
    }

    let mut armies = Vec::new();
    for owner in 1..=params.players {
        for _ in 0..params.armies_per_player {
            let at = free_tile(params, &mut rng, &mut taken);
            let destination = (rng.next_u32(2) == 0)
                .then(|| rng.next_coord(params.width, params.height));
            armies.push(ArmySpec {
                at,
                owner,
                units: 1 + rng.next_u32(15),
                destination,
            });
        }
    }

    let orders = script_orders(params, &castles, &armies, &mut rng);

    Ok(Scenario {
        name: format!("skirmish-{seed}"),
        width: params.width,
        height: params.height,
        config: params.config,
        castles,
        armies,
        orders,
        frames: params.frames,
        dt: 1.0 / 30.0,
    })
}

/// Capitals spread evenly around the map center.
fn place_capitals(params: &SkirmishParams, rng: &mut Rng, taken: &mut BTreeSet<Coord>) -> Vec<Coord> {
    let center_x = f64::from(params.width) / 2.0;
    let center_y = f64::from(params.height) / 2.0;
    let radius = f64::from(params.width.min(params.height)) * 0.35;

    let angle_step = std::f64::consts::TAU / f64::from(params.players);
    let angle_offset = rng.next_f64() * std::f64::consts::TAU;

    let mut capitals = Vec::with_capacity(usize::from(params.players));
    for i in 0..params.players {
        let angle = angle_offset + f64::from(i) * angle_step;
        let target_x = center_x + radius * angle.cos();
        let target_y = center_y + radius * angle.sin();

        // Nearest free tile to the target
        let best = (0..params.height)
            .flat_map(|y| (0..params.width).map(move |x| Coord::new(x, y)))
            .filter(|coord| !taken.contains(coord))
            .min_by_key(|coord| {
                let dx = f64::from(coord.x) - target_x;
                let dy = f64::from(coord.y) - target_y;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    ((dx * dx + dy * dy) * 1000.0) as u64
                }
            });
        if let Some(coord) = best {
            taken.insert(coord);
            capitals.push(coord);
        }
    }
    capitals
}

/// A random tile nobody has claimed yet.
///
/// Falls back to a row-major scan once random probing keeps colliding.
fn free_tile(params: &SkirmishParams, rng: &mut Rng, taken: &mut BTreeSet<Coord>) -> Coord {
    for _ in 0..32 {
        let coord = rng.next_coord(params.width, params.height);
        if taken.insert(coord) {
            return coord;
        }
    }
    let coord = (0..params.height)
        .flat_map(|y| (0..params.width).map(move |x| Coord::new(x, y)))
        .find(|coord| !taken.contains(coord))
        .unwrap_or(Coord::new(0, 0));
    taken.insert(coord);
    coord
}

fn script_orders(
    params: &SkirmishParams,
    castles: &[CastleSpec],
    armies: &[ArmySpec],
    rng: &mut Rng,
) -> Vec<Order> {
    let owned: Vec<usize> = castles
        .iter()
        .enumerate()
        .filter(|(_, castle)| castle.owner != 0)
        .map(|(index, _)| index)
        .collect();
    let pick = |rng: &mut Rng, len: usize| {
        usize::try_from(rng.next_u32(u32::try_from(len).unwrap_or(u32::MAX))).unwrap_or(0)
    };

    let mut orders = Vec::new();
    for _ in 0..params.orders {
        let frame = rng.next_u32(params.frames.max(1));
        let kind = if armies.is_empty() || rng.next_u32(4) != 0 {
            let Some(&castle) = owned.get(pick(rng, owned.len())) else {
                continue;
            };
            // Mostly castles.
            let destination = if rng.next_u32(3) == 0 {
                rng.next_coord(params.width, params.height)
            } else {
                castles[pick(rng, castles.len())].at
            };
            OrderKind::Dispatch {
                castle,
                units: 1 + rng.next_u32(10),
                destination,
            }
        } else {
            OrderKind::March {
                army: pick(rng, armies.len()),
                destination: rng.next_coord(params.width, params.height),
            }
        };
        orders.push(Order { frame, kind });
    }
    orders
}
