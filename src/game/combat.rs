//! Combat resolution.
//!
//! Castle assaults and field battles share one subtraction rule: the larger
//! force wins and loses as many units as the smaller one had. Equal forces
//! destroy each other. A castle that ends a battle at zero keeps its owner
//! and falls to whoever arrives next.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::game::tile_events::find_castle;
use crate::game::{Army, Castle, CastleId, CombatSituation, Coord, PlayerId, UnitId};

/// One side of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Force {
    /// Faction fighting.
    pub faction: PlayerId,
    /// Units committed.
    pub units: u32,
}

impl Force {
    /// Create a new force.
    #[must_use]
    pub const fn new(faction: PlayerId, units: u32) -> Self {
        Self { faction, units }
    }
}

/// Result of one battle between two forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CombatOutcome {
    /// The attacker was larger and takes the tile.
    AttackerWins {
        /// Attacking faction.
        faction: PlayerId,
        /// Units left after the battle.
        survivors: u32,
    },
    /// The defender was larger and keeps the tile.
    DefenderHolds {
        /// Defending faction.
        faction: PlayerId,
        /// Units left after the battle.
        survivors: u32,
    },
    /// Equal forces; nobody survives.
    MutualDestruction,
}

impl CombatOutcome {
    /// The surviving faction, if any.
    #[must_use]
    pub const fn winner(self) -> Option<PlayerId> {
        match self {
            Self::AttackerWins { faction, .. } | Self::DefenderHolds { faction, .. } => {
                Some(faction)
            }
            Self::MutualDestruction => None,
        }
    }

    /// Units left on the winning side.
    #[must_use]
    pub const fn survivors(self) -> u32 {
        match self {
            Self::AttackerWins { survivors, .. } | Self::DefenderHolds { survivors, .. } => {
                survivors
            }
            Self::MutualDestruction => 0,
        }
    }
}

/// Resolve a battle between two forces of different factions.
///
/// Pure function of its inputs; never fails.
#[must_use]
pub const fn resolve(attacker: Force, defender: Force) -> CombatOutcome {
    match compare(attacker.units, defender.units) {
        Ordering::Greater => CombatOutcome::AttackerWins {
            faction: attacker.faction,
            survivors: attacker.units - defender.units,
        },
        Ordering::Less => CombatOutcome::DefenderHolds {
            faction: defender.faction,
            survivors: defender.units - attacker.units,
        },
        Ordering::Equal => CombatOutcome::MutualDestruction,
    }
}

const fn compare(a: u32, b: u32) -> Ordering {
    if a > b {
        Ordering::Greater
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// A single battle fought while resolving a situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Battle {
    /// Where it was fought.
    pub coord: Coord,
    /// The arriving side.
    pub attacker: Force,
    /// The side holding the tile.
    pub defender: Force,
    /// What happened.
    pub outcome: CombatOutcome,
}

/// How a combat situation ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SituationOutcome {
    /// Contested tile.
    pub coord: Coord,
    /// Castle on the tile, if any.
    pub castle: Option<CastleId>,
    /// Who holds the tile afterwards. A castle always has a holder, possibly at zero units.
    pub holder: Option<Force>,
    /// Army carrying the surviving units when there is no castle.
    pub survivor: Option<UnitId>,
    /// Armies removed from the game: destroyed, or absorbed into the castle garrison.
    pub removed: Vec<UnitId>,
    /// Battles in the order they were fought.
    pub battles: Vec<Battle>,
}

/// Units a faction brings to a tile, with the armies they came from.
#[derive(Debug)]
struct Contingent {
    faction: PlayerId,
    units: u32,
    armies: Vec<UnitId>,
}

/// Resolve every battle in `situation`.
///
/// Same-faction armies merge into one contingent before any fighting. The
/// first contingent holds the tile: the castle owner, otherwise the faction
/// of the settled armies, otherwise the earliest arrival. Every other
/// contingent then attacks the current holder in arrival order.
#[must_use]
pub fn resolve_situation(
    situation: &CombatSituation,
    castles: &[Castle],
    roster: &BTreeMap<UnitId, Army>,
) -> SituationOutcome {
    let castle = situation.castle.and_then(|id| find_castle(castles, id));
    let mut contingents: Vec<Contingent> = Vec::new();

    if let Some(castle) = castle {
        contingents.push(Contingent {
            faction: castle.owner,
            units: castle.units,
            armies: Vec::new(),
        });
    }
    for id in situation.settled.iter().chain(&situation.moving) {
        let Some(army) = roster.get(id) else {
            continue;
        };
        match contingents.iter_mut().find(|c| c.faction == army.owner) {
            Some(contingent) => {
                contingent.units = contingent.units.saturating_add(army.units);
                contingent.armies.push(army.id);
            }
            None => contingents.push(Contingent {
                faction: army.owner,
                units: army.units,
                armies: vec![army.id],
            }),
        }
    }

    let mut battles = Vec::new();
    let mut holder: Option<Force> = None;
    for contingent in &contingents {
        let attacker = Force::new(contingent.faction, contingent.units);
        let Some(defender) = holder else {
            holder = Some(attacker);
            continue;
        };
        let outcome = resolve(attacker, defender);
        battles.push(Battle {
            coord: situation.coord,
            attacker,
            defender,
            outcome,
        });
        holder = match outcome {
            CombatOutcome::AttackerWins { faction, survivors }
            | CombatOutcome::DefenderHolds { faction, survivors } => {
                Some(Force::new(faction, survivors))
            }
            // A castle keeps its current owner at zero units.
            CombatOutcome::MutualDestruction if castle.is_some() => {
                Some(Force::new(defender.faction, 0))
            }
            CombatOutcome::MutualDestruction => None,
        };
    }

    let all_armies = contingents.iter().flat_map(|c| c.armies.iter().copied());
    let (survivor, removed) = if castle.is_some() {
        (None, all_armies.collect())
    } else {
        let survivor = holder
            .filter(|force| force.units > 0)
            .and_then(|force| contingents.iter().find(|c| c.faction == force.faction))
            .and_then(|c| c.armies.first().copied());
        let removed = all_armies.filter(|id| Some(*id) != survivor).collect();
        (survivor, removed)
    };

    debug!(
        coord = %situation.coord,
        battles = battles.len(),
        holder = ?holder,
        "situation resolved"
    );

    SituationOutcome {
        coord: situation.coord,
        castle: castle.map(|castle| castle.id),
        holder,
        survivor,
        removed,
        battles,
    }
}

/// Kani formal verification proofs.
///
/// Run with: `cargo kani`
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /// The winner never ends with more units than it committed.
    #[kani::proof]
    fn prove_resolve_survivors_bounded() {
        let attacking: u32 = kani::any();
        let defending: u32 = kani::any();

        let outcome = resolve(Force::new(1, attacking), Force::new(2, defending));
        assert!(outcome.survivors() <= attacking.max(defending));
        if attacking == defending {
            assert!(outcome.winner().is_none());
        }
    }

    /// Merging contingents saturates instead of overflowing.
    #[kani::proof]
    fn prove_merge_no_overflow() {
        let current: u32 = kani::any();
        let reinforcement: u32 = kani::any();

        let merged = current.saturating_add(reinforcement);
        assert!(merged >= current || merged == u32::MAX);
    }
}
