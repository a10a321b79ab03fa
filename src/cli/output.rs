//! Output formatting utilities for CLI.

#![allow(clippy::format_push_string, clippy::cast_precision_loss)]

use std::collections::BTreeMap;

use bastion::game::{Arrival, CombatKind, FrameReport};
use bastion::{Coord, GameState, PlayerId};
use serde::Serialize;

/// One resolved combat situation.
#[derive(Debug, Clone, Serialize)]
pub(super) struct BattleEntry {
    /// Frame the battle happened on.
    pub(super) tick: u64,
    /// Contested tile.
    pub(super) coord: Coord,
    /// Situation kind.
    pub(super) kind: CombatKind,
    /// Factions involved.
    pub(super) factions: Vec<PlayerId>,
    /// Faction holding the tile afterwards (null if cleared).
    pub(super) holder: Option<PlayerId>,
    /// Units the holder kept.
    pub(super) survivors: u32,
    /// Whether a castle changed hands.
    pub(super) captured: bool,
}

/// Running totals over a game's frame reports.
#[derive(Debug, Default, Clone)]
pub(super) struct RunLog {
    /// Frames observed.
    pub(super) frames: u64,
    /// Tile events emitted.
    pub(super) events: u64,
    /// Units produced by castles.
    pub(super) produced: u64,
    /// Peaceful arrivals.
    pub(super) arrivals: u64,
    /// Resolved situations in order.
    pub(super) battles: Vec<BattleEntry>,
}

impl RunLog {
    /// Fold one frame into the log.
    pub(super) fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.events += report.events.len() as u64;
        self.produced += u64::from(report.produced);
        self.arrivals += report.arrivals.len() as u64;

        for (situation, outcome) in report.situations.iter().zip(&report.outcomes) {
            // The castle contingent always defends the first battle.
            let captured = outcome.castle.is_some()
                && match (outcome.battles.first(), outcome.holder) {
                    (Some(first), Some(holder)) => first.defender.faction != holder.faction,
                    _ => false,
                };
            self.battles.push(BattleEntry {
                tick: report.tick,
                coord: situation.coord,
                kind: situation.kind,
                factions: situation.factions.iter().copied().collect(),
                holder: outcome.holder.map(|force| force.faction),
                survivors: outcome.holder.map_or(0, |force| force.units),
                captured,
            });
        }
    }

    /// Castles that changed hands.
    pub(super) fn captures(&self) -> u64 {
        self.battles.iter().filter(|b| b.captured).count() as u64
    }
}

/// Whether an arrival joined a castle or army instead of settling.
pub(super) fn is_merge(arrival: &Arrival) -> bool {
    !matches!(arrival, Arrival::Settled { .. })
}

/// Per-player standing at the end of a game.
#[derive(Debug, Serialize)]
pub(super) struct JsonPlayer {
    /// Faction id.
    id: PlayerId,
    /// Castles owned.
    castles: usize,
    /// Armies in the field.
    armies: usize,
    /// Units in castles and armies.
    units: u64,
}

/// Per-player standings, strongest first.
pub(super) fn standings(state: &GameState) -> Vec<JsonPlayer> {
    let mut players: Vec<JsonPlayer> = state
        .players()
        .into_iter()
        .map(|id| JsonPlayer {
            id,
            castles: state.castles().iter().filter(|c| c.owner == id).count(),
            armies: state.armies().values().filter(|a| a.owner == id).count(),
            units: state.strength(id),
        })
        .collect();
    players.sort_by(|a, b| b.units.cmp(&a.units).then(a.id.cmp(&b.id)));
    players
}

/// JSON-serializable run result.
#[derive(Debug, Serialize)]
pub(super) struct JsonRunResult {
    /// Scenario name.
    name: String,
    /// Frames simulated.
    frames: u64,
    /// Tile events emitted.
    events: u64,
    /// Units produced.
    produced: u64,
    /// Peaceful arrivals.
    arrivals: u64,
    /// Orders the engine refused.
    rejected_orders: usize,
    /// Castles that changed hands.
    captures: u64,
    /// Every resolved situation.
    battles: Vec<BattleEntry>,
    /// Final standings.
    players: Vec<JsonPlayer>,
}

impl JsonRunResult {
    /// Create from a finished run.
    pub(super) fn new(name: &str, log: &RunLog, rejected: usize, state: &GameState) -> Self {
        Self {
            name: name.to_string(),
            frames: log.frames,
            events: log.events,
            produced: log.produced,
            arrivals: log.arrivals,
            rejected_orders: rejected,
            captures: log.captures(),
            battles: log.battles.clone(),
            players: standings(state),
        }
    }
}

/// Format a finished run as human-readable text.
pub(super) fn format_run_text(name: &str, log: &RunLog, rejected: usize, state: &GameState) -> String {
    let mut output = String::new();

    output.push_str(&format!("Scenario: {name}\n"));
    output.push_str(&format!(
        "  Frames: {}  Events: {}  Produced: {}  Arrivals: {}\n",
        log.frames, log.events, log.produced, log.arrivals
    ));
    if rejected > 0 {
        output.push_str(&format!("  Rejected orders: {rejected}\n"));
    }
    output.push_str(&format!(
        "  Battles: {}  Captures: {}\n\n",
        log.battles.len(),
        log.captures()
    ));

    for battle in &log.battles {
        let factions: Vec<String> = battle.factions.iter().map(|f| format!("P{f}")).collect();
        output.push_str(&format!(
            "  [{:>5}] {} {:?} {} -> ",
            battle.tick,
            battle.coord,
            battle.kind,
            factions.join(" vs ")
        ));
        match battle.holder {
            Some(holder) => output.push_str(&format!("P{holder} holds with {}", battle.survivors)),
            None => output.push_str("cleared"),
        }
        if battle.captured {
            output.push_str(" (captured)");
        }
        output.push('\n');
    }
    if !log.battles.is_empty() {
        output.push('\n');
    }

    for player in standings(state) {
        output.push_str(&format!(
            "  Player {}: {} units ({} castles, {} armies)\n",
            player.id, player.units, player.castles, player.armies
        ));
    }

    output
}

/// Soak statistics aggregated over many skirmishes.
#[derive(Debug, Default, Clone)]
pub(super) struct SoakStats {
    /// Skirmishes completed.
    pub(super) games: u64,
    /// Skirmishes that stopped with an error.
    pub(super) failures: u64,
    /// Frames simulated.
    pub(super) frames: u64,
    /// Situations resolved.
    pub(super) battles: u64,
    /// Castles that changed hands.
    pub(super) captures: u64,
    /// Arrivals that merged.
    pub(super) merges: u64,
    /// Invariant violations found.
    pub(super) violations: u64,
    /// First violation messages with their seed.
    pub(super) samples: Vec<(u64, String)>,
    /// Skirmishes ending with each player strongest.
    pub(super) leaders: BTreeMap<PlayerId, u64>,
    /// Skirmishes with no single strongest player.
    pub(super) draws: u64,
}

/// Violation messages kept per soak.
const MAX_SAMPLES: usize = 8;

impl SoakStats {
    /// Record a violation found in skirmish `seed`.
    pub(super) fn add_violation(&mut self, seed: u64, message: String) {
        self.violations += 1;
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push((seed, message));
        }
    }

    /// Record the final standings of a skirmish.
    pub(super) fn add_result(&mut self, state: &GameState) {
        self.games += 1;
        let players = standings(state);
        match players.as_slice() {
            [first, second, ..] if first.units == second.units => self.draws += 1,
            [first, ..] => *self.leaders.entry(first.id).or_default() += 1,
            [] => self.draws += 1,
        }
    }

    /// Merge another partial result into this one.
    pub(super) fn merge(&mut self, other: &Self) {
        self.games += other.games;
        self.failures += other.failures;
        self.frames += other.frames;
        self.battles += other.battles;
        self.captures += other.captures;
        self.merges += other.merges;
        self.violations += other.violations;
        for sample in &other.samples {
            if self.samples.len() < MAX_SAMPLES {
                self.samples.push(sample.clone());
            }
        }
        for (player, count) in &other.leaders {
            *self.leaders.entry(*player).or_default() += count;
        }
        self.draws += other.draws;
    }
}

/// JSON-serializable soak result.
#[derive(Debug, Serialize)]
pub(super) struct JsonSoakResult {
    games: u64,
    failures: u64,
    frames: u64,
    battles: u64,
    captures: u64,
    merges: u64,
    violations: u64,
    samples: Vec<JsonSample>,
    leaders: BTreeMap<PlayerId, u64>,
    draws: u64,
}

/// A sampled violation.
#[derive(Debug, Serialize)]
struct JsonSample {
    seed: u64,
    message: String,
}

impl JsonSoakResult {
    /// Create from stats.
    pub(super) fn from_stats(stats: &SoakStats) -> Self {
        Self {
            games: stats.games,
            failures: stats.failures,
            frames: stats.frames,
            battles: stats.battles,
            captures: stats.captures,
            merges: stats.merges,
            violations: stats.violations,
            samples: stats
                .samples
                .iter()
                .map(|(seed, message)| JsonSample {
                    seed: *seed,
                    message: message.clone(),
                })
                .collect(),
            leaders: stats.leaders.clone(),
            draws: stats.draws,
        }
    }
}

/// Format soak stats as human-readable text.
pub(super) fn format_soak_text(stats: &SoakStats) -> String {
    let mut output = String::new();

    output.push_str(&format!("Soak Results ({} skirmishes)\n", stats.games));
    output.push_str("========================================\n\n");
    output.push_str(&format!("  Frames:     {}\n", stats.frames));
    output.push_str(&format!("  Battles:    {}\n", stats.battles));
    output.push_str(&format!("  Captures:   {}\n", stats.captures));
    output.push_str(&format!("  Merges:     {}\n", stats.merges));
    output.push_str(&format!("  Failures:   {}\n", stats.failures));
    output.push_str(&format!("  Violations: {}\n\n", stats.violations));

    if stats.games > 0 {
        output.push_str("Strongest at end:\n");
        for (player, count) in &stats.leaders {
            output.push_str(&format!(
                "  Player {player}: {count} ({:.1}%)\n",
                *count as f64 / stats.games as f64 * 100.0
            ));
        }
        output.push_str(&format!("  Draws: {}\n", stats.draws));
    }

    if !stats.samples.is_empty() {
        output.push_str("\nSample violations:\n");
        for (seed, message) in &stats.samples {
            output.push_str(&format!("  seed {seed}: {message}\n"));
        }
    }

    output
}
