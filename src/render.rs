//! ASCII renderer for terminal viewing with ANSI colors.

#![allow(clippy::format_push_string)]

use crate::game::{Coord, GameState, NEUTRAL, PlayerId, Visibility};

/// ANSI color codes for players.
const PLAYER_COLORS: [&str; 8] = [
    "\x1b[31m", // Player 1: Red
    "\x1b[34m", // Player 2: Blue
    "\x1b[32m", // Player 3: Green
    "\x1b[33m", // Player 4: Yellow
    "\x1b[35m", // Player 5: Magenta
    "\x1b[36m", // Player 6: Cyan
    "\x1b[91m", // Player 7: Bright Red
    "\x1b[94m", // Player 8: Bright Blue
];

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const WHITE: &str = "\x1b[37m";
const GRAY: &str = "\x1b[90m";

/// Player display names.
const PLAYER_NAMES: [&str; 8] = [
    "Red", "Blue", "Green", "Yellow", "Magenta", "Cyan", "B.Red", "B.Blue",
];

/// Render the game as seen by `viewer`, or everything when `viewer` is `None`.
///
/// Output format:
/// ```text
/// Tick 42                                 [P1: 523] [P2: 412]
/// ┌─────────────────────┐
/// │ . . C₁. . . . . . . │
/// │ . . . . 7 . ░ ░ ░ ░ │
/// └─────────────────────┘
///
/// Legend: C=Castle  ₁₂=Owner  1-9,+=Army  ░=Unexplored  ,=Explored
///
/// Player 1 (Red):   Castles: 3  Garrison: 40  Armies: 2  Units: 57
/// ```
#[must_use]
pub fn render_ascii(state: &GameState, viewer: Option<PlayerId>) -> String {
    let mut output = String::new();

    render_header(&mut output, state, viewer);
    render_map(&mut output, state, viewer);
    output.push_str(
        "\nLegend: C=Castle  Subscript=Owner  1-9,+=Army  ░=Unexplored  ,=Explored\n\n",
    );
    render_player_stats(&mut output, state, viewer);

    output
}

/// Render the header line with tick and strengths.
fn render_header(output: &mut String, state: &GameState, viewer: Option<PlayerId>) {
    let tick = format!("Tick {}", state.tick());
    output.push_str(&tick);

    if let Some(player) = viewer {
        output.push_str(&format!("  (view of P{player})"));
    }
    let padding = 40usize.saturating_sub(output.len());
    output.push_str(&" ".repeat(padding));

    for player in state.players() {
        let color = get_player_color(player);
        output.push_str(&format!(
            "{color}[P{player}: {}]{RESET} ",
            state.strength(player)
        ));
    }
    output.push('\n');
}

/// Render the map grid.
fn render_map(output: &mut String, state: &GameState, viewer: Option<PlayerId>) {
    let width = state.map().width();
    let height = state.map().height();
    let rule = "─".repeat(usize::try_from(width * 2 + 1).unwrap_or(0));

    output.push_str(&format!("┌{rule}┐\n"));
    for y in 0..height {
        output.push_str("│ ");
        for x in 0..width {
            render_tile(output, state, Coord::new(x, y), viewer);
            output.push(' ');
        }
        output.push_str("│\n");
    }
    output.push_str(&format!("└{rule}┘\n"));
}

/// Render a single tile.
fn render_tile(output: &mut String, state: &GameState, coord: Coord, viewer: Option<PlayerId>) {
    let level = viewer.map_or(Visibility::Visible, |player| state.visibility_at(coord, player));
    let castle = state.castle_at(coord);

    match level {
        Visibility::Unexplored => output.push('░'),
        // Explored castles show without their owner.
        Visibility::Explored => match castle {
            Some(_) => output.push_str(&format!("{GRAY}C{RESET}")),
            None => output.push_str(&format!("{DIM},{RESET}")),
        },
        Visibility::Visible => {
            if let Some(castle) = castle {
                let color = get_player_color(castle.owner);
                let subscript = owner_subscript(castle.owner);
                output.push_str(&format!("{color}C{subscript}{RESET}"));
                return;
            }
            let tile = state.spatial().occupancy(coord);
            let army = tile
                .settled
                .iter()
                .chain(&tile.moving)
                .find_map(|id| state.army(*id));
            match army {
                Some(army) => {
                    let color = get_player_color(army.owner);
                    let units = tile
                        .settled
                        .iter()
                        .chain(&tile.moving)
                        .filter_map(|id| state.army(*id))
                        .map(|army| army.units)
                        .sum();
                    output.push_str(&format!("{color}{}{RESET}", army_to_char(units)));
                }
                None => output.push('.'),
            }
        }
    }
}

/// Convert army count to a display character.
fn army_to_char(army: u32) -> char {
    match army {
        0 => ' ',
        1..=9 => char::from_digit(army, 10).unwrap_or('9'),
        _ => '+', // More than 9
    }
}

/// Get Unicode subscript for owner number.
fn owner_subscript(owner: PlayerId) -> &'static str {
    match owner {
        1 => "₁",
        2 => "₂",
        3 => "₃",
        4 => "₄",
        5 => "₅",
        6 => "₆",
        7 => "₇",
        8 => "₈",
        _ => "",
    }
}

/// Get ANSI color for a player. Neutral renders gray.
fn get_player_color(player_id: PlayerId) -> &'static str {
    if player_id == NEUTRAL {
        return GRAY;
    }
    let idx = usize::from(player_id).saturating_sub(1);
    PLAYER_COLORS.get(idx).copied().unwrap_or(WHITE)
}

/// Get player display name.
fn get_player_name(player_id: PlayerId) -> &'static str {
    let idx = usize::from(player_id).saturating_sub(1);
    PLAYER_NAMES.get(idx).copied().unwrap_or("Unknown")
}

/// Render player statistics.
fn render_player_stats(output: &mut String, state: &GameState, viewer: Option<PlayerId>) {
    for player in state.players() {
        let color = get_player_color(player);
        let name = get_player_name(player);

        let owned: Vec<_> = state.castles().iter().filter(|c| c.owner == player).collect();
        let garrison: u64 = owned.iter().map(|c| u64::from(c.units)).sum();
        let armies = state.armies().values().filter(|a| a.owner == player).count();

        output.push_str(&format!(
            "{color}Player {player} ({name:>7}):{RESET}  Castles: {:<2}  Garrison: {garrison:<4}  Armies: {armies:<2}  Units: {}",
            owned.len(),
            state.strength(player)
        ));
        if viewer == Some(player) {
            let [unexplored, explored, visible] = state.visibility().summary(player);
            output.push_str(&format!(
                "  Vision: {visible} visible / {explored} explored / {unexplored} unexplored"
            ));
        }
        output.push('\n');
    }
}
