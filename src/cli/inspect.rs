//! Inspect command implementation.

use super::output::{JsonPlayer, standings};
use super::{CliError, OutputFormat};
use bastion::render::render_ascii;
use bastion::{GameState, NEUTRAL, SaveState};
use serde::Serialize;
use std::path::Path;

/// What a player can see of a saved game.
#[derive(Debug, Serialize)]
struct JsonView {
    tick: u64,
    width: i32,
    height: i32,
    /// Tile counts: unexplored, explored, visible.
    vision: Option<[usize; 3]>,
    players: Vec<JsonPlayer>,
}

/// Execute the inspect command.
///
/// # Errors
///
/// Returns an error if the save cannot be loaded.
pub(crate) fn execute(path: &Path, player: Option<u8>, format: OutputFormat) -> Result<(), CliError> {
    let save = SaveState::load(path)
        .map_err(|e| CliError::new(format!("Failed to load {}: {e}", path.display())))?;
    let mut state = GameState::restore(save)?;

    let viewer = player.filter(|&p| p != NEUTRAL);
    if let Some(viewer) = viewer {
        state.set_current_player(viewer);
    }

    match format {
        OutputFormat::Text => print!("{}", render_ascii(&state, viewer)),
        OutputFormat::Json => {
            let view = JsonView {
                tick: state.tick(),
                width: state.map().width(),
                height: state.map().height(),
                vision: viewer.map(|p| state.visibility().summary(p)),
                players: standings(&state),
            };
            let json = serde_json::to_string_pretty(&view)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    Ok(())
}
