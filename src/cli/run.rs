//! Run command implementation.

use super::output::{JsonRunResult, RunLog, format_run_text};
use super::{CliError, OutputFormat};
use bastion::render::render_ascii;
use bastion::{EngineConfig, NEUTRAL, Scenario};
use std::path::{Path, PathBuf};

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded or played.
pub(crate) fn execute(
    scenario_path: &Path,
    config_path: Option<&Path>,
    frames: Option<u32>,
    format: OutputFormat,
    save: Option<PathBuf>,
    player: Option<u8>,
    quiet: bool,
) -> Result<(), CliError> {
    let mut scenario = Scenario::load(scenario_path).map_err(|e| {
        CliError::new(format!("Failed to load {}: {e}", scenario_path.display()))
    })?;
    if let Some(path) = config_path {
        scenario.config = EngineConfig::load(path)
            .map_err(|e| CliError::new(format!("Failed to load {}: {e}", path.display())))?;
    }
    if let Some(frames) = frames {
        scenario.frames = frames;
    }

    let mut run = scenario.start()?;
    let mut log = RunLog::default();
    run.run(|report| log.record(report))?;
    let rejected = run.rejected();
    let mut state = run.into_state();

    if let Some(save_path) = save {
        state
            .snapshot()
            .save(&save_path)
            .map_err(|e| CliError::new(format!("Failed to save game: {e}")))?;
        eprintln!("Game saved to: {}", save_path.display());
    }

    match format {
        OutputFormat::Text => {
            if !quiet {
                let viewer = player.filter(|&p| p != NEUTRAL);
                if let Some(viewer) = viewer {
                    state.set_current_player(viewer);
                }
                print!("{}", render_ascii(&state, viewer));
                println!();
            }
            print!("{}", format_run_text(&scenario.name, &log, rejected, &state));
        }
        OutputFormat::Json => {
            let result = JsonRunResult::new(&scenario.name, &log, rejected, &state);
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    Ok(())
}
