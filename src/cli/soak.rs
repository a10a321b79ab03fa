//! Soak command implementation.

use super::output::{JsonSoakResult, RunLog, SoakStats, format_soak_text, is_merge};
use super::{CliError, OutputFormat};
use bastion::game::check_invariants;
use bastion::skirmish::{SkirmishParams, generate};
use bastion::{Capabilities, EngineConfig};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{info, warn};

/// Options for the soak command.
#[derive(Debug)]
pub(crate) struct SoakOptions {
    /// Number of skirmishes.
    pub(crate) games: u64,
    /// Starting seed.
    pub(crate) seed: Option<u64>,
    /// Parallel threads.
    pub(crate) threads: Option<usize>,
    /// Factions per skirmish.
    pub(crate) players: u8,
    /// Map edge length.
    pub(crate) size: i32,
    /// Frames per skirmish.
    pub(crate) frames: u32,
    /// Output format.
    pub(crate) format: OutputFormat,
    /// Show a progress bar.
    pub(crate) progress: bool,
}

/// Play one skirmish, checking invariants after every frame.
fn soak_one(seed: u64, params: &SkirmishParams, stats: &mut SoakStats) {
    let scenario = match generate(seed, params) {
        Ok(scenario) => scenario,
        Err(e) => {
            warn!(seed, %e, "skirmish generation failed");
            stats.failures += 1;
            return;
        }
    };
    let mut run = match scenario.start() {
        Ok(run) => run,
        Err(e) => {
            warn!(seed, %e, "skirmish failed to start");
            stats.failures += 1;
            return;
        }
    };

    let mut log = RunLog::default();
    while !run.is_finished() {
        let report = match run.step() {
            Ok(report) => report,
            Err(e) => {
                warn!(seed, %e, "skirmish aborted");
                stats.failures += 1;
                return;
            }
        };
        stats.merges += report.arrivals.iter().filter(|a| is_merge(a)).count() as u64;
        log.record(&report);
        for violation in check_invariants(run.state()) {
            stats.add_violation(seed, format!("tick {}: {violation}", report.tick));
        }
    }

    stats.frames += log.frames;
    stats.battles += log.battles.len() as u64;
    stats.captures += log.captures();
    stats.add_result(run.state());
}

/// Execute the soak command.
///
/// # Errors
///
/// Returns an error if the options are invalid or any invariant was violated.
pub(crate) fn execute(options: &SoakOptions) -> Result<(), CliError> {
    let params = SkirmishParams {
        width: options.size,
        height: options.size,
        players: options.players,
        frames: options.frames,
        config: EngineConfig {
            capabilities: Capabilities {
                // Counted per frame instead.
                invariant_checks: false,
                ..Capabilities::default()
            },
            ..EngineConfig::default()
        },
        ..SkirmishParams::default()
    };
    // Validate parameters once.
    generate(0, &params)?;

    // Set thread pool size if specified
    if let Some(num_threads) = options.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let base_seed = options.seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(42)
    });

    let pb = if options.progress {
        let pb = ProgressBar::new(options.games);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} skirmishes ({per_sec})",
        ) {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    info!(games = options.games, base_seed, "soak started");

    // Each thread folds into its own stats, merged at the end
    let stats = (0..options.games)
        .into_par_iter()
        .fold(SoakStats::default, |mut local, i| {
            soak_one(base_seed.wrapping_add(i), &params, &mut local);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            local
        })
        .reduce(SoakStats::default, |mut a, b| {
            a.merge(&b);
            a
        });

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }
    let duration = start.elapsed();

    match options.format {
        OutputFormat::Text => {
            println!();
            print!("{}", format_soak_text(&stats));
            println!();
            println!("Duration: {:.2}s (seeds {base_seed}..{})", duration.as_secs_f64(), base_seed.wrapping_add(options.games));
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&JsonSoakResult::from_stats(&stats))
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    if stats.violations > 0 || stats.failures > 0 {
        return Err(CliError::new(format!(
            "{} invariant violations, {} failed skirmishes",
            stats.violations, stats.failures
        )));
    }
    Ok(())
}
