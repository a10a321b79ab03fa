//! Bastion CLI - Command-line interface for running and inspecting Bastion games.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Bastion - A deterministic castle and army tile engine
#[derive(Parser, Debug)]
#[command(name = "bastion")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log engine decisions (battles, captures, orders)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a scenario file to the end
    Run {
        /// Scenario file (.json)
        #[arg(required = true)]
        scenario: PathBuf,

        /// Engine configuration file overriding the scenario's
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Frames to simulate (default: the scenario's)
        #[arg(short = 'n', long)]
        frames: Option<u32>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Save the final state to file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Render the final map from player N's perspective (0: no fog)
        #[arg(short, long)]
        player: Option<u8>,

        /// Suppress the final map
        #[arg(short, long)]
        quiet: bool,
    },

    /// Render a saved game
    Inspect {
        /// Save file (.json)
        #[arg(required = true)]
        save: PathBuf,

        /// View from player N's perspective (default: everything)
        #[arg(short, long)]
        player: Option<u8>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },

    /// Run many random skirmishes in parallel and check engine invariants
    Soak {
        /// Number of skirmishes (default: 200)
        #[arg(short, long, default_value = "200")]
        games: u64,

        /// Starting seed (increments for each skirmish)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Parallel threads (default: CPU count)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Factions per skirmish (2-8)
        #[arg(long, default_value = "2")]
        players: u8,

        /// Map edge length in tiles
        #[arg(long, default_value = "24")]
        size: i32,

        /// Frames per skirmish
        #[arg(short = 'n', long, default_value = "900")]
        frames: u32,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Show progress bar
        #[arg(short, long)]
        progress: bool,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("bastion=debug")
        } else {
            EnvFilter::new("bastion=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Commands::Run {
            scenario,
            config,
            frames,
            format,
            save,
            player,
            quiet,
        } => cli::run::execute(&scenario, config.as_deref(), frames, format, save, player, quiet),

        Commands::Inspect {
            save,
            player,
            format,
        } => cli::inspect::execute(&save, player, format),

        Commands::Soak {
            games,
            seed,
            threads,
            players,
            size,
            frames,
            format,
            progress,
        } => cli::soak::execute(&cli::soak::SoakOptions {
            games,
            seed,
            threads,
            players,
            size,
            frames,
            format,
            progress,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
