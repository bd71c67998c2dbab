//! Headless Pathlock runner.
//!
//! This binary plays levels without a presentation layer, controlled via JSON
//! on stdin/stdout. Designed for scripted play and CI verification.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p pathlock_headless
//!
//! # Interactive mode with a level preloaded and state after every tick
//! cargo run -p pathlock_headless -- run --level assets/levels/crossing.ron --auto-state
//!
//! # Play a scenario and check its expectation
//! cargo run -p pathlock_headless -- scenario assets/scenarios/crossing_collides.ron
//!
//! # Verify determinism by replaying a scenario
//! cargo run -p pathlock_headless -- verify assets/scenarios/shared_goal_clears.ron --runs 5
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for command/response format.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pathlock_headless::{
    run_scenario, verify_scenario, HeadlessConfig, HeadlessRunner, Scenario,
};

#[derive(Parser)]
#[command(name = "pathlock-headless")]
#[command(about = "Headless Pathlock runner for scripted play and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive session
    Run {
        /// Level file to load on startup
        #[arg(short, long)]
        level: Option<PathBuf>,

        /// Output state after every tick
        #[arg(long)]
        auto_state: bool,

        /// Ticks per second for `tick` commands without `dt`
        #[arg(long, default_value = "60")]
        tick_rate: u32,
    },

    /// Play a scenario file and check its expectation
    Scenario {
        /// Scenario file
        path: PathBuf,
    },

    /// Verify determinism by playing a scenario several times
    Verify {
        /// Scenario file
        path: PathBuf,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Some(Commands::Run {
            level,
            auto_state,
            tick_rate,
        }) => cmd_run(level, auto_state, tick_rate),
        Some(Commands::Scenario { path }) => cmd_scenario(&path),
        Some(Commands::Verify { path, runs }) => cmd_verify(&path, runs),
        None => {
            // Default: interactive mode
            cmd_run(None, false, 60)
        }
    }
}

/// Run an interactive session
fn cmd_run(level: Option<PathBuf>, auto_state: bool, tick_rate: u32) -> ExitCode {
    tracing::info!("Starting interactive session");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
        level_path: level,
        tick_rate,
    };

    match HeadlessRunner::with_config(config).run_stdio() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Session failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_scenario(path: &Path) -> Option<Scenario> {
    match Scenario::load(path) {
        Ok(scenario) => Some(scenario),
        Err(e) => {
            tracing::error!("{e}");
            None
        }
    }
}

/// Play a scenario and print its outcome as one JSON line
fn cmd_scenario(path: &Path) -> ExitCode {
    let Some(scenario) = load_scenario(path) else {
        return ExitCode::FAILURE;
    };

    let outcome = match run_scenario(&scenario, path.parent()) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(scenario = %scenario.name, "Scenario failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string(&outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("Failed to serialize outcome: {e}"),
    }

    match &scenario.expect {
        Some(expect) if !outcome.meets(expect) => {
            tracing::error!(
                expected = ?expect.outcome,
                actual = ?outcome.outcome,
                "Scenario did not meet its expectation"
            );
            ExitCode::FAILURE
        }
        _ => ExitCode::SUCCESS,
    }
}

/// Play a scenario several times and compare final hashes
fn cmd_verify(path: &Path, runs: u32) -> ExitCode {
    let Some(scenario) = load_scenario(path) else {
        return ExitCode::FAILURE;
    };

    tracing::info!(scenario = %scenario.name, runs, "Verifying determinism");
    match verify_scenario(&scenario, path.parent(), runs) {
        Ok(hashes) => {
            let mut unique = hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            if unique.len() <= 1 {
                tracing::info!(hash = ?unique.first(), "Deterministic across {runs} runs");
                ExitCode::SUCCESS
            } else {
                tracing::error!(?hashes, "Non-deterministic: {} distinct hashes", unique.len());
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            tracing::error!("Verification failed: {e}");
            ExitCode::FAILURE
        }
    }
}
