//! Pathlock - Development Tools

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pathlock_core::level::LevelContext;
use pathlock_tools::preflight::{check_unique_agents, level_settings, preflight, PathArg};
use pathlock_tools::validate::validate_levels;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pathlock-tools")]
#[command(about = "Development tools for Pathlock levels")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate level files
    Validate {
        /// Level file, or directory of `.ron` level files
        #[arg(default_value = "assets/levels")]
        path: PathBuf,
    },
    /// Predict collisions for candidate paths
    Predict {
        /// Level file
        level: PathBuf,
        /// Paths as `agent:x,y/x,y/...`, starting on the agent's start cell
        #[arg(required = true)]
        paths: Vec<PathArg>,
    },
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating levels in: {}", path.display());
            match validate_levels(&path) {
                Ok(report) => {
                    println!("{report}");
                    if report.is_ok() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    }
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Predict { level, paths } => {
            let result = check_unique_agents(&paths)
                .and_then(|()| LevelContext::from_file(&level))
                .and_then(|ctx| preflight(&ctx, &paths, &level_settings(&ctx)));
            match result {
                Ok(report) => {
                    println!("{report}");
                    if report.is_clear() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    }
                }
                Err(e) => {
                    tracing::error!("Prediction failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
