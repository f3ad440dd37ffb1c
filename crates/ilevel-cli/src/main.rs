mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ilevel",
    version,
    about = "Incremental extractor for the iLevel portfolio web services"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the configured streams, writing JSON lines to stdout
    Sync {
        /// Path to extraction config YAML file
        #[arg(long)]
        config: PathBuf,
        /// Captured service responses to replay
        #[arg(long)]
        replay: PathBuf,
        /// State file; overrides `state.path` from the config
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Validate the config and show what a sync would do
    Check {
        /// Path to extraction config YAML file
        #[arg(long)]
        config: PathBuf,
        /// State file; overrides `state.path` from the config
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// List built-in streams
    Streams,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Sync {
            config,
            replay,
            state,
        } => commands::sync::execute(&config, &replay, state),
        Commands::Check { config, state } => commands::check::execute(&config, state),
        Commands::Streams => {
            commands::streams::execute();
            Ok(())
        }
    }
}
