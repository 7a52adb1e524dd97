//! Darkroom CLI - batch RAW/JPEG preview conversion with live progress.
//!
//! Darkroom turns a folder of camera files into preview JPEGs in a single
//! output folder, copies every tag from the originals onto the previews and
//! writes one `metadata.json` summarizing the result.
//!
//! # Usage
//!
//! ```bash
//! # Convert a folder
//! darkroom run ./shoot
//!
//! # Pick the folder interactively and keep the report
//! darkroom run --report run.json
//!
//! # View configuration
//! darkroom config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Darkroom - batch RAW/JPEG preview conversion with live progress.
#[derive(Parser, Debug)]
#[command(name = "darkroom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert a source folder into previews and a metadata summary
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match darkroom_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `darkroom config path`."
            );
            darkroom_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Darkroom v{}", darkroom_core::VERSION);

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
