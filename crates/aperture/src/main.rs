//! Aperture CLI - Image interrogation: captions plus embedding-ranked tags.
//!
//! Aperture takes images as input and produces text descriptions: a
//! generated caption followed by vocabulary tags ranked by embedding
//! similarity against the image.
//!
//! # Usage
//!
//! ```bash
//! # Interrogate a single image
//! aperture interrogate image.jpg
//!
//! # Include confidence scores
//! aperture interrogate image.jpg --ranks
//!
//! # View configuration
//! aperture config show
//!
//! # Manage models
//! aperture models download
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Aperture - Image interrogation: captions plus embedding-ranked tags.
#[derive(Parser, Debug)]
#[command(name = "aperture")]
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
    /// Interrogate images: generate captions and ranked tags
    Interrogate(cli::interrogate::InterrogateArgs),

    /// Manage models (download, list, etc.)
    Models(cli::models::ModelsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match aperture_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `aperture config path`."
            );
            aperture_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Aperture v{}", aperture_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Interrogate(args) => cli::interrogate::execute(args).await,
        Commands::Models(args) => cli::models::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
