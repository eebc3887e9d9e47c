//! Tagger - image analysis sidecar for a photo library host.
//!
//! By default the process serves JSON requests on stdin, one per line, and
//! answers each with one JSON line on stdout. Logs always go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Serve requests
//! echo '{"mode":"calculate-tone","arg":"photo.jpg"}' | tagger
//!
//! # Fetch the CLIP model, streaming progress events
//! tagger --download-model
//!
//! # View configuration
//! tagger config show
//! ```

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tagger_core::config::EnvOverrides;
use tagger_core::Config;

mod cli;
mod logging;

/// Tagger - embeddings, dominant color and tone for photos.
#[derive(Parser, Debug)]
#[command(name = "tagger")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Download the model artifacts, report progress as JSON lines, and exit
    #[arg(long)]
    download_model: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go straight to stderr.
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using defaults plus environment overrides. Check your config file with `tagger config path`."
            );
            (Config::with_valid_overrides(&EnvOverrides::from_process()), Some(e))
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Tagger v{}", tagger_core::VERSION);

    if let Some(Commands::Config(args)) = cli.command {
        cli::config::execute(args).await?;
        return Ok(ExitCode::SUCCESS);
    }

    if cli.download_model {
        if let Some(e) = &config_error {
            return Ok(cli::download::config_failed(e));
        }
        return Ok(cli::download::execute(&config).await);
    }

    cli::serve::execute(config).await?;
    Ok(ExitCode::SUCCESS)
}
