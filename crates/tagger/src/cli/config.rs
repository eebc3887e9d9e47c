//! The `tagger config` command.

use clap::{Args, Subcommand};
use tagger_core::Config;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (file plus environment overrides)
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with defaults
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::load()?;
            print!("{}", config.to_toml()?);
            println!("# resolved model dir: {}", config.model_dir().display());
        }

        ConfigCommand::Path => println!("{}", Config::default_path().display()),

        ConfigCommand::Init { force } => {
            let path = Config::default_path();
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, Config::default().to_toml()?)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("{}", path.display());
        }
    }

    Ok(())
}
