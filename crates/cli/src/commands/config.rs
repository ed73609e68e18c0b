use anyhow::Result;
use bughunter_scanners::{config::EXAMPLE_CONFIG, PipelineConfig};
use clap::Subcommand;
use colored::*;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print an annotated example configuration
    Example,

    /// Load a configuration file, apply the environment and check it
    Validate {
        #[arg(short, long)]
        config: PathBuf,

        /// Print the effective configuration as YAML
        #[arg(long)]
        show: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Example => {
                print!("{}", EXAMPLE_CONFIG);
                Ok(())
            }
            ConfigCommand::Validate { config, show } => {
                let mut loaded = PipelineConfig::from_file(&config)?;
                loaded.apply_env()?;
                loaded.validate()?;

                println!("{} {}", "✅ Valid configuration:".green(), config.display());
                if show {
                    // The key is not echoed back.
                    loaded.llm.api_key = loaded.llm.api_key.map(|_| "***".to_string());
                    print!("{}", loaded.to_yaml()?);
                }
                Ok(())
            }
        }
    }
}
