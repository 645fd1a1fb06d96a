use anyhow::Context as _;
use clap::{Args, Subcommand};
use facelive_liveness::LivenessConfig;

use super::{config_path, load_config, output_result};
use crate::Cli;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::Show => {
                let config = load_config(cli)?;
                output_result(cli, &config)
            }
            ConfigSubcommand::Path => {
                match config_path(cli) {
                    Some(path) => println!("{}", path.display()),
                    None => println!("(no home directory)"),
                }
                Ok(())
            }
            ConfigSubcommand::Init { force } => {
                let path = config_path(cli).context("no config path; pass --config")?;
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force)", path.display());
                }
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                let yaml = LivenessConfig::default().to_yaml_string()?;
                std::fs::write(&path, yaml).with_context(|| format!("writing {}", path.display()))?;
                println!("Wrote {}", path.display());
                Ok(())
            }
        }
    }
}
