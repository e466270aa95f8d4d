use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::infra::config::ConfigOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "armdeploy",
    about = "Deploy an ARM template into a temporary resource group, then delete the group"
)]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory containing Asset/ArmTemplate.json (default: .)
    #[arg(long, global = true)]
    pub project_root: Option<PathBuf>,

    /// Target subscription; the first subscription of the signed-in identity when unset
    #[arg(long, global = true, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the resource group, deploy the template, and clean up
    Run,
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }

    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            subscription_id: self.subscription_id.clone(),
            project_root: self.project_root.clone(),
        }
    }
}
