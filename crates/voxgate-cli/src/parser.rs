//! Main CLI parser and top-level argument handling.

use clap::Parser;

use crate::commands::Commands;
use crate::config::SettingsArgs;

/// Command-line interface for the voxgate gateway.
#[derive(Parser)]
#[command(name = "voxgate")]
#[command(about = "Credential-pooling gateway for image, prompt and voice services")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
