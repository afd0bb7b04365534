//! Command-line entry for the voxgate gateway.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used only by the binary target
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod parser;

pub use commands::Commands;
pub use config::{SettingsArgs, load_tokens_file};
pub use error::CliError;
pub use parser::Cli;
