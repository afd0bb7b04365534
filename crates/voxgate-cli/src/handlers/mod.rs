//! Command handlers.

pub mod check_config;
pub mod serve;

use std::collections::BTreeMap;

use voxgate_core::Settings;

use crate::config::{SettingsArgs, load_tokens_file};
use crate::error::CliError;

/// Settings plus the credentials named by `--tokens-file`, if any.
pub async fn resolve(
    args: SettingsArgs,
) -> Result<(Settings, BTreeMap<String, Vec<String>>), CliError> {
    let tokens = match args.tokens_file.as_deref() {
        Some(path) => load_tokens_file(path).await?,
        None => BTreeMap::new(),
    };
    Ok((args.into_settings(), tokens))
}
