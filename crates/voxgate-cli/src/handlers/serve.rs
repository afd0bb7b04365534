//! Serve command handler.

use tracing::info;
use voxgate_axum::{ServerConfig, start_server};

use crate::config::SettingsArgs;
use crate::error::CliError;

/// Start the gateway and run until the server stops.
pub async fn execute(args: SettingsArgs, cors_origins: Vec<String>) -> Result<(), CliError> {
    let (settings, tokens) = super::resolve(args).await?;
    voxgate_core::validate_settings(&settings)?;

    let mut config = ServerConfig::new(settings).with_tokens(tokens);
    if !cors_origins.is_empty() {
        info!(origins = ?cors_origins, "Restricting CORS origins");
        config = config.with_allowed_origins(cors_origins);
    }

    start_server(config).await?;
    Ok(())
}
