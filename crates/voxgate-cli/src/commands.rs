//! Subcommands.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP and WebSocket gateway
    Serve {
        /// Allowed CORS origins; every origin is allowed when empty
        #[arg(long, env = "VOXGATE_CORS_ORIGINS", value_delimiter = ',')]
        cors_origins: Vec<String>,
    },

    /// Validate settings and the tokens file, then print a redacted summary
    CheckConfig,
}
