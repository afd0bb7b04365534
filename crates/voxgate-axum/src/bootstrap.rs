//! Axum server bootstrap - the composition root.
//!
//! This module is the only place where the store, the runtime state and the
//! upstream client are wired together for the web adapter.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use voxgate_core::{
    ChatCompletionPort, CoreError, DocumentBackend, Settings, VoiceTokenPort, validate_settings,
};
use voxgate_runtime::{TaskRegistry, TokenLease, TokenPoolManager};
use voxgate_store::{DocumentStore, JsonFileBackend, MediaLibrary};
use voxgate_upstream::{UpstreamClient, UpstreamConfig};

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub settings: Settings,
    /// Credential secrets per pool name.
    pub tokens: BTreeMap<String, Vec<String>>,
    pub cors: CorsConfig,
}

impl ServerConfig {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, tokens: BTreeMap<String, Vec<String>>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Set CORS to allow specific origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

/// Upstream-facing collaborators, injectable for tests.
#[derive(Clone)]
pub struct UpstreamPorts {
    pub chat: Arc<dyn ChatCompletionPort>,
    pub voice_tokens: Arc<dyn VoiceTokenPort>,
    /// `Origin` sent when opening the upstream signaling socket.
    pub origin: String,
}

impl UpstreamPorts {
    /// Both ports served by one reqwest client.
    pub fn from_client(client: UpstreamClient) -> Self {
        let origin = client.config().origin().to_string();
        let client = Arc::new(client);
        Self {
            chat: client.clone(),
            voice_tokens: client,
            origin,
        }
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    pub settings: Settings,
    /// The locked document store behind every resource.
    pub store: Arc<DocumentStore>,
    pub media: MediaLibrary,
    pub tokens: Arc<TokenPoolManager>,
    /// In-flight prompt enhancements keyed by request id.
    pub tasks: TaskRegistry,
    pub upstream: UpstreamPorts,
}

impl AxumContext {
    pub fn new(
        settings: Settings,
        backend: Arc<dyn DocumentBackend>,
        upstream: UpstreamPorts,
    ) -> Self {
        let store = Arc::new(DocumentStore::new(backend));
        let media = MediaLibrary::new(Arc::clone(&store), settings.lock_timeout());
        let tokens = Arc::new(TokenPoolManager::new(settings.token_cooldown()));
        let tasks = TaskRegistry::new(settings.disconnect_poll_interval());
        Self {
            settings,
            store,
            media,
            tokens,
            tasks,
            upstream,
        }
    }

    /// Add every secret from a `{pool: [secret, ...]}` map. Returns how many were new.
    pub fn load_tokens(&self, tokens: &BTreeMap<String, Vec<String>>) -> usize {
        let mut added = 0;
        for (pool, secrets) in tokens {
            for secret in secrets {
                if self.tokens.add_token(pool, secret) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Lease a credential from the configured pools, in priority order.
    pub fn lease_token(&self) -> Result<TokenLease, CoreError> {
        Ok(self.tokens.get_token_from(&self.settings.token_pools)?)
    }
}

/// Bootstrap the Axum server with all services.
pub async fn bootstrap(config: ServerConfig) -> Result<AxumContext> {
    let settings = config.settings;
    validate_settings(&settings).context("invalid settings")?;

    tokio::fs::create_dir_all(&settings.data_dir)
        .await
        .with_context(|| format!("creating data dir {}", settings.data_dir.display()))?;

    info!(
        data_dir = %settings.data_dir.display(),
        upstream = %voxgate_core::utils::mask_url(&settings.upstream_base_url),
        pools = ?settings.token_pools,
        "Axum bootstrap resolved settings"
    );

    let backend: Arc<dyn DocumentBackend> = Arc::new(JsonFileBackend::new(&settings.data_dir));
    let client = UpstreamClient::new(
        UpstreamConfig::new()
            .with_base_url(settings.upstream_base_url.clone())
            .with_timeout(settings.upstream_timeout()),
    )?;

    let ctx = AxumContext::new(settings, backend, UpstreamPorts::from_client(client));
    let added = ctx.load_tokens(&config.tokens);
    if added == 0 {
        warn!("No upstream credentials loaded; upstream calls will fail with no_token");
    } else {
        info!(tokens = added, "Loaded upstream credentials");
    }

    Ok(ctx)
}

/// Start the web server on the configured host and port.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    use tokio::net::TcpListener;

    let cors = config.cors.clone();
    let ctx = bootstrap(config).await?;
    let addr = format!("{}:{}", ctx.settings.host, ctx.settings.port);
    let auth_enabled = ctx.settings.effective_public_key().is_some();

    let app = crate::routes::create_router(ctx, &cors);
    let listener = TcpListener::bind(&addr).await?;

    info!(auth_enabled, "voxgate listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
