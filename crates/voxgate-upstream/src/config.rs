//! Public configuration for the upstream client.

use std::time::Duration;

/// Configuration for [`UpstreamClient`](crate::UpstreamClient).
///
/// # Example
///
/// ```
/// use voxgate_upstream::UpstreamConfig;
/// use std::time::Duration;
///
/// let config = UpstreamConfig::new()
///     .with_base_url("https://upstream.example")
///     .with_timeout(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL every request path is joined onto
    pub(crate) base_url: String,
    /// User agent string for HTTP requests
    pub(crate) user_agent: String,
    /// Origin header sent with requests and signaling upgrades
    pub(crate) origin: String,
    /// Request timeout
    pub(crate) timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://grok.com".to_string(),
            user_agent: concat!("voxgate/", env!("CARGO_PKG_VERSION")).to_string(),
            origin: "https://grok.com".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl UpstreamConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL. A trailing slash is ignored.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the `Origin` header value.
    ///
    /// Defaults to `https://grok.com`.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the request timeout.
    ///
    /// Defaults to 120 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UpstreamConfig::new();
        assert_eq!(config.base_url, "https://grok.com");
        assert!(config.user_agent.starts_with("voxgate/"));
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_builder_pattern() {
        let config = UpstreamConfig::new()
            .with_base_url("http://127.0.0.1:9000/")
            .with_user_agent("test-agent")
            .with_origin("https://example.test")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.origin(), "https://example.test");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
