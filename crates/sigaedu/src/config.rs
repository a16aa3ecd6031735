/// Connection settings for a SIGA-EDU portal
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default application identifier sent as `User-Agent`.
pub const DEFAULT_USER_AGENT: &str = concat!("sigaedu/", env!("CARGO_PKG_VERSION"));

/// Configuration for the portal client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the portal (e.g. `https://siga.ifsc.edu.br`)
    pub base_url: String,
    /// Application identifier, sent as the `User-Agent` header
    pub user_agent: String,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Timeout for a whole request, body included
    pub timeout: Duration,
    /// Maximum number of redirects followed per request
    pub max_redirects: usize,
}

impl PortalConfig {
    /// Creates a configuration for the given portal with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Sets the application identifier. An empty id keeps the default.
    pub fn with_user_agent(mut self, app_id: impl Into<String>) -> Self {
        let app_id = app_id.into();
        if !app_id.trim().is_empty() {
            self.user_agent = app_id;
        }
        self
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_app_id_keeps_default() {
        let config = PortalConfig::new("https://siga.example").with_user_agent("  ");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);

        let config = config.with_user_agent("notas-bot/1.0");
        assert_eq!(config.user_agent, "notas-bot/1.0");
        assert_eq!(config.base_url, "https://siga.example");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "base_url": "https://siga.example",
            "user_agent": "x",
            "connect_timeout": { "secs": 5, "nanos": 0 },
            "timeout": { "secs": 60, "nanos": 0 },
            "max_redirects": 3
        }"#;
        let config: PortalConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_redirects, 3);
    }
}
