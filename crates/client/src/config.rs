//! Client configuration.

use std::time::Duration;

use tracing::warn;

use crate::ws::ReconnectConfig;

/// Endpoints and tuning knobs for one client instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:8080/ws`.
    pub ws_url: String,
    /// Base URL of the request/response API, e.g. `http://localhost:8080/api`.
    pub api_url: String,
    /// Reconnect/backoff tuning.
    pub reconnect: ReconnectConfig,
    /// How often the connection monitor wakes up while a session is active.
    pub monitor_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8080/ws".to_string(),
            api_url: "http://localhost:8080/api".to_string(),
            reconnect: ReconnectConfig::default(),
            monitor_interval: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Build a config from `MEMESHARE_WS_URL` / `MEMESHARE_API_URL`,
    /// falling back to the local-dev defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(ws_url) = std::env::var("MEMESHARE_WS_URL") {
            match url::Url::parse(&ws_url) {
                Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") => config.ws_url = ws_url,
                Ok(parsed) => warn!(scheme = parsed.scheme(), "MEMESHARE_WS_URL is not a ws:// or wss:// URL, ignoring"),
                Err(err) => warn!(%err, "invalid MEMESHARE_WS_URL, ignoring"),
            }
        }
        if let Ok(api_url) = std::env::var("MEMESHARE_API_URL") {
            match url::Url::parse(&api_url) {
                Ok(_) => config.api_url = api_url,
                Err(err) => warn!(%err, "invalid MEMESHARE_API_URL, ignoring"),
            }
        }
        config
    }
}
