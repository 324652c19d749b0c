/// Configuration management
use crate::error::{ChatError, Result};
use std::time::Duration;
use url::Url;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST backend
    pub api_base_url: String,

    /// Base URL of the push channel (derived from `api_base_url` when unset)
    pub ws_base_url: Option<String>,

    /// Per-request timeout for REST calls
    pub request_timeout: Duration,

    /// Fixed delay before the push channel reconnects after close/error
    pub reconnect_interval: Duration,

    /// Typing inactivity window before a typing_stop is emitted
    pub typing_stop_after: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            ws_base_url: None,
            request_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(2),
            typing_stop_after: Duration::from_millis(3000),
        }
    }
}

impl Config {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(api) = std::env::var("CHATLINK_API_URL") {
            if !api.trim().is_empty() {
                config.api_base_url = api.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(ws) = std::env::var("CHATLINK_WS_URL") {
            if !ws.trim().is_empty() {
                config.ws_base_url = Some(ws.trim().trim_end_matches('/').to_string());
            }
        }
        config
    }

    /// Resolve the websocket base: explicit `ws_base_url` if set, otherwise
    /// the API base with its scheme mapped http→ws / https→wss.
    pub fn ws_base(&self) -> Result<String> {
        if let Some(ws) = &self.ws_base_url {
            return Ok(ws.trim_end_matches('/').to_string());
        }
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| ChatError::Config(format!("Invalid api_base_url: {}", e)))?;
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(ChatError::Config(format!(
                    "Cannot derive websocket scheme from '{}'",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ChatError::Config("Cannot set websocket scheme".to_string()))?;
        Ok(url.to_string().trim_end_matches('/').to_string())
    }

    /// Full websocket URL for one user's push channel
    pub fn ws_url_for(&self, user_id: &str) -> Result<String> {
        Ok(format!("{}/ws/{}", self.ws_base()?, user_id))
    }
}
