//! Client configuration

use std::env;

use crate::http::HttpOrderApi;
use crate::live::{LiveConfig, LiveConnectionManager, WsConnector};
use crate::{ClientError, ClientResult};

/// Client configuration for connecting to the order hub
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL (e.g., "http://localhost:5000")
    pub base_url: String,

    /// Realtime endpoint (e.g., "ws://localhost:5000/api/live")
    pub live_url: String,

    /// Bearer token for REST calls; also the live channel credential
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,
}

impl ClientConfig {
    /// Create a configuration; the live URL is derived from the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let live_url = derive_live_url(&base_url);
        Self {
            base_url,
            live_url,
            token: None,
            timeout: 30,
        }
    }

    /// Load from environment variables
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | DESK_API_URL | http://localhost:5000 |
    /// | DESK_LIVE_URL | derived from DESK_API_URL |
    /// | DESK_TOKEN | (none) |
    /// | DESK_TIMEOUT_SECS | 30 |
    pub fn from_env() -> Self {
        let mut config =
            Self::new(env::var("DESK_API_URL").unwrap_or_else(|_| "http://localhost:5000".into()));
        if let Ok(live_url) = env::var("DESK_LIVE_URL") {
            config.live_url = live_url;
        }
        config.token = env::var("DESK_TOKEN").ok().filter(|t| !t.is_empty());
        config.timeout = env::var("DESK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        config
    }

    /// Set the token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Override the realtime endpoint
    pub fn with_live_url(mut self, url: impl Into<String>) -> Self {
        self.live_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Create the REST client from this configuration
    pub fn build_http_client(&self) -> ClientResult<HttpOrderApi> {
        HttpOrderApi::new(self)
    }

    /// Create a WebSocket-backed connection manager from this configuration
    pub fn build_live_manager(&self, live: LiveConfig) -> LiveConnectionManager {
        LiveConnectionManager::new(WsConnector::new(self.live_url.clone()), live)
    }

    /// Credential for the live channel
    pub fn credential(&self) -> ClientResult<&str> {
        self.token.as_deref().ok_or(ClientError::Unauthorized)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:5000")
    }
}

fn derive_live_url(base_url: &str) -> String {
    let ws_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base_url.to_string()
    };
    format!("{}/api/live", ws_base)
}
