use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for a DocRelay client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the server, e.g. `http://127.0.0.1:8529`
    pub endpoint: String,

    /// Database every request is scoped to
    pub database: String,

    /// Per-request timeout in milliseconds (0 = no timeout)
    pub request_timeout_ms: u64,

    /// Retry behavior for requests that never reached the server
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8529".to_string(),
            database: "_system".to_string(),
            request_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: ClientConfig =
            serde_json::from_str(json).map_err(|e| format!("invalid client config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Request timeout, `None` when disabled
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(format!("endpoint '{}' must be an http(s) URL", self.endpoint));
        }

        if self.database.is_empty() {
            return Err("database must not be empty".to_string());
        }

        if self.database.contains('/') {
            return Err(format!("database '{}' must not contain '/'", self.database));
        }

        self.retry.validate()
    }
}
