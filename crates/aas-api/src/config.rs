//! HTTP server configuration.

use serde::{Deserialize, Serialize};

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed by CORS. `*` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    /// Interval of the event stream broadcaster in milliseconds.
    #[serde(default = "default_event_interval_ms")]
    pub event_interval_ms: u64,
    /// Maximum concurrent `/events` subscribers.
    #[serde(default = "default_max_event_connections")]
    pub max_event_connections: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

fn default_event_interval_ms() -> u64 {
    1000
}

fn default_max_event_connections() -> usize {
    32
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            event_interval_ms: default_event_interval_ms(),
            max_event_connections: default_max_event_connections(),
        }
    }
}

impl ApiConfig {
    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
