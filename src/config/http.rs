//! HTTP client configuration for remote-backed collections

use serde::Deserialize;
use std::time::Duration;

use super::VERSION;

/// Settings for the client `HttpSource` builds
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header sent with every fetch
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("trellis/{}", VERSION),
        }
    }
}

/// HTTP settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileHttp {
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl HttpConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileHttp>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            timeout_secs: file.timeout_secs.unwrap_or(defaults.timeout_secs),
            user_agent: file.user_agent.unwrap_or(defaults.user_agent),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
