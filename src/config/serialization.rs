//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

impl Config {
    /// Serialize config to TOML string with comments
    pub fn to_toml(&self) -> String {
        format!(
            r#"# trellis configuration
# Precedence: environment variables > this file > built-in defaults

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG and TRELLIS_LOG_LEVEL override)
level = "{level}"
# Write JSON log lines to rotating files in addition to console output
file_enabled = {file_enabled}
file_dir = "{file_dir}"
# Rotation: hourly, daily, never
file_rotation = "{file_rotation}"
file_prefix = "{file_prefix}"

[http]
# Per-request timeout for remote collections (TRELLIS_HTTP_TIMEOUT overrides)
timeout_secs = {timeout_secs}
user_agent = "{user_agent}"
"#,
            level = self.logging.level,
            file_enabled = self.logging.file_enabled,
            file_dir = self.logging.file_dir.display().to_string().replace('\\', "/"),
            file_rotation = self.logging.file_rotation.as_str(),
            file_prefix = self.logging.file_prefix,
            timeout_secs = self.http.timeout_secs,
            user_agent = self.http.user_agent,
        )
    }
}
