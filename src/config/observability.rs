//! `[logging]` section: filter level and the optional rolling JSON file

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{self, RollingFileAppender};

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

const ROTATION_NAMES: [(LogRotation, &str); 3] = [
    (LogRotation::Hourly, "hourly"),
    (LogRotation::Daily, "daily"),
    (LogRotation::Never, "never"),
];

impl LogRotation {
    /// Case-insensitive; anything unrecognized means daily
    pub fn parse(name: &str) -> Self {
        ROTATION_NAMES
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(name.trim()))
            .map(|(rotation, _)| *rotation)
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        ROTATION_NAMES
            .iter()
            .find(|(rotation, _)| *rotation == self)
            .map_or("daily", |(_, name)| *name)
    }

    /// File appender writing `<dir>/<prefix>[.<period>]`
    pub fn appender(self, dir: &Path, prefix: &str) -> RollingFileAppender {
        match self {
            Self::Hourly => rolling::hourly(dir, prefix),
            Self::Daily => rolling::daily(dir, prefix),
            Self::Never => rolling::never(dir, prefix),
        }
    }
}

/// Effective logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level applied to the `trellis` target unless `RUST_LOG` is set
    pub level: String,
    pub file_enabled: bool,
    pub file_dir: PathBuf,
    pub file_rotation: LogRotation,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file_enabled: false,
            file_dir: "./logs".into(),
            file_rotation: LogRotation::default(),
            file_prefix: "trellis".into(),
        }
    }
}

/// `[logging]` as written in the config file; every key optional
#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    pub level: Option<String>,
    pub file_enabled: Option<bool>,
    pub file_dir: Option<String>,
    pub file_rotation: Option<String>,
    pub file_prefix: Option<String>,
}

impl LoggingConfig {
    /// Defaults overlaid with whatever keys the file sets
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let mut config = Self::default();
        let Some(file) = file else {
            return config;
        };

        if let Some(level) = file.level {
            config.level = level;
        }
        if let Some(enabled) = file.file_enabled {
            config.file_enabled = enabled;
        }
        if let Some(dir) = file.file_dir {
            config.file_dir = dir.into();
        }
        if let Some(rotation) = file.file_rotation {
            config.file_rotation = LogRotation::parse(&rotation);
        }
        if let Some(prefix) = file.file_prefix {
            config.file_prefix = prefix;
        }
        config
    }

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        format!("trellis={}", self.level)
    }

    /// Rolling appender for the configured directory, or `None` when file
    /// logging is off
    pub fn file_appender(&self) -> Option<RollingFileAppender> {
        self.file_enabled
            .then(|| self.file_rotation.appender(&self.file_dir, &self.file_prefix))
    }
}
