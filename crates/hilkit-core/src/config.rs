//! Run configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// How per-test log files are rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogFileStrategy {
    /// One new file per test method.
    TestRun,
    /// One file per test class, shared by its methods.
    TestCase,
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Log file, or directory holding the strategy log files.
    pub log_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            log_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl LoggingOptions {
    /// Directory the strategy log files go into.
    ///
    /// A log path with an extension is a file, its parent is used.
    pub fn log_dir(&self) -> PathBuf {
        match &self.log_path {
            Some(path) if path.is_dir() => path.clone(),
            Some(path) if path.extension().is_some() => match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
            Some(path) => path.clone(),
            None => PathBuf::from("."),
        }
    }
}

/// Report outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Directory receiving the JUnit XML files.
    pub junit_dir: PathBuf,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            junit_dir: PathBuf::from("reports"),
        }
    }
}

/// Default device serials.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceOptions {
    pub ykush_serial: Option<String>,
    pub ykur_serial: Option<String>,
}

/// Configuration of a test run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub log_file_strategy: Option<LogFileStrategy>,
    pub logging: LoggingOptions,
    pub reports: ReportOptions,
    pub devices: DeviceOptions,
}

impl RunConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
