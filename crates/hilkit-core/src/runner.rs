//! Handle on the active test run.

use std::path::PathBuf;

use crate::config::{LoggingOptions, RunConfig};
use crate::logging::LogSinks;
use crate::result::ResultStream;

/// What the result backends need from the runner driving them.
#[derive(Clone)]
pub struct RunnerContext {
    /// Result output, also the multi-file sink for strategy log files.
    pub stream: ResultStream,
    /// Log files fed by the tracing subscriber.
    pub log_sinks: LogSinks,
    pub logging: LoggingOptions,
    /// Directory receiving generated reports.
    pub report_dir: PathBuf,
}

impl RunnerContext {
    pub fn new(stream: ResultStream, log_sinks: LogSinks) -> Self {
        Self {
            stream,
            log_sinks,
            logging: LoggingOptions::default(),
            report_dir: PathBuf::from("reports"),
        }
    }

    pub fn from_config(config: &RunConfig, stream: ResultStream, log_sinks: LogSinks) -> Self {
        Self {
            stream,
            log_sinks,
            logging: config.logging.clone(),
            report_dir: config.reports.junit_dir.clone(),
        }
    }

    pub fn with_logging(mut self, logging: LoggingOptions) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFileStrategy;
    use crate::result::SharedBuffer;

    #[test]
    fn test_from_config() {
        let mut config = RunConfig {
            log_file_strategy: Some(LogFileStrategy::TestCase),
            ..Default::default()
        };
        config.logging.log_path = Some(PathBuf::from("logs/run.log"));
        config.logging.log_level = "debug".into();
        config.reports.junit_dir = PathBuf::from("out/junit");

        let stream = ResultStream::new(Box::new(SharedBuffer::new()));
        let runner = RunnerContext::from_config(&config, stream, LogSinks::new());

        assert_eq!(runner.logging, config.logging);
        assert_eq!(runner.logging.log_dir(), PathBuf::from("logs"));
        assert_eq!(runner.report_dir, PathBuf::from("out/junit"));
    }

    #[test]
    fn test_defaults() {
        let stream = ResultStream::new(Box::new(SharedBuffer::new()));
        let runner = RunnerContext::new(stream, LogSinks::new());
        assert_eq!(runner.report_dir, PathBuf::from("reports"));
        assert_eq!(runner.logging.log_level, "info");
    }
}
