//! Tracing setup and named log file sinks.
//!
//! [`LogSinks`] is a `MakeWriter` plugged into the global subscriber next to
//! the stderr layer. Files can be attached and detached by name while the
//! subscriber is running.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Sink name used for per-test log files.
pub const STRATEGY_LOG_HANDLER: &str = "strategy_log_file_handler";

struct NamedSink {
    name: String,
    path: PathBuf,
    level: Level,
    file: File,
}

/// Registry of log files fed by the tracing subscriber.
#[derive(Clone, Default)]
pub struct LogSinks {
    sinks: Arc<Mutex<Vec<NamedSink>>>,
}

impl LogSinks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<NamedSink>> {
        self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open `path` in append mode and route events up to `level` into it.
    /// A sink already registered under `name` is replaced.
    pub fn attach(&self, name: &str, path: &Path, level: Level) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut sinks = self.lock();
        sinks.retain(|s| s.name != name);
        sinks.push(NamedSink {
            name: name.to_string(),
            path: path.to_path_buf(),
            level,
            file,
        });
        Ok(())
    }

    /// Remove and close the sink registered under `name`.
    pub fn detach(&self, name: &str) -> Option<PathBuf> {
        let mut sinks = self.lock();
        let pos = sinks.iter().position(|s| s.name == name)?;
        let mut sink = sinks.remove(pos);
        let _ = sink.file.flush();
        Some(sink.path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().iter().any(|s| s.name == name)
    }

    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        self.lock()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.path.clone())
    }
}

/// Writer handed to the fmt layer for one event.
pub struct LogSinksWriter {
    sinks: Arc<Mutex<Vec<NamedSink>>>,
    level: Option<Level>,
}

impl Write for LogSinksWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sinks = self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for sink in sinks.iter_mut() {
            if self.level.is_none_or(|level| level <= sink.level) {
                sink.file.write_all(buf)?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut sinks = self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for sink in sinks.iter_mut() {
            sink.file.flush()?;
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogSinks {
    type Writer = LogSinksWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogSinksWriter {
            sinks: Arc::clone(&self.sinks),
            level: None,
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        LogSinksWriter {
            sinks: Arc::clone(&self.sinks),
            level: Some(*meta.level()),
        }
    }
}

/// Parse a level name, falling back to INFO.
pub fn parse_level(name: &str) -> Level {
    Level::from_str(name).unwrap_or(Level::INFO)
}

/// Install the global subscriber: stderr output plus the given sinks.
pub fn init_tracing(verbose: bool, sinks: &LogSinks) -> Result<(), TryInitError> {
    let filter = EnvFilter::builder()
        .with_default_directive(if verbose {
            Level::DEBUG.into()
        } else {
            Level::INFO.into()
        })
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(sinks.clone()))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_detach_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.log");
        let sinks = LogSinks::new();

        sinks.attach(STRATEGY_LOG_HANDLER, &path, Level::INFO).unwrap();
        assert!(sinks.contains(STRATEGY_LOG_HANDLER));
        assert_eq!(sinks.path_of(STRATEGY_LOG_HANDLER), Some(path.clone()));

        assert_eq!(sinks.detach(STRATEGY_LOG_HANDLER), Some(path));
        assert!(!sinks.contains(STRATEGY_LOG_HANDLER));
        assert_eq!(sinks.detach(STRATEGY_LOG_HANDLER), None);
    }

    #[test]
    fn test_writer_filters_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered.log");
        let sinks = LogSinks::new();
        sinks.attach("file", &path, Level::INFO).unwrap();

        let mut debug = LogSinksWriter {
            sinks: Arc::clone(&sinks.sinks),
            level: Some(Level::DEBUG),
        };
        debug.write_all(b"debug line\n").unwrap();
        let mut warn = LogSinksWriter {
            sinks: Arc::clone(&sinks.sinks),
            level: Some(Level::WARN),
        };
        warn.write_all(b"warn line\n").unwrap();
        sinks.detach("file");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "warn line\n");
    }

    #[test]
    fn test_attach_replaces_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let sinks = LogSinks::new();
        sinks.attach("x", &dir.path().join("a.log"), Level::INFO).unwrap();
        sinks.attach("x", &dir.path().join("b.log"), Level::INFO).unwrap();
        assert_eq!(sinks.path_of("x"), Some(dir.path().join("b.log")));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("nonsense"), Level::INFO);
    }
}
