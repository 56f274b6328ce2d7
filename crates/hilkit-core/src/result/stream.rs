//! Output stream shared by the result backends.
//!
//! Everything written goes to a primary writer (stderr by default) and to
//! every file currently registered in the multi-file table.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

/// Files that can be plugged into a stream while it is in use.
pub trait MultiFileSink {
    /// Start mirroring output into `path` (created or appended).
    fn add_file(&self, path: &Path) -> io::Result<()>;

    /// Stop mirroring into `path` and close it.
    fn remove_file(&self, path: &Path);
}

struct StreamTargets {
    primary: Box<dyn Write + Send>,
    files: Vec<(PathBuf, File)>,
}

/// Cloneable handle on the result output.
#[derive(Clone)]
pub struct ResultStream {
    inner: Arc<Mutex<StreamTargets>>,
}

impl ResultStream {
    pub fn new(primary: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StreamTargets {
                primary,
                files: Vec::new(),
            })),
        }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    fn lock(&self) -> MutexGuard<'_, StreamTargets> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn write_str(&self, text: &str) {
        let mut targets = self.lock();
        if let Err(e) = targets.primary.write_all(text.as_bytes()) {
            warn!("Result stream write failed: {}", e);
        }
        for (path, file) in targets.files.iter_mut() {
            if let Err(e) = file.write_all(text.as_bytes()) {
                warn!(path = %path.display(), "Result stream write failed: {}", e);
            }
        }
    }

    pub fn writeln(&self, text: &str) {
        self.write_str(text);
        self.write_str("\n");
    }

    pub fn flush(&self) {
        let mut targets = self.lock();
        let _ = targets.primary.flush();
        for (_, file) in targets.files.iter_mut() {
            let _ = file.flush();
        }
    }

    /// Files currently mirrored.
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock().files.iter().map(|(p, _)| p.clone()).collect()
    }
}

impl Default for ResultStream {
    fn default() -> Self {
        Self::stderr()
    }
}

impl MultiFileSink for ResultStream {
    fn add_file(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut targets = self.lock();
        if !targets.files.iter().any(|(p, _)| p == path) {
            targets.files.push((path.to_path_buf(), file));
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) {
        let mut targets = self.lock();
        if let Some(pos) = targets.files.iter().position(|(p, _)| p == path) {
            let (_, mut file) = targets.files.remove(pos);
            let _ = file.flush();
        }
    }
}

/// In-memory writer, handy as the primary target of a captured stream.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
