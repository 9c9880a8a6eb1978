//! Line-store files and their locked transactions.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ConfigError, Result};

/// Handle to one line-delimited store file.
///
/// The handle itself holds no state beyond the path; all reads and writes go
/// through [`ConfigFile::lock`]. The lock lives on a sibling `.lock` file so
/// the store file can be atomically replaced while the lock is held.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the exclusive cross-process lock and read the current line
    /// set into a transaction.
    ///
    /// Blocks until any other holder releases the lock. Lock acquisition
    /// failure is an error; a missing store file reads as an empty set, and
    /// a store file with invalid UTF-8 reads as an empty set with a warning.
    pub fn lock(&self) -> Result<ConfigTransaction> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::io("create directory", parent, e))?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| ConfigError::io("open lock", &lock_path, e))?;
        lock.lock().map_err(|e| ConfigError::Lock {
            path: lock_path.clone(),
            source: e,
        })?;

        let lines = self.read_lines()?;
        Ok(ConfigTransaction {
            path: self.path.clone(),
            _lock: lock,
            lines,
        })
    }

    /// Read the current line set without taking the exclusive lock.
    ///
    /// Suitable for advisory queries only; use [`ConfigFile::lock`] for any
    /// read that feeds a write.
    pub fn read(&self) -> Result<Vec<String>> {
        self.read_lines()
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfigError::io("read", &self.path, e)),
        };
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                warn!(path = %self.path.display(), "malformed config store, treating as empty");
                return Ok(Vec::new());
            }
        };

        let mut lines: Vec<String> = Vec::new();
        for raw in text.lines() {
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if lines.iter().any(|existing| existing == line) {
                continue;
            }
            lines.push(line.to_string());
        }
        Ok(lines)
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".lock");
        self.path.with_file_name(name)
    }
}

/// An exclusive read/write view over a [`ConfigFile`].
///
/// Mutations are in-memory until [`ConfigTransaction::commit`]; dropping the
/// transaction releases the lock without writing.
pub struct ConfigTransaction {
    path: PathBuf,
    _lock: File,
    lines: Vec<String>,
}

impl ConfigTransaction {
    /// Add `line` to the set. Adding an existing line is a no-op.
    pub fn add_line(&mut self, line: &str) {
        if !self.contains(line) {
            self.lines.push(line.to_string());
        }
    }

    /// Remove `line` from the set. Removing an absent line is a no-op.
    pub fn remove_line(&mut self, line: &str) {
        self.lines.retain(|existing| existing != line);
    }

    /// Keep only lines matching `keep`.
    pub fn retain(&mut self, keep: impl FnMut(&String) -> bool) {
        self.lines.retain(keep);
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines.iter().any(|existing| existing == line)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Serialize the current set back to disk and release the lock.
    ///
    /// The new contents are written to a temporary sibling and renamed over
    /// the store file, so a crash mid-commit leaves the previous contents
    /// intact.
    pub fn commit(self) -> Result<()> {
        let temp_path = {
            let mut name = self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            name.push_str(".tmp");
            self.path.with_file_name(name)
        };

        let mut file =
            File::create(&temp_path).map_err(|e| ConfigError::io("create", &temp_path, e))?;
        for line in &self.lines {
            writeln!(file, "{line}").map_err(|e| ConfigError::io("write", &temp_path, e))?;
        }
        file.sync_all()
            .map_err(|e| ConfigError::io("sync", &temp_path, e))?;

        fs::rename(&temp_path, &self.path).map_err(|e| ConfigError::AtomicReplace {
            target: self.path.clone(),
            source: e,
        })?;
        Ok(())
        // Lock released when `_lock` drops.
    }
}
