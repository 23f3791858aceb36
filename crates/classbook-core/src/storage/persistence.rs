//! File persistence
//!
//! Saves and loads the document tree as one pretty-printed JSON file.
//! Uses atomic writes (write to temp file, then rename) to prevent corruption.
//!
//! Storage location: `~/.local/share/classbook/` (configurable via `Config`)
//!
//! Files:
//! - `classbook.json` - The document tree
//! - `classbook.json.corrupt.backup` - An unreadable document set aside on open

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{StorageBackend, StoreError, StoreResult};
use crate::config::Config;

/// Suffix appended to a document that could not be read
const CORRUPT_SUFFIX: &str = "corrupt.backup";

/// Backend storing the tree in a single JSON file
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend for the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a backend for the data file named by the configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_path())
    }

    /// Path of the JSON document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if a document exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Where an unreadable document is moved to
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(CORRUPT_SUFFIX);
        self.path.with_file_name(name)
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> StoreResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| StoreError::ReadError {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some(contents))
    }

    fn save(&self, contents: &str) -> StoreResult<()> {
        atomic_write(&self.path, contents.as_bytes())
    }

    fn quarantine(&self) -> StoreResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let backup = self.backup_path();
        fs::rename(&self.path, &backup).map_err(|source| StoreError::AtomicWriteFailed {
            from: self.path.clone(),
            to: backup.clone(),
            source,
        })?;

        Ok(Some(backup.display().to_string()))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
///
/// This ensures the target file is never left in a partially-written state.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    // Temp file in the same directory so the rename stays on one filesystem
    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    file.sync_all()
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StoreError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
