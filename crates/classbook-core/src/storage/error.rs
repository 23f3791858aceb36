//! Errors raised while reading, writing or editing the document tree.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The data directory could not be created
    #[error("Cannot create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied on '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No space left while saving '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read data file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot save data file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No such file: '{path}'")]
    NotFound { path: PathBuf },

    /// The temp file was written but could not replace the data file
    #[error("Cannot move '{from}' over '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Input that cannot become the document tree
    #[error("Not a usable document: {details}")]
    InvalidFormat { details: String },

    /// A write would have to replace a non-object value on its way down
    #[error("Path conflict at '{path}': segment '{segment}' holds a {found}, not an object")]
    PathConflict {
        path: String,
        segment: String,
        found: &'static str,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Cannot encode the document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Wrap an I/O failure on `path`, sorting out the cases a user can act on
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => StoreError::NotFound { path },
            _ if out_of_space(&error) => StoreError::DiskFull {
                path,
                source: error,
            },
            _ => StoreError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Whether retrying after user action can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::DiskFull { .. }
                | StoreError::PermissionDenied { .. }
                | StoreError::PathConflict { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::DiskFull { .. } => {
                Some("Free some space on the data directory's disk, then rerun the command.")
            }
            StoreError::PermissionDenied { .. } => {
                Some("Make the data directory and data file writable for your user, or point data_dir elsewhere.")
            }
            StoreError::CreateDirectory { .. } => {
                Some("Create the data directory's parent yourself or set data_dir in the config file.")
            }
            StoreError::PathConflict { .. } => {
                Some("Remove the conflicting value first, or set path_conflict = \"overwrite\" to replace it.")
            }
            StoreError::InvalidFormat { .. } => {
                Some("The input must be a JSON document whose top level is an object.")
            }
            _ => None,
        }
    }
}

// ENOSPC and EDQUOT on Linux; the message check covers other platforms
fn out_of_space(error: &io::Error) -> bool {
    if matches!(error.raw_os_error(), Some(28) | Some(122)) {
        return true;
    }
    let msg = error.to_string().to_lowercase();
    ["no space left", "disk full", "quota exceeded", "not enough space"]
        .iter()
        .any(|needle| msg.contains(needle))
}

pub type StoreResult<T> = Result<T, StoreError>;
