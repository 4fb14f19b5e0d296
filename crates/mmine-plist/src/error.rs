//! Plist error types

use std::io;
use std::path::PathBuf;

/// Errors raised while loading, editing or writing a plist document
#[derive(Debug, thiserror::Error)]
pub enum PlistError {
    #[error("Failed to read plist {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write plist {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed XML in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("No <dict> element found in {0}")]
    MissingDict(PathBuf),
}

impl PlistError {
    /// Path of the document that caused the error
    pub fn path(&self) -> &std::path::Path {
        match self {
            PlistError::Read { path, .. }
            | PlistError::Write { path, .. }
            | PlistError::Parse { path, .. } => path,
            PlistError::MissingDict(path) => path,
        }
    }
}
