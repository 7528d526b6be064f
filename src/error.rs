//! Error types for edtarget library operations.
//!
//! Command handlers wrap these in `anyhow` for display; the library keeps them
//! typed so callers can tell a rejected target apart from a per-backend I/O
//! failure.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the registry, the backup manager and the switch operation
#[derive(Error, Debug)]
pub enum Error {
    /// The requested target is not part of the registry
    #[error("Unknown target '{name}' (valid targets: {valid})")]
    UnknownTarget { name: String, valid: String },

    /// A config or backup file could not be read, written or copied
    #[error("Failed to {action} {}: {source}", path.display())]
    FileIo {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Restore was requested but no backup exists
    #[error("No backup found at {}", path.display())]
    NoBackup { path: PathBuf },
}

impl Error {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileIo {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
