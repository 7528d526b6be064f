//! Read-only status of each backend's config file.
//!
//! Status never fails and never touches the filesystem beyond reading: a
//! missing file, an unreadable one and one in an unexpected shape are all
//! reported as values.

use chrono::{DateTime, Local};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::backend::{Backend, BackendSelector};
use crate::backup::backup_path;
use crate::codec::ParseOutcome;
use crate::paths::Paths;
use crate::target::{ProfileSettings, TargetProfile};

/// What a backend's config file currently says
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    /// Configured for a registered target
    Active(TargetProfile),
    /// Well-formed settings that match no registered target
    UnknownTarget(ProfileSettings),
    /// Present, but the owned settings are missing or malformed
    Unrecognized,
    FileAbsent,
    /// Present, but could not be read
    Unreadable(String),
}

impl BackendStatus {
    /// Read and classify the file at `path` for `backend`
    pub fn detect(backend: Backend, path: &Path) -> Self {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::FileAbsent,
            Err(e) => return Self::Unreadable(e.to_string()),
        };

        let Ok(text) = std::str::from_utf8(&bytes) else {
            return Self::Unrecognized;
        };

        match backend.codec().parse(text) {
            ParseOutcome::Recognized(profile) => Self::Active(profile),
            ParseOutcome::UnknownTarget(settings) => Self::UnknownTarget(settings),
            ParseOutcome::Unrecognized => Self::Unrecognized,
        }
    }

    pub fn profile(&self) -> Option<&TargetProfile> {
        match self {
            Self::Active(profile) => Some(profile),
            _ => None,
        }
    }

    /// Short label for tables
    pub fn label(&self) -> String {
        match self {
            Self::Active(profile) => profile.name().to_string(),
            Self::UnknownTarget(_) => String::from("unknown target"),
            Self::Unrecognized => String::from("unrecognized"),
            Self::FileAbsent => String::from("absent"),
            Self::Unreadable(_) => String::from("unreadable"),
        }
    }
}

/// Status of one backend
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub backend: Backend,
    pub path: PathBuf,
    pub status: BackendStatus,
    /// When the backup slot was last written, if there is a backup
    pub backup_modified: Option<DateTime<Local>>,
}

/// Report the current state of every selected backend
pub fn current_status(paths: &Paths, selector: &BackendSelector) -> Vec<StatusEntry> {
    selector
        .backends()
        .iter()
        .map(|&backend| {
            let path = backend.config_path(paths);
            let status = BackendStatus::detect(backend, &path);
            let backup_modified = fs::metadata(backup_path(&path))
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Local>::from);
            StatusEntry {
                backend,
                path,
                status,
                backup_modified,
            }
        })
        .collect()
}

/// The target shared by every entry, if they all agree on one
pub fn common_target(entries: &[StatusEntry]) -> Option<&TargetProfile> {
    let first = entries.first()?.status.profile()?;
    entries
        .iter()
        .all(|e| e.status.profile() == Some(first))
        .then_some(first)
}
