use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::codec::Codec;
use crate::codec::emacs::EmacsCodec;
use crate::codec::vscode::VsCodeCodec;
use crate::paths::Paths;

/// Editor backends whose configuration edtarget generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Vscode,
    Emacs,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Vscode, Backend::Emacs];

    /// Identifier used on the command line and in config files
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Vscode => "vscode",
            Backend::Emacs => "emacs",
        }
    }

    /// Get human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Vscode => "VS Code",
            Backend::Emacs => "Emacs",
        }
    }

    /// The codec that reads and writes this backend's file
    pub fn codec(&self) -> &'static dyn Codec {
        match self {
            Backend::Vscode => &VsCodeCodec,
            Backend::Emacs => &EmacsCodec,
        }
    }

    /// Managed file for this backend
    pub fn config_path(&self, paths: &Paths) -> PathBuf {
        match self {
            Backend::Vscode => paths.vscode_settings.clone(),
            Backend::Emacs => paths.emacs_dir_locals.clone(),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `--backend` values accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Vscode,
    Emacs,
    All,
}

/// The set of backends a command operates on, deduplicated and in stable order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSelector(Vec<Backend>);

impl BackendSelector {
    pub fn all() -> Self {
        Self(Backend::ALL.to_vec())
    }

    pub fn only(backends: impl IntoIterator<Item = Backend>) -> Self {
        let mut backends: Vec<Backend> = backends.into_iter().collect();
        backends.sort();
        backends.dedup();
        Self(backends)
    }

    /// Resolve command-line arguments, falling back to `default` when none were given
    pub fn from_args(args: &[BackendArg], default: &BackendSelector) -> Self {
        if args.is_empty() {
            return default.clone();
        }
        if args.contains(&BackendArg::All) {
            return Self::all();
        }
        Self::only(args.iter().filter_map(|arg| match arg {
            BackendArg::Vscode => Some(Backend::Vscode),
            BackendArg::Emacs => Some(Backend::Emacs),
            BackendArg::All => None,
        }))
    }

    pub fn backends(&self) -> &[Backend] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_from_args() {
        let default = BackendSelector::only([Backend::Emacs]);

        assert_eq!(BackendSelector::from_args(&[], &default), default);
        assert_eq!(
            BackendSelector::from_args(&[BackendArg::Vscode, BackendArg::All], &default),
            BackendSelector::all()
        );
        assert_eq!(
            BackendSelector::from_args(
                &[BackendArg::Emacs, BackendArg::Vscode, BackendArg::Emacs],
                &default
            )
            .backends(),
            &[Backend::Vscode, Backend::Emacs]
        );
    }

    #[test]
    fn test_backend_serde_names() {
        let json = serde_json::to_string(&Backend::Vscode).unwrap();
        assert_eq!(json, "\"vscode\"");
        let parsed: Backend = serde_json::from_str("\"emacs\"").unwrap();
        assert_eq!(parsed, Backend::Emacs);
    }
}
