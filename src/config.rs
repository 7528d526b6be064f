//! User and project configuration.
//!
//! Settings come from the first file found among:
//! 1. `--config <FILE>`
//! 2. `<project>/.edtarget.toml`
//! 3. the platform config directory (`~/.config/edtarget/config.toml` on Linux)
//!
//! A missing file means defaults. A malformed one is an error for commands
//! that write files; read-only commands fall back to defaults with a warning.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::{Backend, BackendSelector};
use crate::paths::Paths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Backends used when a command gets no `--backend`
    pub backends: Vec<Backend>,
    pub reload: ReloadSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backends: Backend::ALL.to_vec(),
            reload: ReloadSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReloadSettings {
    /// Notify editors after a switch
    pub enabled: bool,
    /// Upper bound on a single reload command
    pub timeout_ms: u64,
    /// VS Code command-line launcher
    pub vscode: String,
    /// Emacs server client
    pub emacs: String,
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 2000,
            vscode: String::from("code"),
            emacs: String::from("emacsclient"),
        }
    }
}

impl ReloadSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Program invoked to notify `backend`
    pub fn program(&self, backend: Backend) -> &str {
        match backend {
            Backend::Vscode => &self.vscode,
            Backend::Emacs => &self.emacs,
        }
    }
}

impl Settings {
    /// Load settings, returning the file they came from (if any)
    pub fn load(paths: &Paths, explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            let settings = Self::read(path)?;
            return Ok((settings, Some(path.to_path_buf())));
        }

        let candidates = std::iter::once(paths.project_config.clone()).chain(paths.user_config.clone());
        for path in candidates {
            if path.is_file() {
                let settings = Self::read(&path)?;
                tracing::debug!("loaded settings from {}", path.display());
                return Ok((settings, Some(path)));
            }
        }

        Ok((Self::default(), None))
    }

    /// Like [`Settings::load`], but a broken file yields defaults and the error
    pub fn load_or_default(paths: &Paths, explicit: Option<&Path>) -> (Self, Option<anyhow::Error>) {
        match Self::load(paths, explicit) {
            Ok((settings, _)) => (settings, None),
            Err(e) => {
                tracing::debug!("falling back to default settings: {e:#}");
                (Self::default(), Some(e))
            }
        }
    }

    /// Read settings from a TOML file
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Default backend selection; an empty list means all backends
    pub fn default_selector(&self) -> BackendSelector {
        if self.backends.is_empty() {
            BackendSelector::all()
        } else {
            BackendSelector::only(self.backends.iter().copied())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.default_selector(), BackendSelector::all());
        assert!(settings.reload.enabled);
        assert_eq!(settings.reload.timeout(), Duration::from_secs(2));
        assert_eq!(settings.reload.program(Backend::Emacs), "emacsclient");
    }

    #[test]
    fn test_parse_partial_file() {
        let settings = Settings::parse(
            r#"
backends = ["emacs"]

[reload]
timeout_ms = 500
emacs = "/opt/emacs/bin/emacsclient"
"#,
        )
        .unwrap();

        assert_eq!(settings.default_selector().backends(), &[Backend::Emacs]);
        assert_eq!(settings.reload.timeout_ms, 500);
        assert_eq!(settings.reload.program(Backend::Emacs), "/opt/emacs/bin/emacsclient");
        assert_eq!(settings.reload.program(Backend::Vscode), "code");
        assert!(settings.reload.enabled);
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        assert!(Settings::parse("backend = [\"emacs\"]").is_err());
        assert!(Settings::parse("backends = [\"vim\"]").is_err());
    }

    #[test]
    fn test_load_prefers_project_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut paths = Paths::for_root(temp_dir.path());
        paths.user_config = None;

        let (settings, source) = Settings::load(&paths, None).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(source.is_none());

        std::fs::write(&paths.project_config, "[reload]\nenabled = false\n").unwrap();
        let (settings, source) = Settings::load(&paths, None).unwrap();
        assert!(!settings.reload.enabled);
        assert_eq!(source, Some(paths.project_config.clone()));
    }

    #[test]
    fn test_load_or_default_survives_bad_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut paths = Paths::for_root(temp_dir.path());
        paths.user_config = None;
        std::fs::write(&paths.project_config, "backends = [\"vim\"]\n").unwrap();

        assert!(Settings::load(&paths, None).is_err());

        let (settings, err) = Settings::load_or_default(&paths, None);
        assert_eq!(settings, Settings::default());
        let err = err.unwrap();
        assert!(format!("{err:#}").contains(".edtarget.toml"));
    }

    #[test]
    fn test_load_or_default_without_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut paths = Paths::for_root(temp_dir.path());
        paths.user_config = None;
        std::fs::write(&paths.project_config, "backends = [\"emacs\"]\n").unwrap();

        let (settings, err) = Settings::load_or_default(&paths, None);
        assert!(err.is_none());
        assert_eq!(settings.default_selector().backends(), &[Backend::Emacs]);
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::for_root(temp_dir.path());
        let missing = temp_dir.path().join("nope.toml");
        assert!(Settings::load(&paths, Some(&missing)).is_err());
    }
}
