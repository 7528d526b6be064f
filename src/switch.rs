//! Target switching logic.
//!
//! This module implements the core mechanism of `edtarget`: pointing every
//! selected editor at one target. For each backend it:
//! - Locks the backend's config file.
//! - Backs up the current contents into the single backup slot.
//! - Writes the rendered profile (merged into the existing file where the
//!   backend supports it).
//!
//! Backends are independent: one failing does not stop the others, and the
//! report says which succeeded. Editors are notified only after all writes.

use std::path::PathBuf;

use crate::backend::{Backend, BackendSelector};
use crate::backup::ManagedFile;
use crate::error::{Error, Result};
use crate::paths::Paths;
use crate::reload::{Notifier, NotifyOutcome};
use crate::target::{self, TargetProfile};

/// A backend whose file was written
#[derive(Debug)]
pub struct SwitchedFile {
    pub path: PathBuf,
    /// Where the previous contents went; `None` if the file was new
    pub backup: Option<PathBuf>,
    /// Whether the new contents differ from the old
    pub changed: bool,
    /// Reload outcome, if a notifier was used
    pub notify: Option<NotifyOutcome>,
}

/// Result of switching one backend
#[derive(Debug)]
pub struct BackendOutcome {
    pub backend: Backend,
    pub result: Result<SwitchedFile>,
}

/// Per-backend results of a switch
#[derive(Debug)]
pub struct SwitchReport {
    pub profile: TargetProfile,
    pub outcomes: Vec<BackendOutcome>,
}

impl SwitchReport {
    /// True if every selected backend was written
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (Backend, &SwitchedFile)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|f| (o.backend, f)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (Backend, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.backend, e)))
    }
}

/// Switch the selected backends to target `name`.
///
/// An unknown target is rejected before any file is opened. After that,
/// errors are collected per backend in the report instead of being returned.
pub fn switch_target(
    paths: &Paths,
    name: &str,
    selector: &BackendSelector,
    notifier: Option<&dyn Notifier>,
) -> Result<SwitchReport> {
    let profile = target::profile(name)?;
    tracing::info!("switching to target '{}'", profile.name());

    let mut outcomes: Vec<BackendOutcome> = selector
        .backends()
        .iter()
        .map(|&backend| {
            let result = write_backend(paths, backend, &profile);
            match &result {
                Ok(file) => tracing::info!("{backend}: wrote {}", file.path.display()),
                Err(e) => tracing::warn!("{backend}: {e}"),
            }
            BackendOutcome { backend, result }
        })
        .collect();

    if let Some(notifier) = notifier {
        for outcome in &mut outcomes {
            if let Ok(file) = &mut outcome.result {
                file.notify = Some(notifier.notify(outcome.backend));
            }
        }
    }

    Ok(SwitchReport { profile, outcomes })
}

/// Snapshot then write one backend's file under an exclusive lock
fn write_backend(paths: &Paths, backend: Backend, profile: &TargetProfile) -> Result<SwitchedFile> {
    let path = backend.config_path(paths);
    let codec = backend.codec();

    let mut file = ManagedFile::acquire(&path)?;
    let existing = if file.existed() {
        Some(file.contents()?)
    } else {
        None
    };

    let rendered = match existing.as_deref().map(std::str::from_utf8) {
        Some(Ok(text)) => codec.merge(text, profile),
        Some(Err(_)) => {
            tracing::warn!("{} is not UTF-8, replacing it", path.display());
            codec.render(profile)
        }
        None => codec.render(profile),
    };

    let backup = file.snapshot()?;
    let changed = existing.as_deref() != Some(rendered.as_bytes());
    file.replace(rendered.as_bytes())?;

    Ok(SwitchedFile {
        path,
        backup,
        changed,
        notify: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::backup_path;
    use crate::codec::ParseOutcome;
    use crate::status::{BackendStatus, current_status};
    use crate::target::Target;
    use crate::test_utils::setup_test_project;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingNotifier {
        calls: RefCell<Vec<Backend>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, backend: Backend) -> NotifyOutcome {
            self.calls.borrow_mut().push(backend);
            NotifyOutcome::NoRunningInstance
        }
    }

    #[test]
    fn test_switch_writes_every_backend() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);

        let report = switch_target(&paths, "web", &BackendSelector::all(), None).unwrap();
        assert!(report.is_success());
        assert_eq!(report.succeeded().count(), 2);

        for backend in Backend::ALL {
            let text = fs::read_to_string(backend.config_path(&paths)).unwrap();
            assert_eq!(
                backend.codec().parse(&text),
                ParseOutcome::Recognized(Target::Web.profile())
            );
        }
    }

    #[test]
    fn test_switch_then_status_reports_web() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);
        let vscode = BackendSelector::only([Backend::Vscode]);

        switch_target(&paths, "web", &vscode, None).unwrap();

        let status = current_status(&paths, &vscode);
        assert_eq!(status.len(), 1);
        match &status[0].status {
            BackendStatus::Active(profile) => {
                assert_eq!(profile.architecture_triple(), Some("wasm32-unknown-unknown"));
                assert_eq!(profile.features().iter().collect::<Vec<_>>(), vec!["web"]);
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn test_switch_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);
        let all = BackendSelector::all();

        switch_target(&paths, "ios", &all, None).unwrap();
        let first: Vec<_> = Backend::ALL
            .iter()
            .map(|b| fs::read(b.config_path(&paths)).unwrap())
            .collect();

        let report = switch_target(&paths, "ios", &all, None).unwrap();
        let second: Vec<_> = Backend::ALL
            .iter()
            .map(|b| fs::read(b.config_path(&paths)).unwrap())
            .collect();

        assert_eq!(first, second);
        assert!(report.succeeded().all(|(_, f)| !f.changed));

        // The backup now captures the first call's output
        for (backend, bytes) in Backend::ALL.iter().zip(&first) {
            let backup = fs::read(backup_path(&backend.config_path(&paths))).unwrap();
            assert_eq!(&backup, bytes);
        }
    }

    #[test]
    fn test_backup_holds_previous_target() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);
        let emacs = BackendSelector::only([Backend::Emacs]);

        switch_target(&paths, "desktop", &emacs, None).unwrap();
        let desktop_rendering = fs::read_to_string(&paths.emacs_dir_locals).unwrap();

        let report = switch_target(&paths, "android", &emacs, None).unwrap();
        let (_, file) = report.succeeded().next().unwrap();
        let backup = file.backup.clone().unwrap();

        assert_eq!(fs::read_to_string(backup).unwrap(), desktop_rendering);
        assert!(file.changed);
    }

    #[test]
    fn test_first_switch_has_no_backup() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);

        let report =
            switch_target(&paths, "desktop", &BackendSelector::only([Backend::Emacs]), None)
                .unwrap();
        let (_, file) = report.succeeded().next().unwrap();
        assert!(file.backup.is_none());
        assert!(!backup_path(&paths.emacs_dir_locals).exists());
    }

    #[test]
    fn test_unknown_target_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);
        fs::write(&paths.vscode_settings, "{\"editor.tabSize\": 4}").unwrap();
        let notifier = RecordingNotifier::default();

        let err = switch_target(&paths, "bogus", &BackendSelector::all(), Some(&notifier))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTarget { .. }));

        assert_eq!(
            fs::read_to_string(&paths.vscode_settings).unwrap(),
            "{\"editor.tabSize\": 4}"
        );
        assert!(!paths.emacs_dir_locals.exists());
        assert!(!backup_path(&paths.vscode_settings).exists());
        assert!(notifier.calls.borrow().is_empty());
    }

    #[test]
    fn test_partial_failure_is_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);

        // Make the VS Code directory unusable by replacing it with a file
        fs::remove_dir_all(paths.vscode_settings.parent().unwrap()).unwrap();
        fs::write(paths.vscode_settings.parent().unwrap(), "not a directory").unwrap();

        let notifier = RecordingNotifier::default();
        let report =
            switch_target(&paths, "web", &BackendSelector::all(), Some(&notifier)).unwrap();

        assert!(!report.is_success());
        let failed: Vec<_> = report.failed().map(|(b, _)| b).collect();
        assert_eq!(failed, vec![Backend::Vscode]);
        assert!(matches!(
            report.failed().next().unwrap().1,
            Error::FileIo { .. }
        ));

        let text = fs::read_to_string(&paths.emacs_dir_locals).unwrap();
        assert_eq!(
            Backend::Emacs.codec().parse(&text),
            ParseOutcome::Recognized(Target::Web.profile())
        );

        // Only the backend that was written gets notified
        assert_eq!(*notifier.calls.borrow(), vec![Backend::Emacs]);
        let (_, emacs) = report.succeeded().next().unwrap();
        assert_eq!(emacs.notify, Some(NotifyOutcome::NoRunningInstance));
    }

    #[test]
    fn test_switch_preserves_foreign_vscode_keys() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);
        fs::write(
            &paths.vscode_settings,
            "{\n  // keep me\n  \"editor.formatOnSave\": true\n}\n",
        )
        .unwrap();

        switch_target(&paths, "android", &BackendSelector::only([Backend::Vscode]), None)
            .unwrap();

        let text = fs::read_to_string(&paths.vscode_settings).unwrap();
        assert!(text.contains("\"editor.formatOnSave\": true"));
        assert!(text.contains("aarch64-linux-android"));

        let backup = fs::read_to_string(backup_path(&paths.vscode_settings)).unwrap();
        assert!(backup.contains("// keep me"));
    }
}
