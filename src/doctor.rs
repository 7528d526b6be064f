//! Diagnostics for edtarget.
//!
//! This module implements the `edtarget doctor` command, which checks:
//! - The detected project root and which config file is in effect.
//! - Each backend's editor file and its backup slot.
//! - Whether the backends agree on one target.
//! - Whether the editor clients used for reloading can be started.
//!
//! Each check prints its findings and reports pass/fail.

use anstyle::AnsiColor;
use std::path::Path;

use crate::backend::{Backend, BackendSelector};
use crate::config::Settings;
use crate::paths::Paths;
use crate::reload::CommandNotifier;
use crate::status::{BackendStatus, StatusEntry, current_status};
use crate::ui::Ui;

/// Run every check; returns false if any of them found a problem
pub fn run_doctor(paths: &Paths, settings: &Settings, config_source: Option<&Path>, ui: &Ui) -> bool {
    ui.section("edtarget Doctor");
    ui.newline();

    let entries = current_status(paths, &BackendSelector::all());
    let mut healthy = true;

    healthy &= check_step(ui, "Project", || {
        ui.println(format!(
            "  {} Project root: {}",
            ui.icon_info(),
            paths.project_root.display()
        ));
        if paths.project_root.join("Cargo.toml").is_file() {
            ui.println(format!("  {} Cargo.toml found", ui.icon_ok()));
        } else {
            ui.println(format!(
                "  {} No Cargo.toml at the project root (use -C to pick a directory)",
                ui.icon_warn()
            ));
        }
        match config_source {
            Some(path) => ui.println(format!("  {} Settings from {}", ui.icon_info(), path.display())),
            None => ui.println(format!("  {} No config file, using defaults", ui.icon_info())),
        }
        true
    });

    healthy &= check_step(ui, "Editor Files", || {
        let mut ok = true;
        for entry in &entries {
            ok &= report_entry(paths, entry, ui);
        }
        ok
    });

    healthy &= check_step(ui, "Consistency", || check_consistency(&entries, ui));

    healthy &= check_step(ui, "Reload Tools", || {
        if !settings.reload.enabled {
            ui.println(format!("  {} Reload after switch is disabled", ui.icon_info()));
            return true;
        }
        let notifier = CommandNotifier::new(settings.reload.clone(), &paths.project_root);
        for backend in Backend::ALL {
            let program = settings.reload.program(backend);
            if notifier.client_available(backend) {
                ui.println(format!("  {} {}: {} available", ui.icon_ok(), backend.display_name(), program));
            } else {
                // Switching still works; the user just reloads by hand
                ui.println(format!(
                    "  {} {}: {} not found, reload will be manual",
                    ui.icon_warn(),
                    backend.display_name(),
                    program
                ));
            }
        }
        true
    });

    healthy
}

fn report_entry(paths: &Paths, entry: &StatusEntry, ui: &Ui) -> bool {
    let name = entry.backend.display_name();
    let file = paths.display_relative(&entry.path);

    let ok = match &entry.status {
        BackendStatus::Active(profile) => {
            ui.println(format!("  {} {}: {} targets {}", ui.icon_ok(), name, file, profile.name()));
            true
        }
        BackendStatus::UnknownTarget(settings) => {
            ui.println(format!(
                "  {} {}: {} targets an unregistered triple ({})",
                ui.icon_warn(),
                name,
                file,
                settings.triple_display()
            ));
            true
        }
        BackendStatus::Unrecognized => {
            ui.println(format!(
                "  {} {}: {} has no recognizable target settings",
                ui.icon_warn(),
                name,
                file
            ));
            true
        }
        BackendStatus::FileAbsent => {
            ui.println(format!("  {} {}: {} not created yet", ui.icon_info(), name, file));
            match entry.path.parent() {
                Some(dir) if !dir.is_dir() => {
                    ui.println(format!(
                        "  {} {}: directory {} is missing, switching will fail",
                        ui.icon_err(),
                        name,
                        paths.display_relative(dir)
                    ));
                    false
                }
                _ => true,
            }
        }
        BackendStatus::Unreadable(reason) => {
            ui.println(format!("  {} {}: cannot read {}: {}", ui.icon_err(), name, file, reason));
            false
        }
    };

    if let Some(modified) = entry.backup_modified {
        ui.println(format!(
            "      backup from {}",
            ui.dim(modified.format("%Y-%m-%d %H:%M:%S").to_string())
        ));
    }
    ok
}

fn check_consistency(entries: &[StatusEntry], ui: &Ui) -> bool {
    let active: Vec<_> = entries
        .iter()
        .filter_map(|e| e.status.profile().map(|p| (e.backend, p)))
        .collect();

    let Some((_, first)) = active.first() else {
        ui.println(format!("  {} No backend is configured yet", ui.icon_info()));
        return true;
    };

    if active.iter().all(|(_, p)| p == first) {
        ui.println(format!(
            "  {} Configured backends agree on {}",
            ui.icon_ok(),
            first.name()
        ));
        return true;
    }

    ui.println(format!("  {} Backends disagree:", ui.icon_warn()));
    for (backend, profile) in &active {
        ui.println(format!("      {}: {}", backend.display_name(), profile.name()));
    }
    false
}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F) -> bool
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    let success = check_fn();
    if !success {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
    success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switch::switch_target;
    use crate::test_utils::setup_test_project;
    use crate::ui::ColorMode;
    use tempfile::TempDir;

    fn quiet_settings() -> Settings {
        let mut settings = Settings::default();
        settings.reload.enabled = false;
        settings
    }

    #[test]
    fn test_fresh_project_is_healthy() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);
        let ui = Ui::new(ColorMode::Never, false);

        assert!(run_doctor(&paths, &quiet_settings(), None, &ui));
    }

    #[test]
    fn test_disagreeing_backends_are_reported() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);
        let ui = Ui::new(ColorMode::Never, false);

        switch_target(&paths, "web", &BackendSelector::only([Backend::Vscode]), None).unwrap();
        switch_target(&paths, "ios", &BackendSelector::only([Backend::Emacs]), None).unwrap();

        let entries = current_status(&paths, &BackendSelector::all());
        assert!(!check_consistency(&entries, &ui));
        assert!(!run_doctor(&paths, &quiet_settings(), None, &ui));
    }

    #[test]
    fn test_missing_vscode_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let paths = setup_test_project(&temp_dir);
        let ui = Ui::new(ColorMode::Never, false);
        std::fs::remove_dir(paths.project_root.join(".vscode")).unwrap();

        assert!(!run_doctor(&paths, &quiet_settings(), None, &ui));
    }
}
