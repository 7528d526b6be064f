//! High-level command orchestration for the CLI.
//!
//! Each function here corresponds to a subcommand in `main.rs`. Handlers print
//! through [`Ui`] and return `anyhow::Result`; the ones that can partially fail
//! return `Ok(false)` so `main` can set the exit code without an error message
//! on top of the per-backend diagnostics.

use anstyle::AnsiColor;
use anyhow::{Context, Result, bail};
use inquire::{Confirm, Select};
use std::io::IsTerminal;
use std::path::Path;

use crate::backend::{Backend, BackendSelector};
use crate::backup::{self, backup_path};
use crate::config::Settings;
use crate::doctor::run_doctor;
use crate::error::Error;
use crate::paths::Paths;
use crate::reload::{CommandNotifier, Notifier, NotifyOutcome, manual_instructions};
use crate::status::{BackendStatus, StatusEntry, common_target, current_status};
use crate::switch::{SwitchReport, switch_target};
use crate::target::Target;
use crate::ui::Ui;

/// Point the selected backends at a target; returns false if any backend failed
pub fn switch(
    paths: &Paths,
    settings: &Settings,
    target: Option<&str>,
    selector: &BackendSelector,
    reload: bool,
    ui: &Ui,
) -> Result<bool> {
    let name = match target {
        Some(name) => name.to_string(),
        None => prompt_target(paths, selector)?,
    };

    let notifier = (reload && settings.reload.enabled)
        .then(|| CommandNotifier::new(settings.reload.clone(), &paths.project_root));

    let spinner = ui.spinner(format!("Switching to '{}'...", name));
    let report = match switch_target(
        paths,
        &name,
        selector,
        notifier.as_ref().map(|n| n as &dyn Notifier),
    ) {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };

    if report.is_success() {
        ui.spinner_finish_ok(&spinner, format!("Active target: {}", report.profile.name()));
    } else {
        ui.spinner_finish_warn(&spinner, format!("Partially switched to {}", report.profile.name()));
    }

    print_switch_report(paths, &report, ui);
    Ok(report.is_success())
}

fn print_switch_report(paths: &Paths, report: &SwitchReport, ui: &Ui) {
    for outcome in &report.outcomes {
        let name = outcome.backend.display_name();
        match &outcome.result {
            Ok(file) => {
                let note = if file.changed { "updated" } else { "unchanged" };
                ui.ok(format!("{}: {} {}", name, paths.display_relative(&file.path), ui.dim(note)));
                if let Some(backup) = &file.backup {
                    ui.println(format!("    backup: {}", ui.dim(paths.display_relative(backup))));
                }
                if let Some(notify) = file.notify {
                    print_notify(outcome.backend, notify, ui);
                }
            }
            Err(e) => ui.err(format!("{}: {}", name, e)),
        }
    }
}

fn print_notify(backend: Backend, outcome: NotifyOutcome, ui: &Ui) {
    if outcome.is_sent() {
        ui.info(format!("{}: {}", backend.display_name(), outcome.describe()));
    } else {
        ui.warn(format!("{}: {}", backend.display_name(), outcome.describe()));
        ui.println(format!("    {}", manual_instructions(backend)));
    }
}

/// Ask for a target interactively, starting on the one currently active
fn prompt_target(paths: &Paths, selector: &BackendSelector) -> Result<String> {
    if !std::io::stdin().is_terminal() {
        bail!("No target given (valid targets: {})", Target::valid_names());
    }

    let entries = current_status(paths, selector);
    let cursor = common_target(&entries)
        .and_then(|p| Target::ALL.iter().position(|t| *t == p.target()))
        .unwrap_or(0);

    let choice = Select::new("Switch to target:", Target::ALL.to_vec())
        .with_starting_cursor(cursor)
        .with_help_message("↑↓ to move, enter to select")
        .prompt()
        .context("Target selection cancelled")?;
    Ok(choice.name().to_string())
}

/// Show what each selected backend is configured for
pub fn status(paths: &Paths, selector: &BackendSelector, ui: &Ui) -> Result<()> {
    let entries = current_status(paths, selector);

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell("Backend"),
        ui.header_cell("File"),
        ui.header_cell("Target"),
        ui.header_cell("Triple"),
        ui.header_cell("Features"),
        ui.header_cell("Check targets"),
        ui.header_cell("Backup"),
    ]);

    for entry in &entries {
        let mut row = vec![
            ui.cell(entry.backend.display_name()),
            ui.cell(paths.display_relative(&entry.path)),
        ];
        row.extend(status_cells(&entry.status, ui));
        row.push(ui.cell(
            entry
                .backup_modified
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| String::from("-")),
        ));
        table.add_row(row);
    }

    ui.section("Editor targets");
    ui.println(table.to_string());

    for entry in &entries {
        if let BackendStatus::Unreadable(reason) = &entry.status {
            ui.warn(format!("{}: {}", entry.backend.display_name(), reason));
        }
    }

    if entries.len() > 1 {
        match common_target(&entries) {
            Some(profile) => ui.info(format!("All backends target {}", ui.bold(profile.name()))),
            None if entries.iter().any(|e| e.status.profile().is_some()) => {
                ui.warn("Backends are not configured for the same target")
            }
            None => {}
        }
    }

    Ok(())
}

/// Target, triple, features and check-target cells for one status
fn status_cells(status: &BackendStatus, ui: &Ui) -> Vec<comfy_table::Cell> {
    let (label, settings) = match status {
        BackendStatus::Active(profile) => (
            ui.colored_cell(profile.name(), AnsiColor::Green),
            Some(profile.settings()),
        ),
        BackendStatus::UnknownTarget(settings) => {
            (ui.colored_cell(status.label(), AnsiColor::Yellow), Some(settings))
        }
        BackendStatus::Unrecognized => (ui.colored_cell(status.label(), AnsiColor::Yellow), None),
        BackendStatus::Unreadable(_) => (ui.colored_cell(status.label(), AnsiColor::Red), None),
        BackendStatus::FileAbsent => (ui.cell(status.label()), None),
    };

    let mut cells = vec![label];
    match settings {
        Some(s) => cells.extend([
            ui.cell(s.triple_display()),
            ui.cell(s.features_display()),
            ui.cell(s.check_targets_display()),
        ]),
        None => cells.extend((0..3).map(|_| ui.cell("-"))),
    }
    cells
}

/// Ask the selected editors to reload their configuration
pub fn reload(paths: &Paths, settings: &Settings, selector: &BackendSelector, ui: &Ui) -> Result<()> {
    let notifier = CommandNotifier::new(settings.reload.clone(), &paths.project_root);

    for &backend in selector.backends() {
        let spinner = ui.spinner(format!("Reloading {}...", backend.display_name()));
        let outcome = notifier.notify(backend);
        spinner.finish_and_clear();
        print_notify(backend, outcome, ui);
    }
    Ok(())
}

/// List registered targets and where each is active
pub fn targets(paths: &Paths, selector: &BackendSelector, ui: &Ui) -> Result<()> {
    let entries = current_status(paths, selector);

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Target"),
        ui.header_cell("Triple"),
        ui.header_cell("Features"),
        ui.header_cell("Check targets"),
        ui.header_cell("Description"),
        ui.header_cell("Active in"),
    ]);

    for target in Target::ALL {
        let profile = target.profile();
        let active_in = active_backends(&entries, target);
        let icon = if active_in.is_empty() { " " } else { ui.icon_ok() };
        let active_cell = if active_in.is_empty() {
            ui.cell("-")
        } else {
            ui.colored_cell(active_in.join(", "), AnsiColor::Green)
        };

        table.add_row(vec![
            ui.cell(icon),
            ui.cell(target.name()),
            ui.cell(profile.settings().triple_display()),
            ui.cell(profile.settings().features_display()),
            ui.cell(profile.settings().check_targets_display()),
            ui.cell(target.description()),
            active_cell,
        ]);
    }

    ui.section("Targets");
    ui.println(table.to_string());
    Ok(())
}

fn active_backends(entries: &[StatusEntry], target: Target) -> Vec<&'static str> {
    entries
        .iter()
        .filter(|e| e.status.profile().is_some_and(|p| p.target() == target))
        .map(|e| e.backend.display_name())
        .collect()
}

/// Swap each selected backend's file with its backup; returns false if any swap failed
pub fn restore(paths: &Paths, selector: &BackendSelector, yes: bool, ui: &Ui) -> Result<bool> {
    let (candidates, missing): (Vec<Backend>, Vec<Backend>) = selector
        .backends()
        .iter()
        .copied()
        .partition(|b| backup_path(&b.config_path(paths)).is_file());

    for backend in &missing {
        let err = Error::NoBackup {
            path: backup_path(&backend.config_path(paths)),
        };
        ui.warn(format!("{}: {}", backend.display_name(), err));
    }

    if candidates.is_empty() {
        ui.warn("Nothing to restore.");
        return Ok(true);
    }

    if !yes && !confirm_restore(paths, &candidates)? {
        ui.warn("Restore cancelled.");
        return Ok(true);
    }

    let mut all_ok = true;
    for backend in candidates {
        let path = backend.config_path(paths);
        match backup::restore(&path) {
            Ok(_) => ui.ok(format!(
                "{}: restored {}",
                backend.display_name(),
                paths.display_relative(&path)
            )),
            Err(e) => {
                ui.err(format!("{}: {}", backend.display_name(), e));
                all_ok = false;
            }
        }
    }
    Ok(all_ok)
}

fn confirm_restore(paths: &Paths, backends: &[Backend]) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("Refusing to restore without confirmation; pass --yes");
    }

    let files: Vec<String> = backends
        .iter()
        .map(|b| paths.display_relative(&b.config_path(paths)))
        .collect();
    Confirm::new(&format!("Restore {} from backup?", files.join(", ")))
        .with_default(false)
        .with_help_message("The current contents become the new backup")
        .prompt()
        .context("Confirmation cancelled")
}

/// Run diagnostics; returns false if any check found a problem
pub fn doctor(paths: &Paths, settings: &Settings, config_source: Option<&Path>, ui: &Ui) -> Result<bool> {
    let healthy = run_doctor(paths, settings, config_source, ui);
    if healthy {
        ui.ok("No problems found.");
    } else {
        ui.warn("Some checks reported problems.");
    }
    Ok(healthy)
}
