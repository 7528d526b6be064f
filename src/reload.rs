//! Best-effort editor reload notifications.
//!
//! A notification is a single command run with a short timeout. Whatever
//! happens, the caller gets a [`NotifyOutcome`] rather than an error, and can
//! fall back to [`manual_instructions`].

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::Backend;
use crate::codec::sexp::quote_string;
use crate::config::ReloadSettings;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// What happened when an editor was asked to reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The editor accepted the request
    Sent,
    /// The editor's command-line client could not be started
    ToolUnavailable,
    /// The client ran but found no editor to talk to (or timed out)
    NoRunningInstance,
}

impl NotifyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Sent => "reload requested",
            Self::ToolUnavailable => "editor client not found",
            Self::NoRunningInstance => "no running editor instance",
        }
    }
}

/// One client invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Exit status 0 alone does not prove a running editor was reached
    pub requires_output: bool,
}

/// Asks a running editor to pick up a changed config file
pub trait Notifier {
    fn notify(&self, backend: Backend) -> NotifyOutcome;
}

/// Notifier that shells out to each editor's command-line client
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    settings: ReloadSettings,
    project_root: PathBuf,
}

impl CommandNotifier {
    pub fn new(settings: ReloadSettings, project_root: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            project_root: project_root.into(),
        }
    }

    /// Command used to notify `backend`.
    ///
    /// rust-analyzer in VS Code watches settings.json itself, so reaching a
    /// running instance is all that is needed. `code --status` exits 0 even
    /// with no window open, so it only counts as sent when it also prints
    /// diagnostics.
    pub fn command(&self, backend: Backend) -> ReloadCommand {
        let program = self.settings.program(backend).to_string();
        match backend {
            Backend::Vscode => ReloadCommand {
                program,
                args: vec![String::from("--status")],
                requires_output: true,
            },
            Backend::Emacs => ReloadCommand {
                program,
                args: vec![String::from("--eval"), emacs_reload_form(&self.project_root)],
                requires_output: false,
            },
        }
    }

    /// Check whether the client program can be started at all
    pub fn client_available(&self, backend: Backend) -> bool {
        let program = self.settings.program(backend);
        !matches!(
            run_with_timeout(
                program,
                &["--version".to_string()],
                self.settings.timeout(),
                false,
            ),
            NotifyOutcome::ToolUnavailable
        )
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, backend: Backend) -> NotifyOutcome {
        let cmd = self.command(backend);
        let outcome = run_with_timeout(
            &cmd.program,
            &cmd.args,
            self.settings.timeout(),
            cmd.requires_output,
        );
        tracing::debug!("reload {backend} via {}: {outcome:?}", cmd.program);
        outcome
    }
}

/// Run `program` once, killing it if it outlives `timeout`.
///
/// With `requires_output`, a zero exit status only counts as sent when the
/// program also wrote something to stdout.
fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    requires_output: bool,
) -> NotifyOutcome {
    let stdout = if requires_output { Stdio::piped() } else { Stdio::null() };
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("failed to start {program}: {e}");
            }
            return NotifyOutcome::ToolUnavailable;
        }
    };

    // Drained on a thread so a chatty child never blocks on a full pipe
    let output = child.stdout.take().map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    });

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                let Some(rx) = &output else {
                    return NotifyOutcome::Sent;
                };
                // A grandchild may still hold the pipe open
                let remaining = deadline.saturating_duration_since(Instant::now());
                return match rx.recv_timeout(remaining) {
                    Ok(buf) if !buf.iter().all(u8::is_ascii_whitespace) => NotifyOutcome::Sent,
                    Ok(_) => {
                        tracing::debug!("{program} exited cleanly but printed nothing");
                        NotifyOutcome::NoRunningInstance
                    }
                    Err(_) => {
                        tracing::warn!("{program} output did not close within {timeout:?}");
                        NotifyOutcome::NoRunningInstance
                    }
                };
            }
            Ok(Some(status)) => {
                tracing::debug!("{program} exited with {status}");
                return NotifyOutcome::NoRunningInstance;
            }
            Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
            Ok(None) => {
                tracing::warn!("{program} did not finish within {timeout:?}, giving up");
                let _ = child.kill();
                let _ = child.wait();
                return NotifyOutcome::NoRunningInstance;
            }
            Err(e) => {
                tracing::warn!("failed to wait for {program}: {e}");
                let _ = child.kill();
                return NotifyOutcome::NoRunningInstance;
            }
        }
    }
}

/// Elisp that re-reads directory locals in this project's Rust buffers and
/// pushes the new configuration to any eglot server attached to them
fn emacs_reload_form(project_root: &Path) -> String {
    let root = quote_string(&project_root.to_string_lossy());
    format!(
        "(let ((root (file-name-as-directory (expand-file-name {root})))) \
         (dolist (buf (buffer-list)) \
         (with-current-buffer buf \
         (when (and buffer-file-name (derived-mode-p 'rust-mode 'rust-ts-mode) \
         (string-prefix-p root (expand-file-name buffer-file-name))) \
         (hack-dir-local-variables-non-file-buffer) \
         (when (and (fboundp 'eglot-current-server) (eglot-current-server)) \
         (eglot-signal-didChangeConfiguration (eglot-current-server)))))))"
    )
}

/// What to tell the user when a notification could not be delivered
pub fn manual_instructions(backend: Backend) -> &'static str {
    match backend {
        Backend::Vscode => {
            "In VS Code, run \"rust-analyzer: Restart server\" from the command palette"
        }
        Backend::Emacs => {
            "In Emacs, revisit your Rust buffers (M-x revert-buffer) and run M-x eglot-reconnect"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::sexp;

    fn notifier_with(program: &str) -> CommandNotifier {
        let settings = ReloadSettings {
            vscode: program.to_string(),
            emacs: program.to_string(),
            timeout_ms: 2000,
            ..ReloadSettings::default()
        };
        CommandNotifier::new(settings, "/work/project")
    }

    #[test]
    fn test_missing_tool() {
        let notifier = notifier_with("edtarget-test-no-such-program");
        assert_eq!(notifier.notify(Backend::Emacs), NotifyOutcome::ToolUnavailable);
        assert!(!notifier.client_available(Backend::Vscode));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_command_is_sent() {
        let notifier = notifier_with("true");
        assert_eq!(notifier.notify(Backend::Emacs), NotifyOutcome::Sent);
        assert!(notifier.client_available(Backend::Vscode));
    }

    #[cfg(unix)]
    #[test]
    fn test_vscode_silent_success_means_no_instance() {
        let notifier = notifier_with("true");
        assert_eq!(notifier.notify(Backend::Vscode), NotifyOutcome::NoRunningInstance);
    }

    #[cfg(unix)]
    #[test]
    fn test_vscode_status_output_is_sent() {
        // echo prints its arguments, standing in for `code --status` diagnostics
        let notifier = notifier_with("echo");
        assert_eq!(notifier.notify(Backend::Vscode), NotifyOutcome::Sent);
    }

    #[test]
    fn test_only_vscode_requires_output() {
        let notifier = notifier_with("client");
        let vscode = notifier.command(Backend::Vscode);
        assert_eq!(vscode.args, ["--status"]);
        assert!(vscode.requires_output);
        assert!(!notifier.command(Backend::Emacs).requires_output);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_means_no_instance() {
        let notifier = notifier_with("false");
        assert_eq!(notifier.notify(Backend::Emacs), NotifyOutcome::NoRunningInstance);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_command() {
        let started = Instant::now();
        let outcome =
            run_with_timeout("sleep", &["5".to_string()], Duration::from_millis(100), true);
        assert_eq!(outcome, NotifyOutcome::NoRunningInstance);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_emacs_form_is_readable_lisp() {
        let notifier = notifier_with("emacsclient");
        let args = notifier.command(Backend::Emacs).args;
        assert_eq!(args[0], "--eval");
        let form = sexp::read(&args[1]).unwrap();
        assert_eq!(form.car().and_then(sexp::Sexp::as_symbol), Some("let"));
        assert!(args[1].contains("\"/work/project\""));
    }

    #[test]
    fn test_manual_instructions_for_every_backend() {
        for backend in Backend::ALL {
            assert!(!manual_instructions(backend).is_empty());
        }
    }
}
