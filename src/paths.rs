use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/// Project-relative location of the VS Code settings file
pub const VSCODE_SETTINGS: &str = ".vscode/settings.json";
/// Project-relative location of the Emacs directory-local variables file
pub const EMACS_DIR_LOCALS: &str = ".dir-locals.el";
/// Project-level configuration file
pub const PROJECT_CONFIG: &str = ".edtarget.toml";

/// All computed paths used by edtarget
#[derive(Debug, Clone)]
pub struct Paths {
    /// Workspace root the editor files live under
    pub project_root: PathBuf,
    /// <root>/.vscode/settings.json
    pub vscode_settings: PathBuf,
    /// <root>/.dir-locals.el
    pub emacs_dir_locals: PathBuf,
    /// <root>/.edtarget.toml
    pub project_config: PathBuf,
    /// ~/.config/edtarget/config.toml (platform dependent), if a home directory exists
    pub user_config: Option<PathBuf>,
}

impl Paths {
    /// Paths for an explicit project root
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let project_root = root.into();
        let user_config = ProjectDirs::from("", "", "edtarget")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        Self {
            vscode_settings: project_root.join(VSCODE_SETTINGS),
            emacs_dir_locals: project_root.join(EMACS_DIR_LOCALS),
            project_config: project_root.join(PROJECT_CONFIG),
            user_config,
            project_root,
        }
    }

    /// Use `explicit` if given, otherwise discover the root from the current directory
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = match explicit {
            Some(dir) => dir
                .canonicalize()
                .with_context(|| format!("Project directory not found: {}", dir.display()))?,
            None => {
                let cwd = std::env::current_dir().context("Failed to determine current directory")?;
                discover_project_root(&cwd)
            }
        };
        tracing::debug!("project root: {}", root.display());
        Ok(Self::for_root(root))
    }

    /// Render a path relative to the project root for display
    pub fn display_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Find the project root for `start`.
///
/// The nearest ancestor whose `Cargo.toml` declares a `[workspace]` wins;
/// otherwise the nearest ancestor with any `Cargo.toml`; otherwise `start`.
pub fn discover_project_root(start: &Path) -> PathBuf {
    let mut nearest_package = None;

    for dir in start.ancestors() {
        let manifest = dir.join("Cargo.toml");
        if !manifest.is_file() {
            continue;
        }
        if is_workspace_manifest(&manifest) {
            return dir.to_path_buf();
        }
        if nearest_package.is_none() {
            nearest_package = Some(dir.to_path_buf());
        }
    }

    nearest_package.unwrap_or_else(|| start.to_path_buf())
}

fn is_workspace_manifest(manifest: &Path) -> bool {
    let Ok(content) = fs::read_to_string(manifest) else {
        return false;
    };
    match content.parse::<toml::Table>() {
        Ok(table) => table.contains_key("workspace"),
        Err(e) => {
            tracing::debug!("ignoring unparsable manifest {}: {e}", manifest.display());
            false
        }
    }
}
