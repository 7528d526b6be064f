//! Test utilities shared across test modules

use crate::paths::Paths;
use tempfile::TempDir;

/// Create a project layout for testing inside a temporary directory.
///
/// Mirrors a freshly generated workspace: a `Cargo.toml` and an empty
/// `.vscode/` directory, with no editor config files yet. The user-level
/// config file is disabled so tests never read the developer's own settings.
pub fn setup_test_project(temp_dir: &TempDir) -> Paths {
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join(".vscode")).unwrap();
    std::fs::write(root.join("Cargo.toml"), "[workspace]\nmembers = []\n").unwrap();

    let mut paths = Paths::for_root(root);
    paths.user_config = None;
    paths
}
