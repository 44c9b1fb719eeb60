//! Project-local state paths
//!
//! Everything QA Cascade persists lives under `<project>/.qa-cascade/`.

use std::path::{Path, PathBuf};

use crate::utils::error::AppResult;

pub const STATE_DIR: &str = ".qa-cascade";
pub const ISSUES_FILE: &str = "issues.jsonl";
pub const LAST_RUN_FILE: &str = "last-run.json";

/// `<project>/.qa-cascade`
pub fn state_dir(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR)
}

pub fn issues_path(project_root: &Path) -> PathBuf {
    state_dir(project_root).join(ISSUES_FILE)
}

pub fn last_run_path(project_root: &Path) -> PathBuf {
    state_dir(project_root).join(LAST_RUN_FILE)
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Resolve a possibly relative path against the project root.
pub fn resolve_in_project(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
