//! File Discovery
//!
//! Resolves the concrete file set for each planned tool:
//!
//! - `GitFileService` - staged + modified + untracked files (fast mode)
//! - `FileDiscoveryService` - bounded, gitignore-aware directory walk (full runs)
//!
//! Paths are project-relative with forward slashes. Unreadable or vanished
//! paths are skipped silently.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ignore::WalkBuilder;

use qa_cascade_core::Scope;

use crate::catalog::ToolSpec;
use crate::git::{classify_path, ChangeBucket, GitOps};

/// Directory names never descended into.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "coverage",
    "vendor",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".next",
    ".nuxt",
    ".qa-cascade",
];

/// Conventional source roots per scope; the project root is used when none exist.
fn scope_roots(scope: Scope) -> &'static [&'static str] {
    match scope {
        Scope::Frontend => &["src", "web", "frontend", "client", "app", "components", "pages", "public"],
        Scope::Backend => &["server", "backend", "api", "src", "app", "lib", "services", "migrations"],
        _ => &[],
    }
}

/// Whether a file belongs to work in `scope`. Only a frontend/backend
/// contradiction excludes a file.
pub fn scope_admits(scope: Scope, path: &str) -> bool {
    match (scope, classify_path(path)) {
        (Scope::Frontend, Some(ChangeBucket::Backend)) => false,
        (Scope::Backend, Some(ChangeBucket::Frontend)) => false,
        _ => true,
    }
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Filter `files` down to those a tool accepts within `scope`.
pub fn filter_for_tool(files: &[String], spec: &ToolSpec, scope: Scope) -> Vec<String> {
    files
        .iter()
        .filter(|f| spec.matches_file(f) && scope_admits(scope, f))
        .cloned()
        .collect()
}

// ============================================================================
// GitFileService
// ============================================================================

/// Changed files according to git.
pub struct GitFileService {
    root: PathBuf,
    git: GitOps,
}

impl GitFileService {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            git: GitOps::new(),
        }
    }

    // `--relative` keeps paths relative to a project root nested inside the
    // repository; `ls-files` already lists relative to its cwd.

    pub fn staged_files(&self) -> Vec<String> {
        self.list(&["diff", "--cached", "--name-only", "--relative", "--diff-filter=ACMR"])
    }

    pub fn modified_files(&self) -> Vec<String> {
        self.list(&["diff", "--name-only", "--relative", "--diff-filter=ACMR"])
    }

    pub fn untracked_files(&self) -> Vec<String> {
        self.list(&["ls-files", "--others", "--exclude-standard"])
    }

    /// Union of staged, modified and untracked files that still exist, sorted.
    pub fn changed_files(&self) -> Vec<String> {
        let union: BTreeSet<String> = self
            .staged_files()
            .into_iter()
            .chain(self.modified_files())
            .chain(self.untracked_files())
            .filter(|f| self.root.join(f).is_file())
            .collect();
        tracing::debug!(count = union.len(), "Resolved git-changed files");
        union.into_iter().collect()
    }

    fn list(&self, args: &[&str]) -> Vec<String> {
        match self.git.lines(&self.root, args) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::debug!("git file listing unavailable: {}", e);
                Vec::new()
            }
        }
    }
}

// ============================================================================
// FileDiscoveryService
// ============================================================================

/// Depth-bounded walk of the project tree, computed once and filtered per tool.
pub struct FileDiscoveryService {
    root: PathBuf,
    max_depth: usize,
    index: OnceLock<Vec<String>>,
}

impl FileDiscoveryService {
    pub fn new(root: impl AsRef<Path>, max_depth: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_depth,
            index: OnceLock::new(),
        }
    }

    /// Every walkable file under the root, sorted.
    pub fn index(&self) -> &[String] {
        self.index.get_or_init(|| self.walk())
    }

    fn walk(&self) -> Vec<String> {
        let walker = WalkBuilder::new(&self.root)
            .max_depth(Some(self.max_depth))
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                !(is_dir
                    && entry
                        .file_name()
                        .to_str()
                        .map(|name| EXCLUDED_DIRS.contains(&name))
                        .unwrap_or(false))
            })
            .build();

        let mut files: Vec<String> = walker
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Skipping unreadable path: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(normalize)
            })
            .collect();
        files.sort();
        tracing::debug!(count = files.len(), depth = self.max_depth, "Indexed project files");
        files
    }

    /// Files for a tool within `scope`, limited to the scope's source roots.
    pub fn discover(&self, spec: &ToolSpec, scope: Scope) -> Vec<String> {
        let roots: Vec<&str> = scope_roots(scope)
            .iter()
            .copied()
            .filter(|r| self.root.join(r).is_dir())
            .collect();

        self.index()
            .iter()
            .filter(|f| roots.is_empty() || roots.iter().any(|r| f.starts_with(&format!("{}/", r))))
            .filter(|f| spec.matches_file(f) && scope_admits(scope, f))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ToolCatalog;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_fast_mode_filter_keeps_frontend_files() {
        let catalog = ToolCatalog::builtin();
        let changed = vec!["a.ts".to_string(), "b.py".to_string()];
        let eslint = catalog.get("eslint").unwrap();
        assert_eq!(filter_for_tool(&changed, eslint, Scope::Frontend), vec!["a.ts"]);
    }

    #[test]
    fn test_walk_skips_excluded_dirs_and_respects_depth() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "src/app.ts");
        touch(temp.path(), "src/deep/a/b/c/d.ts");
        touch(temp.path(), "node_modules/lib/index.js");
        touch(temp.path(), "dist/bundle.js");
        touch(temp.path(), "server/api.py");

        let service = FileDiscoveryService::new(temp.path(), 3);
        let index = service.index();
        assert!(index.contains(&"src/app.ts".to_string()));
        assert!(index.contains(&"server/api.py".to_string()));
        assert!(!index.iter().any(|f| f.starts_with("node_modules/")));
        assert!(!index.iter().any(|f| f.starts_with("dist/")));
        assert!(!index.contains(&"src/deep/a/b/c/d.ts".to_string()));
    }

    #[test]
    fn test_discover_uses_scope_roots() {
        let temp = tempfile::tempdir().unwrap();
        touch(temp.path(), "web/main.ts");
        touch(temp.path(), "scripts/tool.ts");
        touch(temp.path(), "server/api.py");

        let catalog = ToolCatalog::builtin();
        let service = FileDiscoveryService::new(temp.path(), 8);

        let eslint = catalog.get("eslint").unwrap();
        assert_eq!(service.discover(eslint, Scope::Frontend), vec!["web/main.ts"]);
        assert_eq!(service.discover(eslint, Scope::All), vec!["scripts/tool.ts", "web/main.ts"]);

        let ruff = catalog.get("ruff").unwrap();
        assert_eq!(service.discover(ruff, Scope::Backend), vec!["server/api.py"]);
    }

    fn git(cwd: &Path, args: &[&str]) -> bool {
        std::process::Command::new("git")
            .args(["-c", "user.name=qa", "-c", "user.email=qa@example.com", "-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(cwd)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_changed_files_under_nested_project_root() {
        let temp = tempfile::tempdir().unwrap();
        let repo = temp.path();
        if !git(repo, &["init", "-q"]) {
            return;
        }
        touch(repo, "packages/web/src/app.ts");
        touch(repo, "packages/web/src/staged.ts");
        touch(repo, "tools/build.ts");
        assert!(git(repo, &["add", "."]));
        assert!(git(repo, &["commit", "-q", "-m", "init"]));

        fs::write(repo.join("packages/web/src/app.ts"), "changed").unwrap();
        fs::write(repo.join("packages/web/src/staged.ts"), "changed").unwrap();
        assert!(git(repo, &["add", "packages/web/src/staged.ts"]));
        touch(repo, "packages/web/src/new.ts");
        fs::write(repo.join("tools/build.ts"), "changed").unwrap();

        let service = GitFileService::new(repo.join("packages/web"));
        assert_eq!(
            service.changed_files(),
            vec!["src/app.ts", "src/new.ts", "src/staged.ts"]
        );
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let service = FileDiscoveryService::new(temp.path().join("missing"), 8);
        assert!(service.index().is_empty());

        let git = GitFileService::new(temp.path().join("missing"));
        assert!(git.changed_files().is_empty());
    }
}
