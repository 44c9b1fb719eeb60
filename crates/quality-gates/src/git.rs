//! Git Integration
//!
//! Everything the context detector needs from version control:
//!
//! - `GitOps` - thin, prompt-free wrapper around the git CLI
//! - `parse_diff` - tolerant unified/numstat diff parser producing a [`DiffSummary`]
//! - `classify_file_changes` - buckets changed paths into frontend/backend/tests/config
//! - `analyze_complexity` / `assess_impact` - weighted change scoring
//! - `detect_conflicts` - advisory overlap prediction against a target branch
//! - `GitIntegrator` - collects branch, diff and commit subjects for a working tree
//!
//! Parsing never fails: malformed input degrades to fewer counted lines.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use qa_cascade_core::{ComplexityLevel, CoreError, CoreResult, RiskLevel};

// ============================================================================
// GitOps
// ============================================================================

/// Result of a git command execution
#[derive(Debug)]
pub struct GitResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl GitResult {
    /// Check if the command was successful and return stdout or error
    pub fn into_result(self) -> CoreResult<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(CoreError::command(format!(
                "Git command failed (exit {}): {}",
                self.exit_code,
                self.stderr.trim()
            )))
        }
    }
}

/// Safe git operations wrapper
#[derive(Debug, Default, Clone, Copy)]
pub struct GitOps;

impl GitOps {
    pub fn new() -> Self {
        Self
    }

    /// Execute a git command in the specified directory
    pub fn execute(&self, cwd: &Path, args: &[&str]) -> CoreResult<GitResult> {
        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GCM_INTERACTIVE", "never")
            .output()
            .map_err(|e| CoreError::command(format!("Failed to execute git: {}", e)))?;

        Ok(GitResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Run a command and return trimmed stdout on success.
    pub fn output(&self, cwd: &Path, args: &[&str]) -> CoreResult<String> {
        Ok(self.execute(cwd, args)?.into_result()?.trim().to_string())
    }

    /// Run a command and return its non-empty stdout lines.
    pub fn lines(&self, cwd: &Path, args: &[&str]) -> CoreResult<Vec<String>> {
        Ok(self
            .execute(cwd, args)?
            .into_result()?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

// ============================================================================
// Diff model
// ============================================================================

/// Input format accepted by [`parse_diff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffFormat {
    /// `git diff` patch text
    Unified,
    /// `git diff --numstat` output
    NumStat,
}

/// Line counts for one changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}

impl FileChange {
    pub fn new(path: impl Into<String>, additions: u64, deletions: u64) -> Self {
        Self {
            path: path.into(),
            additions,
            deletions,
            changes: additions + deletions,
        }
    }
}

/// Aggregate counts over a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffTotals {
    pub files: usize,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}

/// Parsed diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub files: Vec<FileChange>,
    pub totals: DiffTotals,
}

impl DiffSummary {
    /// Build a summary from per-file changes, merging duplicate paths.
    pub fn from_files(files: Vec<FileChange>) -> Self {
        let mut merged: Vec<FileChange> = Vec::with_capacity(files.len());
        for file in files {
            match merged.iter_mut().find(|f| f.path == file.path) {
                Some(existing) => {
                    existing.additions += file.additions;
                    existing.deletions += file.deletions;
                    existing.changes = existing.additions + existing.deletions;
                }
                None => merged.push(file),
            }
        }

        let totals = DiffTotals {
            files: merged.len(),
            additions: merged.iter().map(|f| f.additions).sum(),
            deletions: merged.iter().map(|f| f.deletions).sum(),
            changes: merged.iter().map(|f| f.changes).sum(),
        };
        Self {
            files: merged,
            totals,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Changed paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.iter().map(|f| f.path.clone()).collect();
        paths.sort();
        paths
    }
}

/// Diff plus the commit subjects that accompany it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    pub diff: DiffSummary,
    pub commit_messages: Vec<String>,
}

impl ChangeSummary {
    pub fn new(diff: DiffSummary, commit_messages: Vec<String>) -> Self {
        Self {
            diff,
            commit_messages,
        }
    }
}

// ============================================================================
// Diff parsing
// ============================================================================

/// Parse diff text. Never fails; unparsable hunks are skipped.
pub fn parse_diff(diff_text: &str, format: DiffFormat) -> DiffSummary {
    match format {
        DiffFormat::Unified => parse_unified(diff_text),
        DiffFormat::NumStat => parse_numstat(diff_text),
    }
}

/// In-progress hunk. Counts are only committed to the file if every line in
/// the hunk was well-formed.
struct HunkState {
    additions: u64,
    deletions: u64,
    remaining_old: u32,
    remaining_new: u32,
    valid: bool,
}

impl HunkState {
    fn is_complete(&self) -> bool {
        self.remaining_old == 0 && self.remaining_new == 0
    }
}

fn parse_unified(diff_text: &str) -> DiffSummary {
    let mut files: Vec<FileChange> = Vec::new();
    let mut current: Option<FileChange> = None;
    let mut hunk: Option<HunkState> = None;
    let mut saw_hunk_for_current = false;

    fn flush_hunk(hunk: &mut Option<HunkState>, current: &mut Option<FileChange>) {
        if let Some(h) = hunk.take() {
            if h.valid {
                if let Some(file) = current.as_mut() {
                    file.additions += h.additions;
                    file.deletions += h.deletions;
                    file.changes = file.additions + file.deletions;
                }
            } else {
                tracing::debug!("Skipping malformed diff hunk");
            }
        }
    }

    for line in diff_text.lines() {
        // Inside an open hunk, content lines take precedence over headers.
        if let Some(h) = hunk.as_mut() {
            if !h.is_complete() {
                match line.chars().next() {
                    Some('+') => {
                        h.additions += 1;
                        h.valid &= h.remaining_new > 0;
                        h.remaining_new = h.remaining_new.saturating_sub(1);
                        continue;
                    }
                    Some('-') => {
                        h.deletions += 1;
                        h.valid &= h.remaining_old > 0;
                        h.remaining_old = h.remaining_old.saturating_sub(1);
                        continue;
                    }
                    Some(' ') | None => {
                        h.remaining_old = h.remaining_old.saturating_sub(1);
                        h.remaining_new = h.remaining_new.saturating_sub(1);
                        continue;
                    }
                    Some('\\') => continue,
                    _ => {
                        if !line.starts_with("@@") && !line.starts_with("diff --git ") {
                            h.valid = false;
                            continue;
                        }
                    }
                }
            } else if line.starts_with('\\') {
                continue;
            }
        }

        if line.starts_with("diff --git ") {
            flush_hunk(&mut hunk, &mut current);
            if let Some(file) = current.take() {
                files.push(file);
            }
            current = Some(FileChange::new(parse_diff_header_path(line), 0, 0));
            saw_hunk_for_current = false;
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            flush_hunk(&mut hunk, &mut current);
            let path = strip_diff_prefix(rest);
            if path == "/dev/null" {
                continue;
            }
            match current.as_mut() {
                Some(file) if !saw_hunk_for_current => file.path = path,
                _ => {
                    if let Some(file) = current.take() {
                        files.push(file);
                    }
                    current = Some(FileChange::new(path, 0, 0));
                    saw_hunk_for_current = false;
                }
            }
        } else if line.starts_with("--- ") {
            flush_hunk(&mut hunk, &mut current);
        } else if line.starts_with("@@") {
            flush_hunk(&mut hunk, &mut current);
            if current.is_none() {
                continue;
            }
            saw_hunk_for_current = true;
            hunk = Some(match parse_hunk_header(line) {
                Some((old_count, new_count)) => HunkState {
                    additions: 0,
                    deletions: 0,
                    remaining_old: old_count,
                    remaining_new: new_count,
                    valid: true,
                },
                None => HunkState {
                    additions: 0,
                    deletions: 0,
                    // Consume lines until the next header.
                    remaining_old: u32::MAX,
                    remaining_new: u32::MAX,
                    valid: false,
                },
            });
        }
    }

    flush_hunk(&mut hunk, &mut current);
    if let Some(file) = current.take() {
        files.push(file);
    }

    DiffSummary::from_files(files)
}

fn parse_numstat(diff_text: &str) -> DiffSummary {
    let mut files = Vec::new();
    for line in diff_text.lines() {
        let mut parts = line.splitn(3, '\t');
        let (Some(adds), Some(dels), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            if !line.trim().is_empty() {
                tracing::debug!(line, "Skipping malformed numstat line");
            }
            continue;
        };

        // Binary files report "-" for both counts.
        let parse_count = |s: &str| -> Option<u64> {
            if s == "-" {
                Some(0)
            } else {
                s.trim().parse().ok()
            }
        };
        match (parse_count(adds), parse_count(dels)) {
            (Some(a), Some(d)) => files.push(FileChange::new(resolve_rename_path(path.trim()), a, d)),
            _ => tracing::debug!(line, "Skipping numstat line with invalid counts"),
        }
    }
    DiffSummary::from_files(files)
}

/// "diff --git a/path b/path" -> "path"
fn parse_diff_header_path(line: &str) -> String {
    if let Some((_, b_part)) = line.rsplit_once(" b/") {
        b_part.to_string()
    } else {
        line.trim_start_matches("diff --git ").to_string()
    }
}

fn strip_diff_prefix(path: &str) -> String {
    let path = path.split('\t').next().unwrap_or(path).trim();
    path.strip_prefix("b/")
        .or_else(|| path.strip_prefix("a/"))
        .unwrap_or(path)
        .to_string()
}

/// Parse "@@ -old_start,old_count +new_start,new_count @@" into the counts.
///
/// Omitted counts default to 1, as in the unified diff format.
fn parse_hunk_header(line: &str) -> Option<(u32, u32)> {
    let content = line.strip_prefix("@@ ")?;
    let end = content.find(" @@")?;
    let mut old_count = None;
    let mut new_count = None;

    for part in content[..end].split_whitespace() {
        let parse_range = |range: &str| -> Option<u32> {
            let mut nums = range.split(',');
            nums.next()?.parse::<u32>().ok()?;
            match nums.next() {
                Some(count) => count.parse().ok(),
                None => Some(1),
            }
        };
        if let Some(old) = part.strip_prefix('-') {
            old_count = Some(parse_range(old)?);
        } else if let Some(new) = part.strip_prefix('+') {
            new_count = Some(parse_range(new)?);
        } else {
            return None;
        }
    }

    Some((old_count?, new_count?))
}

/// "src/{old => new}/a.rs" -> "src/new/a.rs"; "a.rs => b.rs" -> "b.rs"
fn resolve_rename_path(path: &str) -> String {
    if let (Some(open), Some(close)) = (path.find('{'), path.find('}')) {
        if open < close {
            let inner = &path[open + 1..close];
            if let Some((_, new)) = inner.split_once(" => ") {
                let joined = format!("{}{}{}", &path[..open], new, &path[close + 1..]);
                return joined.replace("//", "/");
            }
        }
    }
    match path.split_once(" => ") {
        Some((_, new)) => new.to_string(),
        None => path.to_string(),
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Classification bucket for a changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeBucket {
    Tests,
    Config,
    Backend,
    Frontend,
}

/// Changed paths grouped by bucket. Each path appears in exactly one list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileClassification {
    pub frontend: Vec<String>,
    pub backend: Vec<String>,
    pub tests: Vec<String>,
    pub config: Vec<String>,
    /// Paths matching no bucket (docs, assets, unknown)
    pub other: Vec<String>,
}

impl FileClassification {
    pub fn total(&self) -> usize {
        self.frontend.len() + self.backend.len() + self.tests.len() + self.config.len() + self.other.len()
    }
}

const FRONTEND_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "vue", "svelte", "css", "scss", "sass", "less", "html",
];
const BACKEND_EXTENSIONS: &[&str] = &[
    "py", "go", "rs", "java", "kt", "rb", "php", "cs", "sql", "ex", "exs", "scala",
];
const FRONTEND_DIRS: &[&str] = &["frontend", "web", "client", "ui", "components", "pages", "public"];
const BACKEND_DIRS: &[&str] = &["backend", "server", "api", "services", "migrations"];
const CONFIG_FILENAMES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "pyproject.toml",
    "setup.py",
    "setup.cfg",
    "requirements.txt",
    "cargo.toml",
    "cargo.lock",
    "go.mod",
    "go.sum",
    "dockerfile",
    "docker-compose.yml",
    "docker-compose.yaml",
    "makefile",
    ".gitignore",
    ".editorconfig",
];
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "ini", "cfg", "conf", "tf", "tfvars"];
const DOC_EXTENSIONS: &[&str] = &["md", "mdx", "rst", "txt", "adoc"];

fn segments(path: &str) -> Vec<String> {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect()
}

fn file_name(path: &str) -> String {
    segments(path).pop().unwrap_or_default()
}

fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        None
    } else {
        Some(ext.to_string())
    }
}

fn is_test_path(path: &str) -> bool {
    let segs = segments(path);
    let name = segs.last().cloned().unwrap_or_default();
    let dirs = &segs[..segs.len().saturating_sub(1)];
    dirs.iter()
        .any(|d| d == "tests" || d == "test" || d == "__tests__" || d == "spec" || d == "e2e")
        || name.contains(".test.")
        || name.contains(".spec.")
        || (name.starts_with("test_") && name.ends_with(".py"))
        || name.ends_with("_test.py")
        || name.ends_with("_test.go")
        || name.ends_with("_test.rs")
        || name == "conftest.py"
}

fn is_config_path(path: &str) -> bool {
    let segs = segments(path);
    let name = segs.last().cloned().unwrap_or_default();
    if CONFIG_FILENAMES.contains(&name.as_str())
        || name.starts_with(".env")
        || name.starts_with("tsconfig")
        || name.starts_with(".eslintrc")
        || name.starts_with(".prettierrc")
        || name.ends_with(".config.js")
        || name.ends_with(".config.ts")
        || name.starts_with("dockerfile")
    {
        return true;
    }
    if segs.iter().any(|s| s == ".github" || s == ".gitlab" || s == ".circleci") {
        return true;
    }
    extension(path)
        .map(|ext| CONFIG_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn is_backend_path(path: &str) -> bool {
    let segs = segments(path);
    let dirs = &segs[..segs.len().saturating_sub(1)];
    if dirs.iter().any(|d| BACKEND_DIRS.contains(&d.as_str())) {
        return true;
    }
    if dirs.iter().any(|d| FRONTEND_DIRS.contains(&d.as_str())) {
        return false;
    }
    extension(path)
        .map(|ext| BACKEND_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn is_frontend_path(path: &str) -> bool {
    let segs = segments(path);
    let dirs = &segs[..segs.len().saturating_sub(1)];
    if dirs.iter().any(|d| FRONTEND_DIRS.contains(&d.as_str()))
        && !extension(path)
            .map(|e| DOC_EXTENSIONS.contains(&e.as_str()))
            .unwrap_or(false)
    {
        return true;
    }
    extension(path)
        .map(|ext| FRONTEND_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Bucket for a single path, by fixed priority tests > config > backend > frontend.
pub fn classify_path(path: &str) -> Option<ChangeBucket> {
    if is_test_path(path) {
        Some(ChangeBucket::Tests)
    } else if is_config_path(path) {
        Some(ChangeBucket::Config)
    } else if is_backend_path(path) {
        Some(ChangeBucket::Backend)
    } else if is_frontend_path(path) {
        Some(ChangeBucket::Frontend)
    } else {
        None
    }
}

/// Whether the path is documentation.
pub fn is_doc_path(path: &str) -> bool {
    segments(path).iter().any(|s| s == "docs" || s == "doc")
        || extension(path)
            .map(|ext| DOC_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
}

/// Whether the path looks like infrastructure (containers, CI, IaC).
pub fn is_infra_path(path: &str) -> bool {
    let segs = segments(path);
    let name = segs.last().cloned().unwrap_or_default();
    name.starts_with("dockerfile")
        || name.starts_with("docker-compose")
        || segs.iter().any(|s| {
            matches!(
                s.as_str(),
                ".github" | ".gitlab" | ".circleci" | "infra" | "infrastructure" | "deploy" | "k8s" | "helm" | "terraform"
            )
        })
        || extension(path).map(|e| e == "tf" || e == "tfvars").unwrap_or(false)
}

const SECURITY_MARKERS: &[&str] = &[
    "auth", "security", "crypto", "secret", "password", "token", "oauth", "jwt", "permission",
];

/// Whether the path touches authentication, secrets, or cryptography.
pub fn is_security_sensitive(path: &str) -> bool {
    segments(path)
        .iter()
        .any(|s| SECURITY_MARKERS.iter().any(|m| s.contains(m)))
}

fn is_core_path(path: &str) -> bool {
    segments(path)
        .iter()
        .any(|s| s == "core" || s == "kernel" || s == "shared" || s == "common")
}

/// Map a path to the technology it implies, if any.
pub fn technology_for_path(path: &str) -> Option<&'static str> {
    let name = file_name(path);
    if name.starts_with("dockerfile") {
        return Some("docker");
    }
    if segments(path).iter().any(|s| s == ".github") && (name.ends_with(".yml") || name.ends_with(".yaml")) {
        return Some("github-actions");
    }
    match extension(path)?.as_str() {
        "ts" | "tsx" => Some("typescript"),
        "js" | "jsx" | "mjs" | "cjs" => Some("javascript"),
        "vue" => Some("vue"),
        "svelte" => Some("svelte"),
        "css" | "scss" | "sass" | "less" => Some("css"),
        "html" => Some("html"),
        "py" => Some("python"),
        "rs" => Some("rust"),
        "go" => Some("go"),
        "java" | "kt" => Some("jvm"),
        "rb" => Some("ruby"),
        "php" => Some("php"),
        "sql" => Some("sql"),
        "tf" | "tfvars" => Some("terraform"),
        "md" | "mdx" | "rst" => Some("markdown"),
        "yml" | "yaml" => Some("yaml"),
        _ => None,
    }
}

/// Bucket every changed file. Deterministic: ties are broken by bucket priority
/// and each list preserves input order.
pub fn classify_file_changes(files: &[FileChange]) -> FileClassification {
    let mut classification = FileClassification::default();
    for file in files {
        let path = file.path.clone();
        match classify_path(&file.path) {
            Some(ChangeBucket::Tests) => classification.tests.push(path),
            Some(ChangeBucket::Config) => classification.config.push(path),
            Some(ChangeBucket::Backend) => classification.backend.push(path),
            Some(ChangeBucket::Frontend) => classification.frontend.push(path),
            None => classification.other.push(path),
        }
    }
    classification
}

// ============================================================================
// Complexity / impact
// ============================================================================

/// Weighted complexity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityAnalysis {
    pub score: f64,
    pub level: ComplexityLevel,
    pub line_score: f64,
    pub file_score: f64,
    pub path_score: f64,
}

impl ComplexityAnalysis {
    pub const LOW_THRESHOLD: f64 = 5.0;
    pub const HIGH_THRESHOLD: f64 = 8.0;

    /// Bucket a score: < 5 low, 5..=8 medium, > 8 high.
    pub fn level_for(score: f64) -> ComplexityLevel {
        if score < Self::LOW_THRESHOLD {
            ComplexityLevel::Low
        } else if score <= Self::HIGH_THRESHOLD {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::High
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score a diff from its line deltas, file count, and core/security paths.
pub fn analyze_complexity(summary: &DiffSummary) -> ComplexityAnalysis {
    let line_score = (summary.totals.changes as f64 / 50.0).min(5.0);
    let file_score = (summary.totals.files as f64 * 0.5).min(4.0);

    let sensitive = summary
        .files
        .iter()
        .filter(|f| is_security_sensitive(&f.path))
        .count() as f64;
    let core = summary
        .files
        .iter()
        .filter(|f| is_core_path(&f.path))
        .count() as f64;
    let path_score = (sensitive * 1.5 + core * 0.5).min(3.0);

    let score = round2(line_score + file_score + path_score);
    ComplexityAnalysis {
        score,
        level: ComplexityAnalysis::level_for(score),
        line_score: round2(line_score),
        file_score: round2(file_score),
        path_score: round2(path_score),
    }
}

/// Risk assessment for a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAssessment {
    pub risk: RiskLevel,
    pub security_sensitive: bool,
    pub sensitive_paths: Vec<String>,
    pub reasons: Vec<String>,
}

/// Derive risk from complexity, escalating when security-sensitive paths change.
pub fn assess_impact(summary: &DiffSummary, complexity: &ComplexityAnalysis) -> ImpactAssessment {
    let mut sensitive_paths: Vec<String> = summary
        .files
        .iter()
        .filter(|f| is_security_sensitive(&f.path))
        .map(|f| f.path.clone())
        .collect();
    sensitive_paths.sort();

    let mut reasons = vec![format!("complexity {} (score {:.2})", complexity.level, complexity.score)];
    let base = match complexity.level {
        ComplexityLevel::Low => RiskLevel::Low,
        ComplexityLevel::Medium => RiskLevel::Medium,
        ComplexityLevel::High => RiskLevel::High,
    };

    let security_sensitive = !sensitive_paths.is_empty();
    let risk = if security_sensitive && complexity.level == ComplexityLevel::High {
        reasons.push("high complexity in security-sensitive paths".to_string());
        RiskLevel::Critical
    } else if security_sensitive {
        reasons.push(format!("{} security-sensitive path(s) changed", sensitive_paths.len()));
        base.escalate()
    } else {
        base
    };

    ImpactAssessment {
        risk,
        security_sensitive,
        sensitive_paths,
        reasons,
    }
}

// ============================================================================
// Conflict prediction
// ============================================================================

/// Predicted merge-conflict severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    None,
    Low,
    Medium,
    High,
}

/// Advisory overlap prediction between the working branch and a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictPrediction {
    pub target_branch: Option<String>,
    pub overlapping_files: Vec<String>,
    pub overlapping_lines: u64,
    pub severity: ConflictSeverity,
    /// Always true: predictions never block a run
    pub advisory: bool,
}

/// Tunable thresholds for conflict severity.
pub const CONFLICT_MEDIUM_LINES: u64 = 20;
pub const CONFLICT_HIGH_LINES: u64 = 100;

/// Predict overlap between two diffs taken from a common merge base.
///
/// Severity is monotone in the number of overlapping changed lines.
pub fn detect_conflicts(working: &DiffSummary, target: &DiffSummary) -> ConflictPrediction {
    let target_changes: BTreeMap<&str, u64> = target
        .files
        .iter()
        .map(|f| (f.path.as_str(), f.changes))
        .collect();

    let mut overlapping_files = Vec::new();
    let mut overlapping_lines = 0u64;
    for file in &working.files {
        if let Some(theirs) = target_changes.get(file.path.as_str()) {
            overlapping_files.push(file.path.clone());
            overlapping_lines += file.changes.min(*theirs);
        }
    }
    overlapping_files.sort();

    let severity = if overlapping_files.is_empty() {
        ConflictSeverity::None
    } else if overlapping_lines < CONFLICT_MEDIUM_LINES {
        ConflictSeverity::Low
    } else if overlapping_lines < CONFLICT_HIGH_LINES {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::High
    };

    ConflictPrediction {
        target_branch: None,
        overlapping_files,
        overlapping_lines,
        severity,
        advisory: true,
    }
}

// ============================================================================
// GitIntegrator
// ============================================================================

/// Collects change information from a git working tree.
///
/// Every collector degrades to an empty value when git is unavailable or the
/// directory is not a repository.
#[derive(Debug, Clone)]
pub struct GitIntegrator {
    repo_path: PathBuf,
    git: GitOps,
}

impl GitIntegrator {
    pub fn new(repo_path: impl AsRef<Path>) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            git: GitOps::new(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn is_repository(&self) -> bool {
        self.git
            .output(&self.repo_path, &["rev-parse", "--is-inside-work-tree"])
            .map(|out| out == "true")
            .unwrap_or(false)
    }

    /// Current branch name; `None` on detached HEAD or outside a repository.
    pub fn current_branch(&self) -> Option<String> {
        let branch = self
            .git
            .output(&self.repo_path, &["rev-parse", "--abbrev-ref", "HEAD"])
            .ok()?;
        if branch.is_empty() || branch == "HEAD" {
            None
        } else {
            Some(branch)
        }
    }

    /// Working tree + index diff against HEAD, as numstat.
    pub fn working_diff(&self) -> DiffSummary {
        let text = self
            .git
            .output(&self.repo_path, &["diff", "HEAD", "--numstat"])
            // Repositories without commits have no HEAD; fall back to the index.
            .or_else(|_| self.git.output(&self.repo_path, &["diff", "--cached", "--numstat"]));
        match text {
            Ok(text) => parse_diff(&text, DiffFormat::NumStat),
            Err(e) => {
                tracing::debug!("No working diff available: {}", e);
                DiffSummary::default()
            }
        }
    }

    /// Subjects of the most recent commits, newest first.
    pub fn recent_commit_subjects(&self, limit: usize) -> Vec<String> {
        let count = format!("-n{}", limit);
        self.git
            .lines(&self.repo_path, &["log", &count, "--format=%s"])
            .unwrap_or_default()
    }

    /// Diff + recent commit subjects.
    pub fn collect_changes(&self) -> ChangeSummary {
        if !self.is_repository() {
            tracing::info!(path = %self.repo_path.display(), "Not a git repository; using empty change set");
            return ChangeSummary::default();
        }
        ChangeSummary::new(self.working_diff(), self.recent_commit_subjects(5))
    }

    /// Predict conflicts between the working tree and `target_branch`.
    ///
    /// Returns `None` when the target cannot be resolved.
    pub fn predict_conflicts(&self, target_branch: &str) -> Option<ConflictPrediction> {
        let base = self
            .git
            .output(&self.repo_path, &["merge-base", "HEAD", target_branch])
            .ok()?;
        let target_range = format!("{}..{}", base, target_branch);
        let theirs = self
            .git
            .output(&self.repo_path, &["diff", "--numstat", &target_range])
            .ok()?;
        let ours = self
            .git
            .output(&self.repo_path, &["diff", "--numstat", &base])
            .ok()?;

        let mut prediction = detect_conflicts(
            &parse_diff(&ours, DiffFormat::NumStat),
            &parse_diff(&theirs, DiffFormat::NumStat),
        );
        prediction.target_branch = Some(target_branch.to_string());
        Some(prediction)
    }
}

// ============================================================================
// Tests
// ============================================================================
