//! Project Profile Detection
//!
//! Detects project kinds by looking for marker files (package.json,
//! Cargo.toml, pyproject.toml, go.mod) and extracts the tool hints each
//! manifest carries. Unlike a single-type detector, every marker present at the
//! root contributes, so a polyglot repository yields several kinds.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use qa_cascade_core::{CoreError, CoreResult};

/// Language ecosystem recognized from a marker file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Node,
    Python,
    Rust,
    Go,
}

impl ProjectKind {
    /// Marker files in lookup order
    pub fn markers(&self) -> &'static [&'static str] {
        match self {
            ProjectKind::Node => &["package.json"],
            ProjectKind::Python => &["pyproject.toml", "setup.py", "requirements.txt"],
            ProjectKind::Rust => &["Cargo.toml"],
            ProjectKind::Go => &["go.mod"],
        }
    }

    /// Technology tag contributed to the run context
    pub fn technology(&self) -> &'static str {
        match self {
            ProjectKind::Node => "javascript",
            ProjectKind::Python => "python",
            ProjectKind::Rust => "rust",
            ProjectKind::Go => "go",
        }
    }
}

/// Metadata extracted from one manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Tool names the manifest declares or configures (eslint, ruff, ...)
    pub tool_hints: BTreeSet<String>,
    pub test_framework: Option<String>,
    /// Package scripts (package.json `scripts` keys)
    pub scripts: BTreeSet<String>,
}

/// Everything detected about the project at `root`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProfile {
    pub root: PathBuf,
    pub kinds: BTreeSet<ProjectKind>,
    /// Merged metadata across all manifests
    pub metadata: ProjectMetadata,
    pub has_typescript: bool,
    pub has_ci: bool,
}

impl ProjectProfile {
    /// Technology tags implied by the detected kinds and hints.
    pub fn technologies(&self) -> BTreeSet<String> {
        let mut techs: BTreeSet<String> = self
            .kinds
            .iter()
            .map(|k| k.technology().to_string())
            .collect();
        if self.has_typescript {
            techs.insert("typescript".to_string());
        }
        techs
    }

    pub fn has_kind(&self, kind: ProjectKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn has_hint(&self, tool: &str) -> bool {
        self.metadata.tool_hints.contains(tool)
    }

    pub fn has_script(&self, script: &str) -> bool {
        self.metadata.scripts.contains(script)
    }
}

/// Project profile detector
pub struct ProjectDetector {
    project_path: PathBuf,
}

impl ProjectDetector {
    pub fn new(project_path: impl AsRef<Path>) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
        }
    }

    /// Detect the project profile.
    ///
    /// A manifest that fails to parse still registers its kind; only its
    /// metadata is lost.
    pub fn detect(&self) -> ProjectProfile {
        let mut profile = ProjectProfile {
            root: self.project_path.clone(),
            ..Default::default()
        };

        for kind in [
            ProjectKind::Node,
            ProjectKind::Python,
            ProjectKind::Rust,
            ProjectKind::Go,
        ] {
            let Some(marker_path) = kind
                .markers()
                .iter()
                .map(|m| self.project_path.join(m))
                .find(|p| p.exists())
            else {
                continue;
            };

            profile.kinds.insert(kind);
            match self.extract_metadata(kind, &marker_path) {
                Ok(metadata) => merge_metadata(&mut profile.metadata, metadata),
                Err(e) => tracing::warn!(
                    marker = %marker_path.display(),
                    "Failed to read project manifest: {}",
                    e
                ),
            }
        }

        profile.has_typescript = self.project_path.join("tsconfig.json").exists()
            || profile.has_hint("typescript");
        profile.has_ci = self.project_path.join(".github/workflows").exists()
            || self.project_path.join(".gitlab-ci.yml").exists()
            || self.project_path.join(".circleci").exists();

        tracing::debug!(
            kinds = ?profile.kinds,
            hints = ?profile.metadata.tool_hints,
            "Detected project profile"
        );
        profile
    }

    fn extract_metadata(&self, kind: ProjectKind, marker_path: &Path) -> CoreResult<ProjectMetadata> {
        match kind {
            ProjectKind::Node => self.extract_node_metadata(marker_path),
            ProjectKind::Rust => self.extract_rust_metadata(marker_path),
            ProjectKind::Python => self.extract_python_metadata(marker_path),
            ProjectKind::Go => self.extract_go_metadata(marker_path),
        }
    }

    /// Extract metadata from package.json
    fn extract_node_metadata(&self, marker_path: &Path) -> CoreResult<ProjectMetadata> {
        let content = std::fs::read_to_string(marker_path)?;
        let json: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| CoreError::parse(format!("Failed to parse package.json: {}", e)))?;

        let mut metadata = ProjectMetadata {
            name: json.get("name").and_then(|v| v.as_str()).map(String::from),
            version: json.get("version").and_then(|v| v.as_str()).map(String::from),
            ..Default::default()
        };

        let declared = |name: &str| {
            ["devDependencies", "dependencies"]
                .iter()
                .any(|section| json.get(section).and_then(|d| d.get(name)).is_some())
        };

        for tool in ["typescript", "eslint", "prettier", "jest", "vitest", "mocha"] {
            if declared(tool) {
                metadata.tool_hints.insert(tool.to_string());
            }
        }
        let config_hints = [
            ("eslint", &[".eslintrc.js", ".eslintrc.json", ".eslintrc.yml", "eslint.config.js", "eslint.config.mjs"][..]),
            ("prettier", &[".prettierrc", ".prettierrc.json", "prettier.config.js"][..]),
        ];
        for (tool, files) in config_hints {
            if files.iter().any(|f| self.project_path.join(f).exists()) {
                metadata.tool_hints.insert(tool.to_string());
            }
        }

        metadata.test_framework = ["jest", "vitest", "mocha"]
            .into_iter()
            .find(|t| metadata.tool_hints.contains(*t))
            .map(String::from);

        if let Some(scripts) = json.get("scripts").and_then(|s| s.as_object()) {
            metadata.scripts = scripts.keys().cloned().collect();
        }

        Ok(metadata)
    }

    /// Extract metadata from Cargo.toml
    fn extract_rust_metadata(&self, marker_path: &Path) -> CoreResult<ProjectMetadata> {
        let content = std::fs::read_to_string(marker_path)?;
        let toml: toml::Value = content
            .parse()
            .map_err(|e| CoreError::parse(format!("Failed to parse Cargo.toml: {}", e)))?;

        let mut metadata = ProjectMetadata::default();
        if let Some(package) = toml.get("package") {
            metadata.name = package.get("name").and_then(|v| v.as_str()).map(String::from);
            metadata.version = package.get("version").and_then(|v| v.as_str()).map(String::from);
        }
        metadata.test_framework = Some("cargo test".to_string());
        metadata.tool_hints.extend(["clippy".to_string(), "rustfmt".to_string()]);
        Ok(metadata)
    }

    /// Extract metadata from Python project files
    fn extract_python_metadata(&self, marker_path: &Path) -> CoreResult<ProjectMetadata> {
        let mut metadata = ProjectMetadata::default();

        let marker_name = marker_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");

        if marker_name == "pyproject.toml" {
            let content = std::fs::read_to_string(marker_path)?;
            let toml: toml::Value = content
                .parse()
                .map_err(|e| CoreError::parse(format!("Failed to parse pyproject.toml: {}", e)))?;

            let table = toml
                .get("project")
                .or_else(|| toml.get("tool").and_then(|t| t.get("poetry")));
            if let Some(project) = table {
                metadata.name = project.get("name").and_then(|v| v.as_str()).map(String::from);
                metadata.version = project.get("version").and_then(|v| v.as_str()).map(String::from);
            }

            if let Some(tool) = toml.get("tool").and_then(|t| t.as_table()) {
                for hint in ["mypy", "ruff", "black", "pytest", "bandit", "flake8"] {
                    if tool.contains_key(hint) {
                        metadata.tool_hints.insert(hint.to_string());
                    }
                }
                if tool.contains_key("pytest") {
                    metadata.test_framework = Some("pytest".to_string());
                }
            }
        } else if marker_name == "requirements.txt" {
            let content = std::fs::read_to_string(marker_path)?;
            for line in content.lines() {
                let package = line
                    .split(|c: char| "=<>!~[; ".contains(c))
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_ascii_lowercase();
                if ["pytest", "mypy", "ruff", "black", "bandit", "alembic"].contains(&package.as_str()) {
                    metadata.tool_hints.insert(package);
                }
            }
        }

        if metadata.test_framework.is_none()
            && (self.project_path.join("tests").exists() || metadata.tool_hints.contains("pytest"))
        {
            metadata.test_framework = Some("pytest".to_string());
        }

        Ok(metadata)
    }

    /// Extract metadata from go.mod
    fn extract_go_metadata(&self, marker_path: &Path) -> CoreResult<ProjectMetadata> {
        let content = std::fs::read_to_string(marker_path)?;
        let mut metadata = ProjectMetadata::default();

        for line in content.lines() {
            if let Some(module) = line.strip_prefix("module ") {
                metadata.name = Some(module.trim().to_string());
                break;
            }
        }
        metadata.test_framework = Some("go test".to_string());
        Ok(metadata)
    }
}

fn merge_metadata(into: &mut ProjectMetadata, from: ProjectMetadata) {
    if into.name.is_none() {
        into.name = from.name;
    }
    if into.version.is_none() {
        into.version = from.version;
    }
    if into.test_framework.is_none() {
        into.test_framework = from.test_framework;
    }
    into.tool_hints.extend(from.tool_hints);
    into.scripts.extend(from.scripts);
}

/// Detect the project profile for a given path
pub fn detect_project(project_path: impl AsRef<Path>) -> ProjectProfile {
    ProjectDetector::new(project_path).detect()
}
