//! Configuration File
//!
//! `qa-config.json` model. Every field has a default, so a partial file only
//! overrides what it names. Keys are camelCase.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use qa_cascade_core::{CoreError, CoreResult, Dimension, Priority, RetryPolicy};

/// Default config file name, resolved relative to the project root.
pub const DEFAULT_CONFIG_FILE: &str = "qa-config.json";

/// Per-tool overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolOverride {
    /// `false` removes the tool from every plan
    pub enabled: Option<bool>,
    pub timeout_seconds: Option<u64>,
    /// Replaces the catalog's base arguments
    pub args: Option<Vec<String>>,
    /// Appended after all computed arguments
    pub extra_args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub retries: Option<RetryPolicy>,
}

impl ToolOverride {
    pub fn is_disabled(&self) -> bool {
        self.enabled == Some(false)
    }
}

/// Path-glob rule forcing a dimension's priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRule {
    /// Globs matched against changed paths
    pub paths: Vec<String>,
    pub dimension: Dimension,
    pub priority: Priority,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Per-dimension defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DimensionDefaults {
    /// Minimum priority whenever the dimension has candidate tools
    pub priority: Option<Priority>,
    /// Coverage percentage injected into DoD test arguments
    pub coverage_threshold: Option<u32>,
}

/// Execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionSettings {
    pub max_concurrency: usize,
    pub walk_depth: usize,
}

impl ExecutionSettings {
    pub const DEFAULT_CONCURRENCY: usize = 4;
    pub const DEFAULT_WALK_DEPTH: usize = 8;
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_concurrency: Self::DEFAULT_CONCURRENCY,
            walk_depth: Self::DEFAULT_WALK_DEPTH,
        }
    }
}

/// Parsed `qa-config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QaConfig {
    pub tools: BTreeMap<String, ToolOverride>,
    pub activation_rules: Vec<ActivationRule>,
    pub dimensions: BTreeMap<Dimension, DimensionDefaults>,
    pub execution: ExecutionSettings,
}

impl QaConfig {
    pub const DEFAULT_COVERAGE_THRESHOLD: u32 = 80;

    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file; using built-in defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| CoreError::config(format!("Invalid {}: {}", path.display(), e)))
    }

    /// Load a config file, falling back to defaults with a warning when the
    /// file is unreadable or malformed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; falling back to built-in defaults", e);
                Self::default()
            }
        }
    }

    pub fn from_json(content: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.execution.max_concurrency == 0 {
            return Err(CoreError::validation("execution.maxConcurrency must be at least 1"));
        }
        for rule in &self.activation_rules {
            for pattern in &rule.paths {
                glob::Pattern::new(pattern).map_err(|e| {
                    CoreError::validation(format!("invalid activation glob '{}': {}", pattern, e))
                })?;
            }
        }
        Ok(())
    }

    pub fn tool(&self, name: &str) -> Option<&ToolOverride> {
        self.tools.get(name)
    }

    pub fn is_tool_disabled(&self, name: &str) -> bool {
        self.tool(name).map(ToolOverride::is_disabled).unwrap_or(false)
    }

    pub fn coverage_threshold(&self) -> u32 {
        self.dimensions
            .get(&Dimension::TestingCoverage)
            .and_then(|d| d.coverage_threshold)
            .unwrap_or(Self::DEFAULT_COVERAGE_THRESHOLD)
    }
}
