//! Quality Dimensions
//!
//! A dimension is one named quality axis (formatting, linting, testing, ...).
//! The context mapper assigns each dimension a [`Priority`] and an ordered
//! list of candidate tools, producing a [`DimensionMap`].

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Quality dimension, in declaration order.
///
/// Declaration order is significant: it is the tie-breaker when flattening a
/// dimension map into an ordered tool list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    Formatting,
    ErrorDetection,
    TestingCoverage,
    SecurityAudit,
    BuildVerification,
    DesignMetrics,
    DataCompatibility,
}

impl Dimension {
    /// Every dimension in declaration order.
    pub const ALL: [Dimension; 7] = [
        Dimension::Formatting,
        Dimension::ErrorDetection,
        Dimension::TestingCoverage,
        Dimension::SecurityAudit,
        Dimension::BuildVerification,
        Dimension::DesignMetrics,
        Dimension::DataCompatibility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Formatting => "formatting",
            Dimension::ErrorDetection => "error-detection",
            Dimension::TestingCoverage => "testing-coverage",
            Dimension::SecurityAudit => "security-audit",
            Dimension::BuildVerification => "build-verification",
            Dimension::DesignMetrics => "design-metrics",
            Dimension::DataCompatibility => "data-compatibility",
        }
    }

    /// Short CLI name (`--dimension lint`).
    pub fn cli_name(&self) -> &'static str {
        match self {
            Dimension::Formatting => "format",
            Dimension::ErrorDetection => "lint",
            Dimension::TestingCoverage => "test",
            Dimension::SecurityAudit => "security",
            Dimension::BuildVerification => "build",
            Dimension::DesignMetrics => "design-metrics",
            Dimension::DataCompatibility => "data-compatibility",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == normalized || d.cli_name() == normalized)
            .ok_or_else(|| CoreError::parse(format!("unknown dimension '{}'", s)))
    }
}

/// Priority of a dimension for the current run.
///
/// Variants are declared lowest-first so that `Ord`/`max` express promotion:
/// `Priority::High.max(p)` raises `p` to at least high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Skip,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Skip => "skip",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn is_active(&self) -> bool {
        *self != Priority::Skip
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Priority::Skip),
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(CoreError::parse(format!("unknown priority '{}'", other))),
        }
    }
}

/// Mapping outcome for a single dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionEntry {
    pub priority: Priority,
    /// Candidate tool names, in preference order
    pub tools: Vec<String>,
    pub activated: bool,
    /// Human-readable explanation of how the priority was reached
    pub reason: String,
}

impl DimensionEntry {
    pub fn new(priority: Priority, tools: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            priority,
            tools,
            activated: priority.is_active(),
            reason: reason.into(),
        }
    }
}

/// Per-dimension priorities and candidate tools for one run.
///
/// Iteration follows dimension declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMap {
    entries: BTreeMap<Dimension, DimensionEntry>,
}

impl DimensionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dimension: Dimension, entry: DimensionEntry) {
        self.entries.insert(dimension, entry);
    }

    pub fn get(&self, dimension: Dimension) -> Option<&DimensionEntry> {
        self.entries.get(&dimension)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &DimensionEntry)> {
        self.entries.iter().map(|(d, e)| (*d, e))
    }

    /// Activated dimensions only, in declaration order.
    pub fn activated(&self) -> impl Iterator<Item = (Dimension, &DimensionEntry)> {
        self.iter().filter(|(_, e)| e.activated)
    }

    pub fn has_activated(&self) -> bool {
        self.activated().next().is_some()
    }

    pub fn priority_of(&self, dimension: Dimension) -> Priority {
        self.get(dimension)
            .map(|e| e.priority)
            .unwrap_or(Priority::Skip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
