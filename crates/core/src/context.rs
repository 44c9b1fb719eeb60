//! Run Context
//!
//! The immutable classification of "what kind of change is this" that drives
//! every later planning decision. A `Context` is produced once per run by the
//! context detector and only ever read afterward.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Kind of change under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Feature,
    Bugfix,
    Security,
    Hotfix,
    Release,
    Unknown,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Feature => "feature",
            ChangeType::Bugfix => "bugfix",
            ChangeType::Security => "security",
            ChangeType::Hotfix => "hotfix",
            ChangeType::Release => "release",
            ChangeType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feature" | "feat" => Ok(ChangeType::Feature),
            "bugfix" | "fix" | "bug" => Ok(ChangeType::Bugfix),
            "security" | "sec" => Ok(ChangeType::Security),
            "hotfix" => Ok(ChangeType::Hotfix),
            "release" => Ok(ChangeType::Release),
            "unknown" => Ok(ChangeType::Unknown),
            other => Err(CoreError::parse(format!("unknown change type '{}'", other))),
        }
    }
}

/// Part of the source tree a change (or a tool) is concerned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Frontend,
    Backend,
    #[serde(alias = "infra")]
    Infrastructure,
    Docs,
    Mixed,
    All,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Frontend => "frontend",
            Scope::Backend => "backend",
            Scope::Infrastructure => "infrastructure",
            Scope::Docs => "docs",
            Scope::Mixed => "mixed",
            Scope::All => "all",
        }
    }

    /// Whether a tool declared for `tool_scope` is relevant to work in `self`.
    ///
    /// `All`/`Mixed` contexts accept every tool; `All`-scoped tools apply to
    /// every context.
    pub fn accepts(&self, tool_scope: Scope) -> bool {
        matches!(self, Scope::All | Scope::Mixed) || tool_scope == Scope::All || *self == tool_scope
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frontend" => Ok(Scope::Frontend),
            "backend" => Ok(Scope::Backend),
            "infrastructure" | "infra" => Ok(Scope::Infrastructure),
            "docs" => Ok(Scope::Docs),
            "mixed" => Ok(Scope::Mixed),
            "all" => Ok(Scope::All),
            other => Err(CoreError::parse(format!("unknown scope '{}'", other))),
        }
    }
}

/// Complexity bucket computed from the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl Default for ComplexityLevel {
    fn default() -> Self {
        ComplexityLevel::Low
    }
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplexityLevel::Low => write!(f, "low"),
            ComplexityLevel::Medium => write!(f, "medium"),
            ComplexityLevel::High => write!(f, "high"),
        }
    }
}

/// Risk level assigned by impact assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// One step up, saturating at `Critical`.
    pub fn escalate(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
            RiskLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Which independent classification signals fired, and what each one said.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSignals {
    /// Type implied by the branch-name prefix
    pub branch: Option<ChangeType>,
    /// Type implied by commit-message keywords
    pub commit: Option<ChangeType>,
    /// Type implied by changed-path classification
    pub paths: Option<ChangeType>,
}

impl ContextSignals {
    /// All signals that fired, in precedence order.
    pub fn fired(&self) -> Vec<ChangeType> {
        [self.branch, self.commit, self.paths]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Immutable per-run classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Kind of change
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Part of the tree the change concerns
    pub scope: Scope,
    /// Languages/frameworks touched (sorted)
    pub technologies: BTreeSet<String>,
    /// Confidence in `change_type`, in [0, 1]
    pub confidence: f64,
    /// Added + deleted lines
    pub lines_changed: u64,
    /// Number of files in the diff
    pub files_affected: usize,
    /// Changed paths (sorted, repository-relative)
    pub changed_paths: Vec<String>,
    pub complexity: ComplexityLevel,
    pub risk: RiskLevel,
    /// Branch name, when known (absent for detached HEAD)
    pub branch: Option<String>,
    pub signals: ContextSignals,
}

impl Context {
    /// Confidence used when no signal is available.
    pub const DEFAULT_CONFIDENCE: f64 = 0.3;

    /// The built-in default context: unknown change over the whole tree.
    pub fn fallback(technologies: BTreeSet<String>) -> Self {
        Self {
            change_type: ChangeType::Unknown,
            scope: Scope::All,
            technologies,
            confidence: Self::DEFAULT_CONFIDENCE,
            lines_changed: 0,
            files_affected: 0,
            changed_paths: Vec::new(),
            complexity: ComplexityLevel::Low,
            risk: RiskLevel::Low,
            branch: None,
            signals: ContextSignals::default(),
        }
    }

    /// Whether any changed path matches the predicate.
    pub fn touches(&self, predicate: impl Fn(&str) -> bool) -> bool {
        self.changed_paths.iter().any(|p| predicate(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parsing_accepts_infra_alias() {
        assert_eq!("infra".parse::<Scope>().unwrap(), Scope::Infrastructure);
        assert_eq!("Infrastructure".parse::<Scope>().unwrap(), Scope::Infrastructure);
        assert!("cloud".parse::<Scope>().is_err());
    }

    #[test]
    fn test_scope_accepts() {
        assert!(Scope::Frontend.accepts(Scope::Frontend));
        assert!(Scope::Frontend.accepts(Scope::All));
        assert!(!Scope::Frontend.accepts(Scope::Backend));
        assert!(Scope::Mixed.accepts(Scope::Backend));
        assert!(Scope::All.accepts(Scope::Infrastructure));
    }

    #[test]
    fn test_risk_escalation_saturates() {
        assert_eq!(RiskLevel::Low.escalate(), RiskLevel::Medium);
        assert_eq!(RiskLevel::High.escalate(), RiskLevel::Critical);
        assert_eq!(RiskLevel::Critical.escalate(), RiskLevel::Critical);
    }

    #[test]
    fn test_fallback_context() {
        let ctx = Context::fallback(BTreeSet::new());
        assert_eq!(ctx.change_type, ChangeType::Unknown);
        assert_eq!(ctx.scope, Scope::All);
        assert_eq!(ctx.confidence, Context::DEFAULT_CONFIDENCE);
        assert!(ctx.signals.fired().is_empty());
    }

    #[test]
    fn test_context_serializes_type_field() {
        let ctx = Context::fallback(BTreeSet::new());
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["type"], "unknown");
        assert_eq!(json["scope"], "all");
        assert_eq!(json["linesChanged"], 0);
    }
}
