//! Context Detection
//!
//! Combines the branch name, the change summary and CLI flags into the one
//! immutable [`Context`] a run is planned from. Detection is a pure function
//! of its inputs plus the technologies fixed at construction.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use qa_cascade_core::{ChangeType, Context, ContextSignals, Scope};

use crate::git::{self, ChangeSummary};
use crate::project::ProjectProfile;

/// CLI-level overrides that feed detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionFlags {
    /// `--scope`: replaces the diff-derived scope
    pub scope: Option<Scope>,
    /// Forced change type (a security DoD run implies `security`)
    pub change_type: Option<ChangeType>,
}

const BRANCH_WEIGHT: f64 = 0.4;
const COMMIT_WEIGHT: f64 = 0.25;
const PATH_WEIGHT: f64 = 0.15;
const AGREEMENT_STEP: f64 = 0.15;
const MIN_CONFIDENCE: f64 = 0.05;

/// Builds run contexts.
#[derive(Debug, Clone, Default)]
pub struct ContextDetector {
    technologies: BTreeSet<String>,
}

impl ContextDetector {
    pub fn new(profile: &ProjectProfile) -> Self {
        Self {
            technologies: profile.technologies(),
        }
    }

    pub fn with_technologies(technologies: BTreeSet<String>) -> Self {
        Self { technologies }
    }

    /// Classify a change.
    ///
    /// Type precedence is branch pattern, then commit keywords, then path
    /// heuristics, then `unknown`. Scope always comes from the diff unless
    /// overridden by flags.
    pub fn detect(&self, branch: Option<&str>, changes: &ChangeSummary, flags: &DetectionFlags) -> Context {
        let diff = &changes.diff;
        let mut technologies = self.technologies.clone();
        technologies.extend(
            diff.files
                .iter()
                .filter_map(|f| git::technology_for_path(&f.path))
                .map(String::from),
        );

        let signals = ContextSignals {
            branch: branch.and_then(type_from_branch),
            commit: type_from_commits(&changes.commit_messages),
            paths: type_from_paths(diff.files.iter().map(|f| f.path.as_str())),
        };

        let (change_type, confidence) = match flags.change_type {
            Some(forced) => (forced, 1.0),
            None => resolve_type(&signals),
        };

        let scope = flags.scope.unwrap_or_else(|| scope_from_changes(changes));

        let complexity = git::analyze_complexity(diff);
        let impact = git::assess_impact(diff, &complexity);

        let context = Context {
            change_type,
            scope,
            technologies,
            confidence,
            lines_changed: diff.totals.changes,
            files_affected: diff.totals.files,
            changed_paths: diff.paths(),
            complexity: complexity.level,
            risk: impact.risk,
            branch: branch.map(String::from),
            signals,
        };

        tracing::info!(
            change_type = %context.change_type,
            scope = %context.scope,
            confidence = context.confidence,
            files = context.files_affected,
            lines = context.lines_changed,
            "Detected change context"
        );
        context
    }
}

/// Branch prefix -> change type. `security/fix-token-leak` is security.
pub fn type_from_branch(branch: &str) -> Option<ChangeType> {
    let prefix = branch
        .split(|c| c == '/' || c == '-' || c == '_')
        .next()?
        .to_ascii_lowercase();
    match prefix.as_str() {
        "feature" | "feat" => Some(ChangeType::Feature),
        "bugfix" | "fix" | "bug" => Some(ChangeType::Bugfix),
        "security" | "sec" | "vuln" => Some(ChangeType::Security),
        "hotfix" => Some(ChangeType::Hotfix),
        "release" | "rel" => Some(ChangeType::Release),
        _ => None,
    }
}

fn type_from_message(message: &str) -> Option<ChangeType> {
    let lower = message.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |candidates: &[&str]| words.iter().any(|w| candidates.contains(w));

    if has(&["security", "vulnerability", "cve", "xss", "csrf", "injection", "sec"]) {
        Some(ChangeType::Security)
    } else if has(&["hotfix"]) {
        Some(ChangeType::Hotfix)
    } else if has(&["release", "bump"]) {
        Some(ChangeType::Release)
    } else if has(&["fix", "fixes", "fixed", "bug", "bugfix", "patch", "resolve", "resolves"]) {
        Some(ChangeType::Bugfix)
    } else if has(&["feat", "feature", "add", "adds", "implement", "introduce"]) {
        Some(ChangeType::Feature)
    } else {
        None
    }
}

/// Majority vote over commit subjects. Ties resolve to the type listed first
/// in [`ChangeType`].
pub fn type_from_commits(messages: &[String]) -> Option<ChangeType> {
    let mut votes: BTreeMap<ChangeType, usize> = BTreeMap::new();
    for message in messages {
        if let Some(t) = type_from_message(message) {
            *votes.entry(t).or_default() += 1;
        }
    }
    let best = votes.values().copied().max()?;
    votes.into_iter().find(|(_, n)| *n == best).map(|(t, _)| t)
}

/// Path heuristic: security-sensitive paths imply a security change.
pub fn type_from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Option<ChangeType> {
    paths
        .into_iter()
        .any(git::is_security_sensitive)
        .then_some(ChangeType::Security)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Pick the winning type and score agreement between the signals.
fn resolve_type(signals: &ContextSignals) -> (ChangeType, f64) {
    let weighted = [
        (signals.branch, BRANCH_WEIGHT),
        (signals.commit, COMMIT_WEIGHT),
        (signals.paths, PATH_WEIGHT),
    ];

    let Some((primary_index, (Some(primary), weight))) = weighted
        .iter()
        .copied()
        .enumerate()
        .find(|(_, (t, _))| t.is_some())
    else {
        return (ChangeType::Unknown, Context::DEFAULT_CONFIDENCE);
    };

    let mut confidence = Context::DEFAULT_CONFIDENCE + weight;
    for (index, (signal, _)) in weighted.iter().enumerate() {
        if index == primary_index {
            continue;
        }
        match signal {
            Some(t) if *t == primary => confidence += AGREEMENT_STEP,
            Some(_) => confidence -= AGREEMENT_STEP,
            None => {}
        }
    }

    (primary, round2(confidence.clamp(MIN_CONFIDENCE, 1.0)))
}

/// Scope from the classified diff.
pub fn scope_from_changes(changes: &ChangeSummary) -> Scope {
    let files = &changes.diff.files;
    if files.is_empty() {
        return Scope::All;
    }
    if files.iter().all(|f| git::is_doc_path(&f.path)) {
        return Scope::Docs;
    }

    let classification = git::classify_file_changes(files);
    let frontend = !classification.frontend.is_empty();
    let backend = !classification.backend.is_empty();
    match (frontend, backend) {
        (true, true) => Scope::Mixed,
        (true, false) => Scope::Frontend,
        (false, true) => Scope::Backend,
        (false, false) if !classification.config.is_empty() => Scope::Infrastructure,
        (false, false) => Scope::All,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{DiffSummary, FileChange};
    use qa_cascade_core::{ComplexityLevel, RiskLevel};

    fn changes(files: &[(&str, u64, u64)], commits: &[&str]) -> ChangeSummary {
        ChangeSummary::new(
            DiffSummary::from_files(
                files
                    .iter()
                    .map(|(p, a, d)| FileChange::new(*p, *a, *d))
                    .collect(),
            ),
            commits.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_branch_prefixes() {
        assert_eq!(type_from_branch("feature/login"), Some(ChangeType::Feature));
        assert_eq!(type_from_branch("fix-typo"), Some(ChangeType::Bugfix));
        assert_eq!(type_from_branch("security/fix-token-leak"), Some(ChangeType::Security));
        assert_eq!(type_from_branch("hotfix/prod"), Some(ChangeType::Hotfix));
        assert_eq!(type_from_branch("release/1.2"), Some(ChangeType::Release));
        assert_eq!(type_from_branch("main"), None);
    }

    #[test]
    fn test_commit_keywords() {
        let msgs = vec![
            "feat: add editor toolbar".to_string(),
            "fix: null check".to_string(),
            "Fix crash on save".to_string(),
        ];
        assert_eq!(type_from_commits(&msgs), Some(ChangeType::Bugfix));
        assert_eq!(type_from_commits(&["chore: tidy".to_string()]), None);
        assert_eq!(
            type_from_commits(&["Patch CVE-2024-1234".to_string()]),
            Some(ChangeType::Security)
        );
    }

    #[test]
    fn test_security_branch_with_auth_diff() {
        let detector = ContextDetector::with_technologies(BTreeSet::new());
        let ctx = detector.detect(
            Some("security/fix-token-leak"),
            &changes(&[("src/auth/token.ts", 30, 10)], &[]),
            &DetectionFlags::default(),
        );
        assert_eq!(ctx.change_type, ChangeType::Security);
        assert_eq!(ctx.scope, Scope::Frontend);
        assert_eq!(ctx.lines_changed, 40);
        assert!(ctx.technologies.contains("typescript"));
        // branch + agreeing path signal
        assert_eq!(ctx.confidence, 0.85);
        assert_eq!(ctx.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_conflicting_signals_lower_confidence() {
        let detector = ContextDetector::default();
        let agree = detector.detect(
            Some("feature/editor"),
            &changes(&[("web/editor.tsx", 5, 0)], &["feat: add editor"]),
            &DetectionFlags::default(),
        );
        let conflict = detector.detect(
            Some("feature/editor"),
            &changes(&[("web/editor.tsx", 5, 0)], &["fix: broken editor"]),
            &DetectionFlags::default(),
        );
        assert_eq!(agree.change_type, ChangeType::Feature);
        assert_eq!(conflict.change_type, ChangeType::Feature);
        assert!(agree.confidence > conflict.confidence);
    }

    #[test]
    fn test_zero_diff_yields_default_context() {
        let detector = ContextDetector::default();
        let ctx = detector.detect(None, &ChangeSummary::default(), &DetectionFlags::default());
        assert_eq!(ctx.change_type, ChangeType::Unknown);
        assert_eq!(ctx.scope, Scope::All);
        assert_eq!(ctx.lines_changed, 0);
        assert_eq!(ctx.files_affected, 0);
        assert_eq!(ctx.confidence, Context::DEFAULT_CONFIDENCE);
        assert_eq!(ctx.complexity, ComplexityLevel::Low);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = ContextDetector::with_technologies(["python".to_string()].into_iter().collect());
        let input = changes(
            &[("server/api.py", 120, 4), ("web/app.tsx", 10, 2), ("README.md", 1, 1)],
            &["feat: endpoints"],
        );
        let flags = DetectionFlags::default();
        let a = detector.detect(Some("feature/api"), &input, &flags);
        let b = detector.detect(Some("feature/api"), &input, &flags);
        assert_eq!(a, b);
        assert_eq!(a.scope, Scope::Mixed);
    }

    #[test]
    fn test_scope_rules_and_override() {
        assert_eq!(scope_from_changes(&changes(&[("docs/guide.md", 3, 0)], &[])), Scope::Docs);
        assert_eq!(scope_from_changes(&changes(&[("Dockerfile", 3, 0)], &[])), Scope::Infrastructure);
        assert_eq!(scope_from_changes(&changes(&[("server/db.py", 3, 0)], &[])), Scope::Backend);

        let detector = ContextDetector::default();
        let ctx = detector.detect(
            None,
            &changes(&[("server/db.py", 3, 0)], &[]),
            &DetectionFlags {
                scope: Some(Scope::Frontend),
                change_type: None,
            },
        );
        assert_eq!(ctx.scope, Scope::Frontend);
    }
}
