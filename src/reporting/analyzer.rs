//! Violation analysis: group by file, collapse repeated rule hits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use qa_cascade_core::{Severity, Violation};

/// All hits of one rule within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub rule: String,
    pub severity: Severity,
    pub occurrences: usize,
    /// Reported lines, sorted and deduplicated
    pub lines: Vec<u32>,
    /// Message of the first hit
    pub message: String,
}

impl RuleSummary {
    /// One-line rendering; repeated hits collapse into a count.
    pub fn summary(&self) -> String {
        if self.occurrences > 1 {
            format!("{} occurrences of rule {}", self.occurrences, self.rule)
        } else {
            match self.lines.first() {
                Some(line) => format!("line {}: {} ({})", line, self.message, self.rule),
                None => format!("{} ({})", self.message, self.rule),
            }
        }
    }
}

/// Violations of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: String,
    pub max_severity: Severity,
    pub total: usize,
    /// Most severe first, then by rule name
    pub rules: Vec<RuleSummary>,
}

/// Counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCounts {
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => self.infos += 1,
        }
    }

    pub fn merge(&mut self, other: SeverityCounts) {
        self.errors += other.errors;
        self.warnings += other.warnings;
        self.infos += other.infos;
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.infos
    }
}

pub struct ViolationAnalyzer;

impl ViolationAnalyzer {
    /// Group `violations` by file (sorted by path).
    pub fn group_by_file<'a>(violations: impl IntoIterator<Item = &'a Violation>) -> Vec<FileReport> {
        let mut by_file: BTreeMap<&str, BTreeMap<&str, RuleSummary>> = BTreeMap::new();

        for violation in violations {
            let rules = by_file.entry(violation.file_path.as_str()).or_default();
            let summary = rules
                .entry(violation.rule.as_str())
                .or_insert_with(|| RuleSummary {
                    rule: violation.rule.clone(),
                    severity: violation.severity,
                    occurrences: 0,
                    lines: Vec::new(),
                    message: violation.message.clone(),
                });
            summary.occurrences += 1;
            summary.severity = summary.severity.max(violation.severity);
            if let Some(line) = violation.line {
                summary.lines.push(line);
            }
        }

        by_file
            .into_iter()
            .map(|(file, rules)| {
                let mut rules: Vec<RuleSummary> = rules
                    .into_values()
                    .map(|mut r| {
                        r.lines.sort_unstable();
                        r.lines.dedup();
                        r
                    })
                    .collect();
                rules.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.rule.cmp(&b.rule)));
                FileReport {
                    file: file.to_string(),
                    max_severity: rules.iter().map(|r| r.severity).max().unwrap_or(Severity::Info),
                    total: rules.iter().map(|r| r.occurrences).sum(),
                    rules,
                }
            })
            .collect()
    }

    pub fn count<'a>(violations: impl IntoIterator<Item = &'a Violation>) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for violation in violations {
            counts.add(violation.severity);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(file: &str, line: u32, severity: Severity, rule: &str) -> Violation {
        Violation::new(file, severity, rule, format!("{} hit", rule)).at(Some(line), None)
    }

    #[test]
    fn test_repeated_rule_collapses() {
        let mut violations: Vec<Violation> = (1..=12)
            .map(|line| violation("src/a.ts", line, Severity::Warning, "no-unused-vars"))
            .collect();
        violations.push(violation("src/a.ts", 3, Severity::Error, "no-undef"));

        let files = ViolationAnalyzer::group_by_file(&violations);
        assert_eq!(files.len(), 1);
        let file = &files[0];
        assert_eq!(file.max_severity, Severity::Error);
        assert_eq!(file.total, 13);
        assert_eq!(file.rules[0].rule, "no-undef");
        assert_eq!(file.rules[1].summary(), "12 occurrences of rule no-unused-vars");
        assert_eq!(file.rules[0].summary(), "line 3: no-undef hit (no-undef)");
    }

    #[test]
    fn test_files_sorted_and_counted() {
        let violations = vec![
            violation("z.py", 1, Severity::Info, "I1"),
            violation("a.py", 2, Severity::Error, "E1"),
            violation("a.py", 2, Severity::Error, "E1"),
        ];
        let files = ViolationAnalyzer::group_by_file(&violations);
        assert_eq!(files.iter().map(|f| f.file.as_str()).collect::<Vec<_>>(), vec!["a.py", "z.py"]);
        assert_eq!(files[0].rules[0].lines, vec![2]);

        let counts = ViolationAnalyzer::count(&violations);
        assert_eq!((counts.errors, counts.warnings, counts.infos), (2, 0, 1));
        assert_eq!(counts.total(), 3);
    }
}
