//! Console tree output.
//!
//! ```text
//! security-audit [critical] error
//! └── semgrep FAIL 1.2s
//!     └── src/auth/token.ts [error]
//!         ├── line 4: secret found (hardcoded-secret)
//!         └── 2 occurrences of rule weak-hash
//! ```

use std::fmt::Write;

use super::{DimensionReport, RunReport, ToolReport};

struct Node {
    label: String,
    children: Vec<Node>,
}

impl Node {
    fn leaf(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }
}

fn write_children(out: &mut String, children: &[Node], prefix: &str) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let (branch, indent) = if last { ("└── ", "    ") } else { ("├── ", "│   ") };
        let _ = writeln!(out, "{}{}{}", prefix, branch, child.label);
        write_children(out, &child.children, &format!("{}{}", prefix, indent));
    }
}

fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

/// Renders a [`RunReport`] as an indented tree, preserving plan order.
pub struct TreeFormatter {
    /// Rule lines shown per file before eliding the rest
    max_rules_per_file: usize,
}

impl Default for TreeFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeFormatter {
    pub fn new() -> Self {
        Self { max_rules_per_file: 10 }
    }

    pub fn with_max_rules_per_file(mut self, max: usize) -> Self {
        self.max_rules_per_file = max.max(1);
        self
    }

    pub fn render(&self, report: &RunReport) -> String {
        let mut out = String::new();
        let context = &report.context;

        let _ = writeln!(
            out,
            "QA Cascade {} run ({} tools, {})",
            report.mode,
            report.summary.tools_run,
            format_duration(report.duration_ms)
        );
        if let Some(task) = &report.task_id {
            let _ = writeln!(out, "Task: {}", task);
        }
        let technologies: Vec<&str> = context.technologies.iter().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "Context: {} / {} (confidence {:.2}, risk {}) [{}]",
            context.change_type,
            context.scope,
            context.confidence,
            context.risk,
            technologies.join(", ")
        );
        if let Some(branch) = &context.branch {
            let _ = writeln!(out, "Branch: {}", branch);
        }
        out.push('\n');

        for dimension in &report.dimensions {
            let _ = writeln!(out, "{}", self.dimension_label(dimension));
            let tools: Vec<Node> = dimension.tools.iter().map(|t| self.tool_node(t)).collect();
            write_children(&mut out, &tools, "");
        }
        if report.dimensions.is_empty() {
            let _ = writeln!(out, "No tools executed");
        }

        self.write_plan_notes(&mut out, report);

        let summary = &report.summary;
        let _ = writeln!(
            out,
            "\nSummary: {} run, {} passed, {} failed; {} errors, {} warnings, {} info",
            summary.tools_run,
            summary.tools_passed,
            summary.tools_failed,
            summary.counts.errors,
            summary.counts.warnings,
            summary.counts.infos
        );
        let _ = writeln!(out, "Result: {}", if report.success { "PASSED" } else { "FAILED" });
        out
    }

    fn dimension_label(&self, dimension: &DimensionReport) -> String {
        match dimension.max_severity {
            Some(severity) => format!("{} [{}] {}", dimension.dimension, dimension.priority, severity),
            None => format!("{} [{}]", dimension.dimension, dimension.priority),
        }
    }

    fn tool_node(&self, tool: &ToolReport) -> Node {
        let status = if tool.success { "PASS" } else { "FAIL" };
        let mut label = format!("{} {} {}", tool.tool.name, status, format_duration(tool.execution_time_ms));
        if tool.attempts > 1 {
            let _ = write!(label, " ({} attempts)", tool.attempts);
        }

        let mut children = Vec::new();
        if let Some(error) = &tool.error {
            children.push(Node::leaf(format!("error: {}", first_line(error))));
        }
        for file in &tool.files {
            let mut rules: Vec<Node> = file
                .rules
                .iter()
                .take(self.max_rules_per_file)
                .map(|r| Node::leaf(r.summary()))
                .collect();
            let hidden = file.rules.len().saturating_sub(self.max_rules_per_file);
            if hidden > 0 {
                rules.push(Node::leaf(format!("... {} more rules", hidden)));
            }
            children.push(Node {
                label: format!("{} [{}]", file.file, file.max_severity),
                children: rules,
            });
        }
        Node { label, children }
    }

    fn write_plan_notes(&self, out: &mut String, report: &RunReport) {
        if !report.unavailable.is_empty() {
            let _ = writeln!(out, "\nUnavailable tools:");
            for tool in &report.unavailable {
                if tool.alternatives.is_empty() {
                    let _ = writeln!(out, "  {} ({})", tool.tool.name, tool.reason);
                } else {
                    let _ = writeln!(
                        out,
                        "  {} ({}; try {})",
                        tool.tool.name,
                        tool.reason,
                        tool.alternatives.join(", ")
                    );
                }
            }
        }
        if !report.prerequisite_issues.is_empty() {
            let _ = writeln!(out, "\nMissing prerequisites:");
            for issue in &report.prerequisite_issues {
                let _ = writeln!(out, "  {}", issue.message());
            }
        }
        if !report.skipped.is_empty() {
            let _ = writeln!(out, "\nSkipped:");
            for skipped in &report.skipped {
                let _ = writeln!(out, "  {} ({})", skipped.tool.name, skipped.reason);
            }
        }
        if let Some(conflicts) = &report.conflicts {
            if !conflicts.overlapping_files.is_empty() {
                let _ = writeln!(
                    out,
                    "\nPossible merge conflicts with {} ({:?}): {}",
                    conflicts.target_branch.as_deref().unwrap_or("target"),
                    conflicts.severity,
                    conflicts.overlapping_files.join(", ")
                );
            }
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::fixtures::sample_report;

    #[test]
    fn test_tree_preserves_plan_order_and_collapses_rules() {
        let output = TreeFormatter::new().render(&sample_report());

        let security = output.find("security-audit [critical] error").unwrap();
        let formatting = output.find("formatting [medium]").unwrap();
        assert!(security < formatting);

        assert!(output.contains("└── semgrep FAIL 1.2s"));
        assert!(output.contains("src/auth/token.ts [error]"));
        assert!(output.contains("2 occurrences of rule weak-hash"));
        assert!(output.contains("line 4: secret <found> (hardcoded-secret)"));
        assert!(output.contains("Result: FAILED"));
        assert!(output.contains("Task: QA-42"));
    }

    #[test]
    fn test_rule_elision() {
        let output = TreeFormatter::new().with_max_rules_per_file(1).render(&sample_report());
        assert!(output.contains("... 1 more rules"));
    }

    #[test]
    fn test_duration_format() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1500), "1.5s");
    }
}
