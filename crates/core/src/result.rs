//! Execution Results
//!
//! Normalized outcome of running one planned tool, and the violations parsed
//! from its output.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::tool::ToolRef;

/// Violation severity, ordered so that `max` yields the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Lenient mapping from the many spellings tools use.
    pub fn from_tool_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "error" | "fatal" | "high" | "critical" | "e" | "f" | "2" => Severity::Error,
            "warning" | "warn" | "medium" | "w" | "1" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem reported by a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub file_path: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub severity: Severity,
    pub rule: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        file_path: impl Into<String>,
        severity: Severity,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            line: None,
            column: None,
            severity,
            rule: rule.into(),
            message: message.into(),
        }
    }

    pub fn at(mut self, line: Option<u32>, column: Option<u32>) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

/// Result of executing one planned tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecutionResult {
    pub tool: ToolRef,
    pub success: bool,
    pub violations: Vec<Violation>,
    pub execution_time_ms: u64,
    pub error: Option<String>,
    /// Classification of `error`, when present
    pub error_kind: Option<ErrorKind>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Number of attempts made (1 + retries used)
    pub attempts: u32,
}

impl ToolExecutionResult {
    /// Tool exited with status zero.
    pub fn passed(tool: ToolRef, violations: Vec<Violation>, execution_time_ms: u64) -> Self {
        Self {
            tool,
            success: true,
            violations,
            execution_time_ms,
            error: None,
            error_kind: None,
            exit_code: Some(0),
            timed_out: false,
            attempts: 1,
        }
    }

    /// Tool exited non-zero; `stderr` is attached to the error message.
    pub fn crashed(
        tool: ToolRef,
        exit_code: i32,
        stderr: &str,
        violations: Vec<Violation>,
        execution_time_ms: u64,
    ) -> Self {
        let detail = stderr.trim();
        let error = if detail.is_empty() {
            format!("exited with code {}", exit_code)
        } else {
            format!("exited with code {}: {}", exit_code, detail)
        };
        Self {
            tool,
            success: false,
            violations,
            execution_time_ms,
            error: Some(error),
            error_kind: Some(ErrorKind::ToolCrash),
            exit_code: Some(exit_code),
            timed_out: false,
            attempts: 1,
        }
    }

    /// Invocation was cancelled after exceeding its budget.
    pub fn timed_out(tool: ToolRef, timeout_ms: u64, execution_time_ms: u64) -> Self {
        Self {
            tool,
            success: false,
            violations: Vec::new(),
            execution_time_ms,
            error: Some(format!("timed out after {}ms", timeout_ms)),
            error_kind: Some(ErrorKind::ExecutionTimeout),
            exit_code: None,
            timed_out: true,
            attempts: 1,
        }
    }

    /// The process could not be started at all.
    pub fn error(tool: ToolRef, error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            tool,
            success: false,
            violations: Vec::new(),
            execution_time_ms,
            error: Some(error.into()),
            error_kind: Some(ErrorKind::ToolCrash),
            exit_code: None,
            timed_out: false,
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Fold a further invocation of the same tool into this result. The
    /// first failure supplies the error and exit code.
    pub fn absorb(&mut self, other: ToolExecutionResult) {
        if self.success && !other.success {
            self.error = other.error;
            self.error_kind = other.error_kind;
            self.exit_code = other.exit_code;
        }
        self.success &= other.success;
        self.timed_out |= other.timed_out;
        self.violations.extend(other.violations);
        self.execution_time_ms += other.execution_time_ms;
        self.attempts = self.attempts.max(other.attempts);
    }

    /// Most severe violation, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }
}
