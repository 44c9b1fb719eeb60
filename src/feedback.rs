//! Error Handling & Feedback
//!
//! Turns failed runs into structured issue reports and keeps a local issue
//! history under `<project>/.qa-cascade/`:
//!
//! - `issues.jsonl` - one [`IssueReport`] per line, append-only
//! - `last-run.json` - the most recent [`RunReport`], attached to manual issues

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use qa_cascade_core::{ChangeType, Context, Dimension, ErrorKind, ExecutionMode, Scope};
use qa_cascade_quality_gates::EnvironmentReport;

use crate::orchestrator::RunOutcome;
use crate::reporting::RunReport;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{ensure_dir, issues_path, last_run_path, state_dir};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSource {
    /// Filed with `report-issue`
    Manual,
    /// Filed by `--report-issue` after a failed run
    Automatic,
}

/// The parts of a [`Context`] worth keeping in an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub scope: Scope,
    pub technologies: Vec<String>,
    pub confidence: f64,
    pub branch: Option<String>,
    pub files_affected: usize,
}

impl From<&Context> for ContextSummary {
    fn from(context: &Context) -> Self {
        Self {
            change_type: context.change_type,
            scope: context.scope,
            technologies: context.technologies.iter().cloned().collect(),
            confidence: context.confidence,
            branch: context.branch.clone(),
            files_affected: context.files_affected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedTool {
    pub name: String,
    pub dimension: Dimension,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

/// A structured issue report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub source: IssueSource,
    pub error_kind: Option<ErrorKind>,
    pub title: String,
    pub message: String,
    pub run_id: Option<Uuid>,
    pub mode: Option<ExecutionMode>,
    pub context: Option<ContextSummary>,
    pub failed_tools: Vec<FailedTool>,
    pub environment: Option<EnvironmentReport>,
}

impl IssueReport {
    fn new(source: IssueSource, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source,
            error_kind: None,
            title: title.into(),
            message: message.into(),
            run_id: None,
            mode: None,
            context: None,
            failed_tools: Vec::new(),
            environment: None,
        }
    }

    /// Copy run details from a report.
    fn attach_run(mut self, report: &RunReport) -> Self {
        self.run_id = Some(report.run_id);
        self.mode = Some(report.mode);
        self.context = Some(ContextSummary::from(&report.context));
        self.environment = report.environment.clone().or(self.environment.take());
        self.failed_tools = report
            .failed_tools()
            .into_iter()
            .map(|t| FailedTool {
                name: t.tool.name.clone(),
                dimension: t.tool.dimension,
                error: t.error.clone(),
                error_kind: t.error_kind,
                exit_code: t.exit_code,
                timed_out: t.timed_out,
            })
            .collect();
        self
    }
}

// ============================================================================
// IssueStore
// ============================================================================

/// File-backed issue history for one project.
#[derive(Debug, Clone)]
pub struct IssueStore {
    project_root: PathBuf,
}

impl IssueStore {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, issue: &IssueReport) -> AppResult<()> {
        ensure_dir(&state_dir(&self.project_root))?;
        let line = serde_json::to_string(issue)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(issues_path(&self.project_root))?;
        writeln!(file, "{}", line)?;
        tracing::info!(id = %issue.id, source = ?issue.source, "Recorded issue");
        Ok(())
    }

    /// Most recent issues first. Malformed lines are skipped.
    pub fn list(&self, limit: usize) -> AppResult<Vec<IssueReport>> {
        let path = issues_path(&self.project_root);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let mut issues: Vec<IssueReport> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(i, line)| match serde_json::from_str(line) {
                Ok(issue) => Some(issue),
                Err(e) => {
                    tracing::warn!(line = i + 1, "Skipping malformed issue entry: {}", e);
                    None
                }
            })
            .collect();
        issues.reverse();
        issues.truncate(limit);
        Ok(issues)
    }

    pub fn save_last_run(&self, report: &RunReport) -> AppResult<()> {
        ensure_dir(&state_dir(&self.project_root))?;
        fs::write(last_run_path(&self.project_root), serde_json::to_string_pretty(report)?)?;
        Ok(())
    }

    pub fn load_last_run(&self) -> AppResult<Option<RunReport>> {
        let path = last_run_path(&self.project_root);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring unreadable last run: {}", e);
                Ok(None)
            }
        }
    }
}

// ============================================================================
// FeedbackManager
// ============================================================================

/// Assembles issue reports from run outcomes.
pub struct FeedbackManager {
    store: IssueStore,
}

impl FeedbackManager {
    pub fn new(store: IssueStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &IssueStore {
        &self.store
    }

    /// Build an issue for a failed run; `None` when the run succeeded.
    pub fn handle_failure(&self, outcome: &RunOutcome) -> Option<IssueReport> {
        if outcome.success() {
            return None;
        }

        if let Some(fatal) = &outcome.fatal {
            let mut issue = IssueReport::new(
                IssueSource::Automatic,
                format!("QA run aborted: {}", fatal.kind),
                fatal.message.clone(),
            );
            issue.error_kind = Some(fatal.kind);
            issue.context = outcome.context.as_ref().map(ContextSummary::from);
            issue.mode = outcome.plan.as_ref().map(|p| p.mode());
            issue.environment = outcome.environment.clone();
            if let Some(report) = &outcome.report {
                issue = issue.attach_run(report);
            }
            return Some(issue);
        }

        let report = outcome.report.as_ref()?;
        let failed = report.failed_tools();
        let names: Vec<&str> = failed.iter().map(|t| t.tool.name.as_str()).collect();
        let message = failed
            .iter()
            .map(|t| format!("{}: {}", t.tool.name, t.error.as_deref().unwrap_or("failed")))
            .collect::<Vec<_>>()
            .join("\n");
        let mut issue = IssueReport::new(
            IssueSource::Automatic,
            format!("{} tool(s) failed: {}", names.len(), names.join(", ")),
            message,
        );
        issue.error_kind = failed.iter().find_map(|t| t.error_kind);
        issue.environment = outcome.environment.clone();
        Some(issue.attach_run(report))
    }

    /// Build and persist an issue for a failed run.
    pub fn report_failure(&self, outcome: &RunOutcome) -> AppResult<Option<IssueReport>> {
        match self.handle_failure(outcome) {
            Some(issue) => {
                self.store.append(&issue)?;
                Ok(Some(issue))
            }
            None => Ok(None),
        }
    }

    /// File a manual issue, attaching the last run when one exists.
    pub fn manual(&self, title: &str, description: &str) -> AppResult<IssueReport> {
        if title.trim().is_empty() {
            return Err(AppError::feedback("issue title must not be empty"));
        }
        let mut issue = IssueReport::new(IssueSource::Manual, title.trim(), description);
        if let Some(report) = self.store.load_last_run()? {
            issue = issue.attach_run(&report);
        }
        self.store.append(&issue)?;
        Ok(issue)
    }
}
