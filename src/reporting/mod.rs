//! Reporting
//!
//! Aggregates raw tool results into a [`RunReport`]: dimensions in plan
//! order, tools in plan order within each dimension, violations grouped by
//! file with repeated rule hits collapsed. The report renders to a console
//! tree, full JSON, compact CI JSON or HTML.

pub mod analyzer;
pub mod html;
pub mod tree;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use qa_cascade_core::{
    Context, CoreError, CoreResult, Dimension, ErrorKind, ExecutionMode, Priority, Severity, ToolExecutionResult, ToolRef,
};
use qa_cascade_quality_gates::{
    ConflictPrediction, EnvironmentReport, ExecutionPlan, MappingValidation, PrerequisiteIssue,
    SkippedTool, UnavailableTool,
};

use crate::utils::error::{AppError, AppResult};

pub use analyzer::{FileReport, RuleSummary, SeverityCounts, ViolationAnalyzer};
pub use html::HtmlRenderer;
pub use tree::TreeFormatter;

/// Output format selected with `--report`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Console,
    Json,
    CiJson,
    Html,
}

/// One executed tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolReport {
    pub tool: ToolRef,
    pub success: bool,
    pub execution_time_ms: u64,
    pub attempts: u32,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub counts: SeverityCounts,
    pub max_severity: Option<Severity>,
    pub files: Vec<FileReport>,
}

impl ToolReport {
    pub fn from_result(result: &ToolExecutionResult) -> Self {
        Self {
            tool: result.tool.clone(),
            success: result.success,
            execution_time_ms: result.execution_time_ms,
            attempts: result.attempts,
            exit_code: result.exit_code,
            timed_out: result.timed_out,
            error: result.error.clone(),
            error_kind: result.error_kind,
            counts: ViolationAnalyzer::count(&result.violations),
            max_severity: result.max_severity(),
            files: ViolationAnalyzer::group_by_file(&result.violations),
        }
    }
}

/// Tools of one dimension, in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionReport {
    pub dimension: Dimension,
    pub priority: Priority,
    pub max_severity: Option<Severity>,
    pub counts: SeverityCounts,
    pub tools: Vec<ToolReport>,
}

impl DimensionReport {
    pub fn passed(&self) -> bool {
        self.tools.iter().all(|t| t.success)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub tools_run: usize,
    pub tools_passed: usize,
    pub tools_failed: usize,
    pub unavailable: usize,
    pub prerequisite_issues: usize,
    pub skipped: usize,
    pub counts: SeverityCounts,
}

/// Everything known about one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub task_id: Option<String>,
    pub mode: ExecutionMode,
    pub success: bool,
    pub context: Context,
    pub summary: ReportSummary,
    pub dimensions: Vec<DimensionReport>,
    pub validation: MappingValidation,
    pub unavailable: Vec<UnavailableTool>,
    pub prerequisite_issues: Vec<PrerequisiteIssue>,
    pub skipped: Vec<SkippedTool>,
    pub environment: Option<EnvironmentReport>,
    pub conflicts: Option<ConflictPrediction>,
}

/// Run metadata that does not come from the plan.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub task_id: Option<String>,
    pub environment: Option<EnvironmentReport>,
    pub conflicts: Option<ConflictPrediction>,
}

impl RunReport {
    /// Build the report. `results` must be in plan order.
    /// Errors when `results` is not exactly one result per plan entry, in plan order.
    pub fn build(plan: &ExecutionPlan, results: &[ToolExecutionResult], meta: RunMeta) -> CoreResult<Self> {
        if results.len() != plan.len() {
            return Err(CoreError::internal(format!(
                "{} results for {} planned tools",
                results.len(),
                plan.len()
            )));
        }
        if let Some((entry, result)) = plan
            .entries()
            .iter()
            .zip(results)
            .find(|(entry, result)| entry.tool != result.tool)
        {
            return Err(CoreError::internal(format!(
                "result for '{}' where '{}' was planned",
                result.tool.name, entry.tool.name
            )));
        }

        let mut dimensions: Vec<DimensionReport> = Vec::new();
        let mut summary = ReportSummary {
            unavailable: plan.unavailable().len(),
            prerequisite_issues: plan.prerequisite_issues().len(),
            skipped: plan.skipped().len(),
            ..Default::default()
        };

        for (entry, result) in plan.entries().iter().zip(results) {
            let tool = ToolReport::from_result(result);
            summary.tools_run += 1;
            if tool.success {
                summary.tools_passed += 1;
            } else {
                summary.tools_failed += 1;
            }
            summary.counts.merge(tool.counts);

            let dimension = entry.tool.dimension;
            let index = match dimensions.iter().position(|d| d.dimension == dimension) {
                Some(index) => index,
                None => {
                    dimensions.push(DimensionReport {
                        dimension,
                        priority: plan.dimension_map().priority_of(dimension),
                        max_severity: None,
                        counts: SeverityCounts::default(),
                        tools: Vec::new(),
                    });
                    dimensions.len() - 1
                }
            };
            let group = &mut dimensions[index];
            group.counts.merge(tool.counts);
            group.max_severity = group.max_severity.max(tool.max_severity);
            group.tools.push(tool);
        }

        Ok(Self {
            run_id: meta.run_id,
            started_at: meta.started_at,
            duration_ms: meta.duration_ms,
            task_id: meta.task_id,
            mode: plan.mode(),
            success: summary.tools_failed == 0,
            context: plan.context().clone(),
            summary,
            dimensions,
            validation: plan.validation().clone(),
            unavailable: plan.unavailable().to_vec(),
            prerequisite_issues: plan.prerequisite_issues().to_vec(),
            skipped: plan.skipped().to_vec(),
            environment: meta.environment,
            conflicts: meta.conflicts,
        })
    }

    /// Executed tools that failed, in plan order.
    pub fn failed_tools(&self) -> Vec<&ToolReport> {
        self.dimensions
            .iter()
            .flat_map(|d| d.tools.iter())
            .filter(|t| !t.success)
            .collect()
    }
}

/// Compact machine-readable summary for CI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiSummary {
    pub success: bool,
    pub tools_run: usize,
    pub tools_failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub failing_tools: Vec<String>,
    pub unavailable_tools: Vec<String>,
}

impl From<&RunReport> for CiSummary {
    fn from(report: &RunReport) -> Self {
        Self {
            success: report.success,
            tools_run: report.summary.tools_run,
            tools_failed: report.summary.tools_failed,
            errors: report.summary.counts.errors,
            warnings: report.summary.counts.warnings,
            infos: report.summary.counts.infos,
            failing_tools: report.failed_tools().iter().map(|t| t.tool.name.clone()).collect(),
            unavailable_tools: report.unavailable.iter().map(|u| u.tool.name.clone()).collect(),
        }
    }
}

/// Render a report in the requested format.
pub fn render(report: &RunReport, format: ReportFormat) -> AppResult<String> {
    match format {
        ReportFormat::Console => Ok(TreeFormatter::new().render(report)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::CiJson => Ok(serde_json::to_string(&CiSummary::from(report))?),
        ReportFormat::Html => HtmlRenderer::new()
            .render(report)
            .map_err(AppError::render),
    }
}
