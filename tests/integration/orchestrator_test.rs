//! Full orchestrated runs over scratch projects with shell-backed tools.
#![cfg(unix)]

use qa_cascade::reporting::{render, ReportFormat};
use qa_cascade::{FeedbackManager, IssueStore, Orchestrator, RunOptions, RunState};
use qa_cascade_core::{Dimension, ErrorKind, Scope};
use qa_cascade_quality_gates::{OutputFormat, PlanRequest, Runtime, ToolCatalog, ToolSpec};

use crate::common::{touch, AlwaysAvailable};

fn shell_tool(name: &str, dimension: Dimension, script: &str) -> ToolSpec {
    ToolSpec::new(name, "sh", dimension, Scope::All)
        .with_args(&["-c", script])
        .with_timeout(10)
}

fn lint_catalog(failing: bool) -> ToolCatalog {
    let mut catalog = ToolCatalog::empty();
    catalog.register(shell_tool("lint-ok", Dimension::ErrorDetection, "exit 0"));
    if failing {
        catalog.register(
            shell_tool(
                "lint-fail",
                Dimension::ErrorDetection,
                "echo 'app/main.py:7:1: error: undefined name' ; exit 1",
            )
            .with_output(OutputFormat::CompilerStyle),
        );
    }
    catalog
}

fn lint_options(root: &std::path::Path) -> RunOptions {
    let mut options = RunOptions::new(root);
    options.request = PlanRequest::from_flags(false, None, Some(Dimension::ErrorDetection), None);
    options.task_id = Some("QA-7".to_string());
    options
}

#[tokio::test]
async fn test_passing_run_reaches_done() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "app/main.py", "print('ok')\n");

    let outcome = Orchestrator::new(lint_options(temp.path()))
        .with_catalog(lint_catalog(false))
        .with_probe(Box::new(AlwaysAvailable))
        .run()
        .await;

    assert_eq!(outcome.state, RunState::Done);
    assert_eq!(
        outcome.history,
        vec![
            RunState::Idle,
            RunState::ContextDetected,
            RunState::PlanBuilt,
            RunState::EnvironmentVerified,
            RunState::Executing,
            RunState::Reported,
            RunState::Done,
        ]
    );
    assert!(outcome.success());
    assert_eq!(outcome.exit_code(), 0);

    let report = outcome.report.as_ref().unwrap();
    assert_eq!(report.task_id.as_deref(), Some("QA-7"));
    assert_eq!(report.summary.tools_run, 1);
}

#[tokio::test]
async fn test_failing_tool_fails_run_but_reports_everything() {
    let temp = tempfile::tempdir().unwrap();

    let outcome = Orchestrator::new(lint_options(temp.path()))
        .with_catalog(lint_catalog(true))
        .with_probe(Box::new(AlwaysAvailable))
        .run()
        .await;

    assert_eq!(outcome.state, RunState::Failed);
    assert!(outcome.history.contains(&RunState::Reported));
    assert!(outcome.fatal.is_none());
    assert_eq!(outcome.exit_code(), 1);

    // one result per planned tool, in plan order
    let plan = outcome.plan.as_ref().unwrap();
    let report = outcome.report.as_ref().unwrap();
    let reported: Vec<&str> = report
        .dimensions
        .iter()
        .flat_map(|d| d.tools.iter().map(|t| t.tool.name.as_str()))
        .collect();
    let planned: Vec<&str> = plan.tools().map(|t| t.name.as_str()).collect();
    assert_eq!(reported, planned);
    assert_eq!(report.summary.tools_failed, 1);
    assert_eq!(report.summary.counts.errors, 1);

    let console = render(report, ReportFormat::Console).unwrap();
    assert!(console.contains("lint-fail FAIL"));
    assert!(console.contains("app/main.py [error]"));

    let ci = render(report, ReportFormat::CiJson).unwrap();
    assert!(ci.contains("\"failingTools\":[\"lint-fail\"]"));

    let feedback = FeedbackManager::new(IssueStore::new(temp.path()));
    let issue = feedback.report_failure(&outcome).unwrap().unwrap();
    assert_eq!(issue.failed_tools.len(), 1);
    assert_eq!(feedback.store().list(5).unwrap().len(), 1);
}

#[tokio::test]
async fn test_environment_gate_blocks_execution() {
    let temp = tempfile::tempdir().unwrap();
    let missing_root = temp.path().join("does-not-exist");

    let outcome = Orchestrator::new(lint_options(&missing_root))
        .with_catalog(lint_catalog(false))
        .with_probe(Box::new(AlwaysAvailable))
        .run()
        .await;

    assert_eq!(outcome.state, RunState::Failed);
    assert!(!outcome.history.contains(&RunState::Executing));
    assert!(outcome.report.is_none());
    let fatal = outcome.fatal.as_ref().unwrap();
    assert_eq!(fatal.kind, ErrorKind::EnvironmentVerification);
    assert!(fatal.kind.is_fatal());
    assert_eq!(outcome.exit_code(), 1);
}

#[tokio::test]
async fn test_unavailable_tool_degrades_plan() {
    let temp = tempfile::tempdir().unwrap();
    let mut catalog = lint_catalog(false);
    catalog.register(
        ToolSpec::new("lint-missing", "definitely-not-installed-qa-tool", Dimension::ErrorDetection, Scope::All)
            .with_runtime(Runtime::Node),
    );

    let outcome = Orchestrator::new(lint_options(temp.path()))
        .with_catalog(catalog)
        .with_probe(Box::new(crate::common::MissingPrograms(vec!["definitely-not-installed-qa-tool"])))
        .run()
        .await;

    assert!(outcome.success());
    let report = outcome.report.as_ref().unwrap();
    assert_eq!(report.unavailable.len(), 1);
    assert_eq!(report.unavailable[0].tool.name, "lint-missing");
    assert_eq!(report.summary.tools_run, 1);
}
