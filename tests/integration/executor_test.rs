//! Process execution with real child processes.
#![cfg(unix)]

use std::collections::BTreeMap;
use std::time::Duration;

use qa_cascade_core::{
    Dimension, ErrorKind, ExecutionMode, Priority, RetryPolicy, Scope, Severity, ToolConfig,
    ToolRef, WrapperShape,
};
use qa_cascade_quality_gates::{OutputFormat, PlanEntry, ResolvedCommand};
use qa_cascade_tools::{ExecutorConfig, ToolExecutor, WrapperCoordinator};

fn shell_entry(name: &str, script: &str, timeout_ms: u64, output: OutputFormat) -> PlanEntry {
    PlanEntry {
        tool: ToolRef::new(name, Dimension::ErrorDetection, Scope::All),
        priority: Priority::High,
        config: ToolConfig {
            timeout: Duration::from_millis(timeout_ms),
            args: vec![],
            env: BTreeMap::new(),
            retries: RetryPolicy::none(),
            mode: ExecutionMode::Automatic,
            shape: WrapperShape::WholeProject,
        },
        command: ResolvedCommand {
            program: "sh".to_string(),
            prefix: vec!["-c".to_string(), script.to_string()],
        },
        files: vec![],
        output,
        runtime: None,
    }
}

fn executor(root: &std::path::Path) -> ToolExecutor {
    ToolExecutor::new(WrapperCoordinator::new(root), ExecutorConfig::default())
}

#[tokio::test]
async fn test_slow_tool_times_out() {
    let temp = tempfile::tempdir().unwrap();
    let result = executor(temp.path())
        .execute(&shell_entry("slow", "sleep 0.15", 100, OutputFormat::Generic))
        .await;

    assert!(!result.success);
    assert!(result.timed_out);
    assert_eq!(result.error.as_deref(), Some("timed out after 100ms"));
    assert_eq!(result.error_kind, Some(ErrorKind::ExecutionTimeout));
}

#[tokio::test]
async fn test_fast_tool_within_budget_passes() {
    let temp = tempfile::tempdir().unwrap();
    let result = executor(temp.path())
        .execute(&shell_entry("quick", "sleep 0.05", 100, OutputFormat::Generic))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.exit_code, Some(0));
}

#[tokio::test]
async fn test_crash_keeps_siblings_running() {
    let temp = tempfile::tempdir().unwrap();
    let entries = vec![
        shell_entry(
            "lint",
            "echo 'src/app.py:3:5: E501 line too long' ; exit 1",
            5_000,
            OutputFormat::CompilerStyle,
        ),
        shell_entry("ok", "exit 0", 5_000, OutputFormat::Generic),
        shell_entry("boom", "echo broken >&2; exit 2", 5_000, OutputFormat::Generic),
    ];

    let results = executor(temp.path()).execute_entries(&entries).await;
    let names: Vec<&str> = results.iter().map(|r| r.tool.name.as_str()).collect();
    assert_eq!(names, vec!["lint", "ok", "boom"]);

    let lint = &results[0];
    assert!(!lint.success);
    assert_eq!(lint.violations.len(), 1);
    assert_eq!(lint.violations[0].file_path, "src/app.py");
    assert_eq!(lint.violations[0].line, Some(3));

    assert!(results[1].success);

    let boom = &results[2];
    assert_eq!(boom.exit_code, Some(2));
    assert!(boom.error.as_deref().unwrap_or_default().contains("broken"));
    assert_eq!(boom.violations[0].severity, Severity::Error);
}
