//! Planning against scratch project trees.

use std::collections::BTreeSet;

use chrono::Utc;
use uuid::Uuid;

use qa_cascade::reporting::{RunMeta, RunReport};
use qa_cascade_core::{ChangeType, Dimension, ErrorKind, ExecutionMode, Priority, Scope, ToolExecutionResult};
use qa_cascade_quality_gates::{
    AvailabilityCache, ChangeSummary, CommandResolver, ContextDetector, DetectionFlags, DiffSummary,
    FileChange, PackageManagerService, PlanRequest, PlanSelector, ProjectProfile, QaConfig,
    ToolCatalog, VenvManager,
};

use crate::common::{touch, AlwaysAvailable, MissingPrograms};

fn security_changes() -> ChangeSummary {
    ChangeSummary::new(
        DiffSummary::from_files(vec![FileChange::new("src/auth/token.ts", 30, 10)]),
        vec!["fix: stop logging session tokens".to_string()],
    )
}

#[test]
fn test_detection_is_deterministic() {
    let detector = ContextDetector::with_technologies(BTreeSet::new());
    let flags = DetectionFlags::default();
    let a = detector.detect(Some("security/fix-token-leak"), &security_changes(), &flags);
    let b = detector.detect(Some("security/fix-token-leak"), &security_changes(), &flags);
    assert_eq!(a, b);
}

#[test]
fn test_empty_diff_still_yields_context() {
    let detector = ContextDetector::with_technologies(BTreeSet::new());
    let context = detector.detect(None, &ChangeSummary::default(), &DetectionFlags::default());
    assert_eq!(context.lines_changed, 0);
    assert_eq!(context.files_affected, 0);
    assert_eq!(context.change_type, ChangeType::Unknown);
    assert!((0.0..=1.0).contains(&context.confidence));
}

#[tokio::test]
async fn test_security_branch_puts_security_first() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "src/auth/token.ts", "export const ttl = 600;\n");

    let context = ContextDetector::with_technologies(BTreeSet::new()).detect(
        Some("security/fix-token-leak"),
        &security_changes(),
        &DetectionFlags::default(),
    );
    assert_eq!(context.change_type, ChangeType::Security);
    assert_eq!(context.lines_changed, 40);

    let catalog = ToolCatalog::builtin();
    let config = QaConfig::default();
    let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), PackageManagerService::default());
    let probe = AlwaysAvailable;
    let profile = ProjectProfile::default();
    let selector = PlanSelector::new(&catalog, &config, &resolver, &probe, temp.path(), &profile);

    let plan = selector
        .build_plan(&context, &PlanRequest::automatic(), &mut AvailabilityCache::new())
        .await;

    let map = plan.dimension_map();
    assert_eq!(map.priority_of(Dimension::SecurityAudit), Priority::Critical);
    assert!(map.priority_of(Dimension::TestingCoverage) >= Priority::High);

    let names: Vec<&str> = plan.tools().map(|t| t.name.as_str()).collect();
    let semgrep = names.iter().position(|n| *n == "semgrep").expect("semgrep planned");
    let prettier = names.iter().position(|n| *n == "prettier").expect("prettier planned");
    assert!(semgrep < prettier, "plan order: {:?}", names);
    assert_eq!(plan.entries()[semgrep].files, vec!["src/auth/token.ts"]);
}

#[tokio::test]
async fn test_lint_dimension_without_git_context() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "web/app.ts", "let a = 1;\n");
    touch(temp.path(), "server/main.py", "print('hi')\n");

    let catalog = ToolCatalog::builtin();
    let config = QaConfig::default();
    let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), PackageManagerService::default());
    let probe = MissingPrograms(vec!["mypy"]);
    let profile = ProjectProfile::default();
    let selector = PlanSelector::new(&catalog, &config, &resolver, &probe, temp.path(), &profile);

    let context = ContextDetector::with_technologies(BTreeSet::from([
        "python".to_string(),
        "typescript".to_string(),
    ]))
    .detect(None, &ChangeSummary::default(), &DetectionFlags::default());
    let request = PlanRequest::from_flags(false, None, Some(Dimension::ErrorDetection), None);
    let plan = selector.build_plan(&context, &request, &mut AvailabilityCache::new()).await;

    assert_eq!(plan.mode(), ExecutionMode::Dimension);
    assert!(!plan.is_empty());
    assert!(plan.tools().all(|t| t.dimension == Dimension::ErrorDetection));
    assert!(plan.unavailable().iter().any(|u| u.tool.name == "mypy"));

    // every dropped tool is accounted for exactly once
    let planned: BTreeSet<&str> = plan.tools().map(|t| t.name.as_str()).collect();
    for dropped in plan.unavailable().iter().map(|u| u.tool.name.as_str()) {
        assert!(!planned.contains(dropped));
    }
}

#[tokio::test]
async fn test_fast_mode_limits_files_to_scope() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "a.ts", "x");
    touch(temp.path(), "b.py", "x");
    touch(temp.path(), "node_modules/.keep", "");

    let catalog = ToolCatalog::builtin();
    let config = QaConfig::default();
    let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), PackageManagerService::default());
    let probe = AlwaysAvailable;
    let profile = ProjectProfile::default();
    let selector = PlanSelector::new(&catalog, &config, &resolver, &probe, temp.path(), &profile)
        .with_changed_files(vec!["a.ts".to_string(), "b.py".to_string()]);

    let context = ContextDetector::with_technologies(BTreeSet::from(["typescript".to_string()]))
        .detect(None, &ChangeSummary::default(), &DetectionFlags::default());
    let request = PlanRequest::from_flags(true, Some(Scope::Frontend), None, None);
    let plan = selector.build_plan(&context, &request, &mut AvailabilityCache::new()).await;

    let eslint = plan.entries().iter().find(|e| e.tool.name == "eslint").expect("eslint planned");
    assert_eq!(eslint.files, vec!["a.ts"]);
    for entry in plan.entries() {
        assert!(!entry.files.contains(&"b.py".to_string()), "{} got b.py", entry.tool.name);
    }
}

#[tokio::test]
async fn test_report_requires_one_result_per_planned_tool() {
    let temp = tempfile::tempdir().unwrap();
    touch(temp.path(), "web/app.ts", "let a = 1;\n");
    touch(temp.path(), "server/main.py", "print('hi')\n");

    let catalog = ToolCatalog::builtin();
    let config = QaConfig::default();
    let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), PackageManagerService::default());
    let probe = AlwaysAvailable;
    let profile = ProjectProfile::default();
    let selector = PlanSelector::new(&catalog, &config, &resolver, &probe, temp.path(), &profile);

    let context = ContextDetector::with_technologies(BTreeSet::from([
        "python".to_string(),
        "typescript".to_string(),
    ]))
    .detect(None, &ChangeSummary::default(), &DetectionFlags::default());
    let request = PlanRequest::from_flags(false, None, Some(Dimension::ErrorDetection), None);
    let plan = selector.build_plan(&context, &request, &mut AvailabilityCache::new()).await;
    assert!(plan.len() >= 2);

    let meta = || RunMeta {
        run_id: Uuid::new_v4(),
        started_at: Utc::now(),
        duration_ms: 0,
        task_id: None,
        environment: None,
        conflicts: None,
    };
    let mut results: Vec<ToolExecutionResult> = plan
        .tools()
        .map(|tool| ToolExecutionResult::passed(tool.clone(), vec![], 1))
        .collect();

    let report = RunReport::build(&plan, &results, meta()).unwrap();
    assert_eq!(report.summary.tools_run, plan.len());

    let err = RunReport::build(&plan, &results[1..], meta()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    results.swap(0, 1);
    let err = RunReport::build(&plan, &results, meta()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}
