//! Run Orchestrator
//!
//! Sequences one QA run:
//!
//! ```text
//! Idle -> ContextDetected -> PlanBuilt -> EnvironmentVerified -> Executing -> Reported -> Done | Failed
//! ```
//!
//! The environment check is a hard gate: when it fails the run moves straight
//! to `Failed` and no tool is started. Once execution starts, `Reported` is
//! always reached unless the results no longer line up with the plan, which
//! aborts the run as an internal error. The run fails when any executed tool
//! fails.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use qa_cascade_core::{ChangeType, Context, CoreError, CoreResult, ErrorKind};
use qa_cascade_quality_gates::{
    detect_project, AvailabilityCache, CommandProbe, CommandResolver, ContextDetector,
    DetectionFlags, DodProfile, EnvironmentChecker, EnvironmentReport, ExecutionPlan,
    GitIntegrator, PackageManagerService, PlanRequest, PlanSelector, QaConfig, ToolCatalog,
    ToolEnvironment, ToolProbe, VenvManager, DEFAULT_CONFIG_FILE,
};
use qa_cascade_tools::{ExecutorConfig, ToolExecutor, WrapperCoordinator};

use crate::reporting::{RunMeta, RunReport};
use crate::utils::paths::resolve_in_project;

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Idle,
    ContextDetected,
    PlanBuilt,
    EnvironmentVerified,
    Executing,
    Reported,
    Done,
    Failed,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, ContextDetected)
                | (ContextDetected, PlanBuilt)
                | (PlanBuilt, EnvironmentVerified)
                | (EnvironmentVerified, Executing)
                | (Executing, Reported)
                | (Reported, Done)
                | (Reported, Failed)
                // fatal errors before execution
                | (Idle, Failed)
                | (ContextDetected, Failed)
                | (PlanBuilt, Failed)
                | (EnvironmentVerified, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub project_root: PathBuf,
    /// Resolved against `project_root` when relative
    pub config_path: PathBuf,
    pub request: PlanRequest,
    pub task_id: Option<String>,
    pub target_branch: Option<String>,
    /// Batch size override; falls back to `execution.maxConcurrency`
    pub concurrency: Option<usize>,
}

impl RunOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            request: PlanRequest::automatic(),
            task_id: None,
            target_branch: None,
            concurrency: None,
        }
    }
}

/// A run-aborting error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FatalError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CoreError> for FatalError {
    fn from(err: &CoreError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Everything the entry point needs after a run.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    /// Every state entered, in order, starting with `Idle`
    pub history: Vec<RunState>,
    pub context: Option<Context>,
    pub plan: Option<ExecutionPlan>,
    pub environment: Option<EnvironmentReport>,
    pub report: Option<RunReport>,
    pub fatal: Option<FatalError>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.fatal.is_none() && self.report.as_ref().map(|r| r.success).unwrap_or(false)
    }

    pub fn exit_code(&self) -> u8 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

pub struct Orchestrator {
    options: RunOptions,
    catalog: ToolCatalog,
    probe: Box<dyn ToolProbe>,
    changed_files: Option<Vec<String>>,
    state: RunState,
    history: Vec<RunState>,
    context: Option<Context>,
    plan: Option<ExecutionPlan>,
    environment: Option<EnvironmentReport>,
}

impl Orchestrator {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            catalog: ToolCatalog::builtin(),
            probe: Box::new(CommandProbe::new()),
            changed_files: None,
            state: RunState::Idle,
            history: vec![RunState::Idle],
            context: None,
            plan: None,
            environment: None,
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn ToolProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Fast-mode file list to use instead of asking git.
    pub fn with_changed_files(mut self, files: Vec<String>) -> Self {
        self.changed_files = Some(files);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) -> CoreResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::internal(format!(
                "invalid run transition {:?} -> {:?}",
                self.state, next
            )));
        }
        tracing::debug!(from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Execute the run to a terminal state.
    pub async fn run(mut self) -> RunOutcome {
        let (report, fatal) = match self.execute_run().await {
            Ok(report) => {
                let next = if report.success { RunState::Done } else { RunState::Failed };
                match self.transition(next) {
                    Ok(()) => (Some(report), None),
                    Err(e) => (Some(report), Some(FatalError::from(&e))),
                }
            }
            Err(e) => {
                tracing::error!(kind = %e.kind(), "Run aborted: {}", e);
                if !self.state.is_terminal() {
                    self.state = RunState::Failed;
                    self.history.push(RunState::Failed);
                }
                (None, Some(FatalError::from(&e)))
            }
        };

        RunOutcome {
            state: self.state,
            history: self.history,
            context: self.context,
            plan: self.plan,
            environment: self.environment,
            report,
            fatal,
        }
    }

    async fn execute_run(&mut self) -> CoreResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let root = self.options.project_root.clone();
        let request = self.options.request;

        tracing::info!(run_id = %run_id, root = %root.display(), mode = %request.mode, "Starting QA run");

        let config = QaConfig::load_or_default(&resolve_in_project(&root, &self.options.config_path));
        let profile = detect_project(&root);

        // Context
        let git = GitIntegrator::new(&root);
        let branch = git.current_branch();
        let changes = git.collect_changes();
        let flags = DetectionFlags {
            scope: request.scope,
            change_type: match request.dod {
                Some(DodProfile::Security) => Some(ChangeType::Security),
                _ => None,
            },
        };
        let context = ContextDetector::new(&profile).detect(branch.as_deref(), &changes, &flags);
        tracing::info!(
            change_type = %context.change_type,
            scope = %context.scope,
            confidence = context.confidence,
            files = context.files_affected,
            lines = context.lines_changed,
            "Context detected"
        );
        self.context = Some(context.clone());
        self.transition(RunState::ContextDetected)?;

        let conflicts = self
            .options
            .target_branch
            .as_deref()
            .and_then(|target| git.predict_conflicts(target));

        // Plan
        let venv = VenvManager::discover(&root);
        let resolver = CommandResolver::new(&root, &venv, PackageManagerService::detect(&root));
        let mut cache = AvailabilityCache::new();
        let plan = {
            let mut selector = PlanSelector::new(
                &self.catalog,
                &config,
                &resolver,
                self.probe.as_ref(),
                &root,
                &profile,
            );
            if let Some(files) = &self.changed_files {
                selector = selector.with_changed_files(files.clone());
            }
            selector.build_plan(&context, &request, &mut cache).await
        };
        tracing::debug!(
            tools = ?plan.tools().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            coverage = plan.validation().coverage,
            probes = cache.probes_run(),
            "Plan built"
        );
        self.plan = Some(plan.clone());
        self.transition(RunState::PlanBuilt)?;

        // Environment gate
        let checker = EnvironmentChecker::new(&root, &resolver, &venv);
        self.environment = Some(checker.snapshot());
        let environment = checker.verify(&plan.required_runtimes())?;
        self.environment = Some(environment.clone());
        self.transition(RunState::EnvironmentVerified)?;

        // Execution
        let concurrency = self
            .options
            .concurrency
            .unwrap_or(config.execution.max_concurrency)
            .max(1);
        let mut tool_env = ToolEnvironment::new();
        let activation = venv.activate(&mut tool_env);
        let executor = ToolExecutor::new(
            WrapperCoordinator::new(&root).with_environment(tool_env.clone()),
            ExecutorConfig {
                max_concurrency: concurrency,
                ..Default::default()
            },
        );

        self.transition(RunState::Executing)?;
        let results = executor.execute_plan(&plan).await;
        if let Some(activation) = activation {
            activation.deactivate(&mut tool_env);
        }

        // Report
        let report = RunReport::build(
            &plan,
            &results,
            RunMeta {
                run_id,
                started_at,
                duration_ms: clock.elapsed().as_millis() as u64,
                task_id: self.options.task_id.clone(),
                environment: Some(environment),
                conflicts,
            },
        )?;
        self.transition(RunState::Reported)?;

        tracing::info!(
            success = report.success,
            passed = report.summary.tools_passed,
            failed = report.summary.tools_failed,
            elapsed_ms = report.duration_ms,
            "QA run finished"
        );
        Ok(report)
    }
}
