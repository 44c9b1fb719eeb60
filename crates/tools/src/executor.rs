//! Tool Executor
//!
//! Runs frozen plan entries as external processes. Every invocation is
//! awaited under its configured timeout; when the budget runs out its whole
//! process group is killed, so wrappers like `npx` leave nothing behind.
//! Entries run in bounded batches; each batch completes before the next one
//! starts. Results are recorded in completion order and returned in plan order.

use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::process::Command;
use tokio::time::timeout;

use qa_cascade_core::ToolExecutionResult;
use qa_cascade_quality_gates::{ExecutionPlan, PlanEntry};

use crate::coordinator::{Invocation, WrapperCoordinator};
use crate::parsers::{parse_output, RawOutput};

/// Longest stderr excerpt attached to a crash message.
const ERROR_DETAIL_LIMIT: usize = 4 * 1024;

/// Executor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Batch size; never exceeded by concurrently running tools
    pub max_concurrency: usize,
    /// Maximum output captured per stream (bytes)
    pub max_output_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_output_size: 4 * 1024 * 1024,
        }
    }
}

/// Append-only result store. Each plan index is written at most once.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    results: Vec<(usize, ToolExecutionResult)>,
}

impl ResultAccumulator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Vec::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, index: usize, result: ToolExecutionResult) {
        if self.results.iter().any(|(i, _)| *i == index) {
            tracing::warn!(index, tool = %result.tool.name, "Duplicate result ignored");
            return;
        }
        self.results.push((index, result));
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Tool names in the order they completed.
    pub fn completion_order(&self) -> Vec<&str> {
        self.results.iter().map(|(_, r)| r.tool.name.as_str()).collect()
    }

    /// Results sorted back into plan order.
    pub fn into_ordered(mut self) -> Vec<ToolExecutionResult> {
        self.results.sort_by_key(|(index, _)| *index);
        self.results.into_iter().map(|(_, r)| r).collect()
    }
}

enum Attempt {
    Exited(Output),
    SpawnFailed(std::io::Error),
    TimedOut,
}

impl Attempt {
    fn is_retryable(&self) -> bool {
        matches!(self, Attempt::SpawnFailed(_) | Attempt::TimedOut)
    }
}

pub struct ToolExecutor {
    coordinator: WrapperCoordinator,
    config: ExecutorConfig,
}

impl ToolExecutor {
    pub fn new(coordinator: WrapperCoordinator, config: ExecutorConfig) -> Self {
        Self { coordinator, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute every entry of a frozen plan.
    pub async fn execute_plan(&self, plan: &ExecutionPlan) -> Vec<ToolExecutionResult> {
        self.execute_entries(plan.entries()).await
    }

    /// Execute `entries` in batches; one result per entry, in input order.
    pub async fn execute_entries(&self, entries: &[PlanEntry]) -> Vec<ToolExecutionResult> {
        let batch_size = self.config.max_concurrency.max(1);
        let mut accumulator = ResultAccumulator::with_capacity(entries.len());

        for (batch_no, batch) in entries.chunks(batch_size).enumerate() {
            let offset = batch_no * batch_size;
            tracing::debug!(batch = batch_no, size = batch.len(), "Starting tool batch");

            let mut running: FuturesUnordered<_> = batch
                .iter()
                .enumerate()
                .map(|(i, entry)| async move { (offset + i, self.execute(entry).await) })
                .collect();
            while let Some((index, result)) = running.next().await {
                accumulator.record(index, result);
            }
        }

        accumulator.into_ordered()
    }

    /// Execute one entry. A file-scoped entry split over several invocations
    /// yields one merged result; a timed-out chunk stops the remaining ones.
    pub async fn execute(&self, entry: &PlanEntry) -> ToolExecutionResult {
        let started = Instant::now();
        let invocations = self.coordinator.invocations(entry);

        let mut merged: Option<ToolExecutionResult> = None;
        for invocation in &invocations {
            let result = self.run_invocation(entry, invocation).await;
            let timed_out = result.timed_out;
            merged = Some(match merged.take() {
                Some(mut acc) => {
                    acc.absorb(result);
                    acc
                }
                None => result,
            });
            if timed_out {
                break;
            }
        }

        let mut result = merged.unwrap_or_else(|| {
            ToolExecutionResult::error(entry.tool.clone(), "no invocation to run", 0)
        });
        result.execution_time_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            tool = %result.tool.name,
            success = result.success,
            violations = result.violations.len(),
            invocations = invocations.len(),
            duration_ms = result.execution_time_ms,
            "Tool finished"
        );
        result
    }

    /// Run one invocation, retrying timeouts and spawn failures per the entry's policy.
    async fn run_invocation(&self, entry: &PlanEntry, invocation: &Invocation) -> ToolExecutionResult {
        let max_attempts = entry.config.retries.count.saturating_add(1);
        let started = Instant::now();
        tracing::debug!(tool = %entry.tool.name, command = %invocation.display(), "Running tool");

        let mut attempt = 1;
        let outcome = loop {
            let outcome = run_once(invocation).await;
            if outcome.is_retryable() && attempt < max_attempts {
                tracing::warn!(tool = %entry.tool.name, attempt, "Tool attempt failed; retrying");
                tokio::time::sleep(entry.config.retries.delay()).await;
                attempt += 1;
                continue;
            }
            break outcome;
        };

        self.build_result(entry, invocation, outcome, started.elapsed())
            .with_attempts(attempt)
    }

    fn build_result(
        &self,
        entry: &PlanEntry,
        invocation: &Invocation,
        outcome: Attempt,
        elapsed: Duration,
    ) -> ToolExecutionResult {
        let elapsed_ms = elapsed.as_millis() as u64;
        match outcome {
            Attempt::Exited(output) => {
                let stdout = truncate_output(&output.stdout, self.config.max_output_size);
                let stderr = truncate_output(&output.stderr, self.config.max_output_size);
                let exit_code = output.status.code();
                let violations = parse_output(
                    entry.output,
                    &RawOutput {
                        tool: &entry.tool.name,
                        stdout: &stdout,
                        stderr: &stderr,
                        exit_code,
                        project_root: self.coordinator.project_root(),
                    },
                );
                if output.status.success() {
                    ToolExecutionResult::passed(entry.tool.clone(), violations, elapsed_ms)
                } else {
                    ToolExecutionResult::crashed(
                        entry.tool.clone(),
                        exit_code.unwrap_or(-1),
                        &truncate_output(stderr.as_bytes(), ERROR_DETAIL_LIMIT),
                        violations,
                        elapsed_ms,
                    )
                }
            }
            Attempt::TimedOut => {
                tracing::warn!(tool = %entry.tool.name, timeout_ms = entry.config.timeout_ms(), "Tool timed out");
                ToolExecutionResult::timed_out(entry.tool.clone(), entry.config.timeout_ms(), elapsed_ms)
            }
            Attempt::SpawnFailed(e) => ToolExecutionResult::error(
                entry.tool.clone(),
                format!("failed to start '{}': {}", invocation.program, e),
                elapsed_ms,
            ),
        }
    }
}

/// Spawn and await one invocation in a process group of its own.
async fn run_once(invocation: &Invocation) -> Attempt {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .envs(&invocation.env)
        .current_dir(&invocation.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for name in &invocation.env_remove {
        cmd.env_remove(name);
    }
    #[cfg(unix)]
    cmd.process_group(0);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return Attempt::SpawnFailed(e),
    };
    let pid = child.id();

    match timeout(invocation.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Attempt::Exited(output),
        Ok(Err(e)) => Attempt::SpawnFailed(e),
        Err(_) => {
            // dropping the wait only kills the direct child
            kill_process_group(pid);
            Attempt::TimedOut
        }
    }
}

/// SIGKILL every process in the group led by `pid`.
fn kill_process_group(pid: Option<u32>) {
    #[cfg(unix)]
    {
        let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        // SAFETY: kill(2) has no memory-safety preconditions; the group was
        // created for this invocation and an empty group only yields ESRCH.
        unsafe {
            let _ = libc::kill(-pid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

/// Lossy UTF-8 decode, cut at a char boundary when longer than `limit`.
fn truncate_output(bytes: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= limit {
        return text.into_owned();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... (output truncated)", &text[..end])
}
