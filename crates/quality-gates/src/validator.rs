//! Tool Validation
//!
//! Probes candidate tools for availability and checks their project-level
//! prerequisites. Validation only ever degrades a plan; it never fails a run.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;

use qa_cascade_core::ToolRef;

use crate::catalog::{PackageTask, ToolCatalog, ToolSpec};
use crate::environment::{find_in_path, CommandResolver, ResolvedCommand};
use crate::project::ProjectProfile;

/// Availability check for one resolved command.
#[async_trait]
pub trait ToolProbe: Send + Sync {
    /// `probe_args == None` means "is the program present at all".
    async fn probe(&self, command: &ResolvedCommand, probe_args: Option<&[String]>) -> bool;
}

/// Probe that runs the tool's version command.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    timeout: Duration,
}

impl CommandProbe {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for CommandProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn program_exists(program: &str) -> bool {
    let path = Path::new(program);
    if path.components().count() > 1 {
        path.is_file()
    } else {
        find_in_path(program).is_some()
    }
}

#[async_trait]
impl ToolProbe for CommandProbe {
    async fn probe(&self, command: &ResolvedCommand, probe_args: Option<&[String]>) -> bool {
        if !program_exists(&command.program) {
            return false;
        }
        let Some(args) = probe_args else {
            return true;
        };

        let mut cmd = Command::new(&command.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match timeout(self.timeout, cmd.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                tracing::debug!(program = %command.program, "Probe failed to spawn: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!(program = %command.program, "Probe timed out");
                false
            }
        }
    }
}

/// Request-scoped probe results, keyed by program and probe arguments.
///
/// Created once per run and passed down the planning call chain.
#[derive(Debug, Default)]
pub struct AvailabilityCache {
    entries: HashMap<String, bool>,
    probes_run: usize,
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(command: &ResolvedCommand, probe_args: Option<&[String]>) -> String {
        match probe_args {
            Some(args) => format!("{} {}", command.program, args.join(" ")),
            None => format!("{} <lookup>", command.program),
        }
    }

    pub fn get(&self, command: &ResolvedCommand, probe_args: Option<&[String]>) -> Option<bool> {
        self.entries.get(&Self::key(command, probe_args)).copied()
    }

    fn insert(&mut self, command: &ResolvedCommand, probe_args: Option<&[String]>, available: bool) {
        self.entries.insert(Self::key(command, probe_args), available);
        self.probes_run += 1;
    }

    /// Number of probes actually executed.
    pub fn probes_run(&self) -> usize {
        self.probes_run
    }
}

/// A tool dropped because its probe failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableTool {
    pub tool: ToolRef,
    pub reason: String,
    pub alternatives: Vec<String>,
}

/// A tool whose binary exists but whose project setup is incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteIssue {
    pub tool: ToolRef,
    pub missing: Vec<String>,
}

impl PrerequisiteIssue {
    pub fn message(&self) -> String {
        format!("{} requires {}", self.tool.name, self.missing.join(", "))
    }
}

/// Output of [`ToolValidator::validate_and_filter_tools`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolFilterResult {
    pub available: Vec<ToolRef>,
    pub unavailable: Vec<UnavailableTool>,
}

/// Validates candidate tools against the local machine and project.
pub struct ToolValidator<'a> {
    catalog: &'a ToolCatalog,
    resolver: &'a CommandResolver,
    probe: &'a dyn ToolProbe,
    project_root: &'a Path,
    profile: &'a ProjectProfile,
}

impl<'a> ToolValidator<'a> {
    pub fn new(
        catalog: &'a ToolCatalog,
        resolver: &'a CommandResolver,
        probe: &'a dyn ToolProbe,
        project_root: &'a Path,
        profile: &'a ProjectProfile,
    ) -> Self {
        Self {
            catalog,
            resolver,
            probe,
            project_root,
            profile,
        }
    }

    /// Split `tools` into available and unavailable, preserving order.
    ///
    /// Probes for commands not already in `cache` run concurrently.
    pub async fn validate_and_filter_tools(
        &self,
        tools: Vec<ToolRef>,
        cache: &mut AvailabilityCache,
    ) -> ToolFilterResult {
        let resolved: Vec<(ToolRef, Option<(&ToolSpec, ResolvedCommand)>)> = tools
            .into_iter()
            .map(|tool| {
                let spec = self.catalog.get(&tool.name);
                let command = spec.map(|s| (s, self.resolver.resolve(s)));
                (tool, command)
            })
            .collect();

        let mut pending: Vec<(&ResolvedCommand, Option<&[String]>)> = Vec::new();
        for (_, entry) in &resolved {
            if let Some((spec, command)) = entry {
                let args = spec.probe_args.as_deref();
                if cache.get(command, args).is_none()
                    && !pending
                        .iter()
                        .any(|(c, a)| AvailabilityCache::key(c, *a) == AvailabilityCache::key(command, args))
                {
                    pending.push((command, args));
                }
            }
        }

        let outcomes = join_all(
            pending
                .iter()
                .map(|(command, args)| self.probe.probe(command, *args)),
        )
        .await;
        for ((command, args), available) in pending.iter().zip(outcomes) {
            cache.insert(command, *args, available);
        }

        let mut result = ToolFilterResult::default();
        for (tool, entry) in resolved {
            match entry {
                None => result.unavailable.push(UnavailableTool {
                    alternatives: Vec::new(),
                    reason: "not in tool catalog".to_string(),
                    tool,
                }),
                Some((spec, command)) => {
                    if cache.get(&command, spec.probe_args.as_deref()).unwrap_or(false) {
                        result.available.push(tool);
                    } else {
                        tracing::warn!(tool = %tool.name, program = %command.program, "Tool unavailable; dropping from plan");
                        result.unavailable.push(UnavailableTool {
                            alternatives: self.catalog.alternatives(&tool.name),
                            reason: format!("'{}' not found or probe failed", command.program),
                            tool,
                        });
                    }
                }
            }
        }
        result
    }

    /// Flag tools whose project-level requirements are missing.
    pub fn validate_prerequisites(&self, tools: &[ToolRef]) -> Vec<PrerequisiteIssue> {
        let mut issues = Vec::new();
        for tool in tools {
            let Some(spec) = self.catalog.get(&tool.name) else {
                continue;
            };

            let mut missing: Vec<String> = spec
                .prerequisites
                .iter()
                .filter(|marker| {
                    !marker
                        .split('|')
                        .any(|alternative| self.project_root.join(alternative).exists())
                })
                .map(|marker| marker.replace('|', " or "))
                .collect();

            if let Some(PackageTask::Script(script)) = &spec.package_task {
                if !self.profile.has_script(script) {
                    missing.push(format!("package.json script '{}'", script));
                }
            }

            if !missing.is_empty() {
                tracing::warn!(tool = %tool.name, missing = ?missing, "Tool prerequisites missing");
                issues.push(PrerequisiteIssue {
                    tool: tool.clone(),
                    missing,
                });
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::environment::{PackageManagerService, VenvManager};

    /// Probe that reports a fixed set of programs as installed.
    struct StaticProbe {
        installed: BTreeSet<String>,
        calls: AtomicUsize,
    }

    impl StaticProbe {
        fn new(installed: &[&str]) -> Self {
            Self {
                installed: installed.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ToolProbe for StaticProbe {
        async fn probe(&self, command: &ResolvedCommand, _probe_args: Option<&[String]>) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.installed.contains(&command.program)
        }
    }

    fn refs(catalog: &ToolCatalog, names: &[&str]) -> Vec<ToolRef> {
        names
            .iter()
            .map(|n| catalog.get(n).unwrap().tool_ref())
            .collect()
    }

    #[tokio::test]
    async fn test_filter_drops_missing_tools_with_alternatives() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = ToolCatalog::builtin();
        let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), PackageManagerService::default());
        let probe = StaticProbe::new(&["ruff", "semgrep"]);
        let profile = ProjectProfile::default();
        let validator = ToolValidator::new(&catalog, &resolver, &probe, temp.path(), &profile);

        let mut cache = AvailabilityCache::new();
        let result = validator
            .validate_and_filter_tools(refs(&catalog, &["semgrep", "eslint", "ruff"]), &mut cache)
            .await;

        let names: Vec<&str> = result.available.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["semgrep", "ruff"]);
        assert_eq!(result.unavailable.len(), 1);
        assert_eq!(result.unavailable[0].tool.name, "eslint");
        assert_eq!(result.unavailable[0].alternatives, vec!["biome", "oxlint"]);
    }

    #[tokio::test]
    async fn test_cache_avoids_repeat_probes() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = ToolCatalog::builtin();
        let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), PackageManagerService::default());
        let probe = StaticProbe::new(&["cargo"]);
        let profile = ProjectProfile::default();
        let validator = ToolValidator::new(&catalog, &resolver, &probe, temp.path(), &profile);

        let mut cache = AvailabilityCache::new();
        // cargo-test and cargo-check share the same program and probe args
        let tools = refs(&catalog, &["cargo-test", "cargo-check"]);
        validator.validate_and_filter_tools(tools.clone(), &mut cache).await;
        validator.validate_and_filter_tools(tools, &mut cache).await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.probes_run(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_unavailable() {
        let temp = tempfile::tempdir().unwrap();
        let catalog = ToolCatalog::builtin();
        let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), PackageManagerService::default());
        let probe = StaticProbe::new(&[]);
        let profile = ProjectProfile::default();
        let validator = ToolValidator::new(&catalog, &resolver, &probe, temp.path(), &profile);

        let tool = ToolRef::new("made-up", qa_cascade_core::Dimension::Formatting, qa_cascade_core::Scope::All);
        let result = validator
            .validate_and_filter_tools(vec![tool], &mut AvailabilityCache::new())
            .await;
        assert!(result.available.is_empty());
        assert_eq!(result.unavailable[0].reason, "not in tool catalog");
    }

    #[test]
    fn test_prerequisites_flag_missing_markers() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("tsconfig.json"), "{}").unwrap();
        std::fs::write(temp.path().join("yarn.lock"), "").unwrap();

        let catalog = ToolCatalog::builtin();
        let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), PackageManagerService::default());
        let probe = StaticProbe::new(&[]);
        let profile = ProjectProfile::default();
        let validator = ToolValidator::new(&catalog, &resolver, &probe, temp.path(), &profile);

        let issues = validator.validate_prerequisites(&refs(&catalog, &["tsc", "npm-audit", "npm-build", "ruff"]));
        let by_tool: HashMap<&str, &PrerequisiteIssue> =
            issues.iter().map(|i| (i.tool.name.as_str(), i)).collect();

        assert_eq!(by_tool["tsc"].missing, vec!["node_modules"]);
        assert!(!by_tool.contains_key("npm-audit"));
        assert!(by_tool["npm-build"]
            .missing
            .contains(&"package.json script 'build'".to_string()));
        assert!(!by_tool.contains_key("ruff"));
        assert_eq!(by_tool["tsc"].message(), "tsc requires node_modules");
    }
}
