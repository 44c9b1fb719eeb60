//! Plan Selection
//!
//! `PlanSelector` composes the mapper, validator and configurator into one
//! frozen [`ExecutionPlan`]:
//!
//! 1. build the dimension map (automatic, explicit scope, explicit dimension or DoD)
//! 2. flatten it into tool refs ordered by priority, then dimension declaration order
//! 3. drop config-disabled, unavailable and prerequisite-missing tools
//! 4. configure each remaining tool for the mode
//! 5. attach a file set per tool
//!
//! Nothing in this module aborts the run: every dropped tool is recorded on
//! the plan with its reason.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use qa_cascade_core::{
    Context, Dimension, DimensionMap, ExecutionMode, Priority, Scope, ToolConfig, ToolRef,
    WrapperShape,
};

use crate::catalog::{OutputFormat, Runtime, ToolCatalog, ToolSpec};
use crate::config::QaConfig;
use crate::configurator::ToolConfigurator;
use crate::discovery::{filter_for_tool, FileDiscoveryService, GitFileService};
use crate::dod::DodProfile;
use crate::environment::{CommandResolver, ResolvedCommand};
use crate::mapper::{ContextMapper, MappingValidation};
use crate::project::ProjectProfile;
use crate::validator::{AvailabilityCache, PrerequisiteIssue, ToolProbe, ToolValidator, UnavailableTool};

/// What the caller asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanRequest {
    pub mode: ExecutionMode,
    pub scope: Option<Scope>,
    pub dimension: Option<Dimension>,
    pub dod: Option<DodProfile>,
}

impl PlanRequest {
    /// Derive the mode from CLI-style flags.
    ///
    /// Precedence: DoD, then fast, then dimension, then scope, then automatic.
    pub fn from_flags(
        fast: bool,
        scope: Option<Scope>,
        dimension: Option<Dimension>,
        dod: Option<DodProfile>,
    ) -> Self {
        let mode = if dod.is_some() {
            ExecutionMode::Dod
        } else if fast {
            ExecutionMode::Fast
        } else if dimension.is_some() {
            ExecutionMode::Dimension
        } else if scope.is_some() {
            ExecutionMode::Scope
        } else {
            ExecutionMode::Automatic
        };
        Self {
            mode,
            scope,
            dimension,
            dod,
        }
    }

    pub fn automatic() -> Self {
        Self::default()
    }
}

/// One frozen plan entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub tool: ToolRef,
    pub priority: Priority,
    pub config: ToolConfig,
    pub command: ResolvedCommand,
    /// Explicit files for file-scoped tools; empty for whole-project tools
    pub files: Vec<String>,
    pub output: OutputFormat,
    pub runtime: Option<Runtime>,
}

impl PlanEntry {
    pub fn shape(&self) -> WrapperShape {
        self.config.shape
    }
}

/// A tool removed before the freeze for a reason other than availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTool {
    pub tool: ToolRef,
    pub reason: String,
}

/// The frozen, ordered execution plan. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    mode: ExecutionMode,
    context: Context,
    dimension_map: DimensionMap,
    validation: MappingValidation,
    entries: Vec<PlanEntry>,
    unavailable: Vec<UnavailableTool>,
    prerequisite_issues: Vec<PrerequisiteIssue>,
    skipped: Vec<SkippedTool>,
}

impl ExecutionPlan {
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn dimension_map(&self) -> &DimensionMap {
        &self.dimension_map
    }

    pub fn validation(&self) -> &MappingValidation {
        &self.validation
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn tools(&self) -> impl Iterator<Item = &ToolRef> {
        self.entries.iter().map(|e| &e.tool)
    }

    pub fn unavailable(&self) -> &[UnavailableTool] {
        &self.unavailable
    }

    pub fn prerequisite_issues(&self) -> &[PrerequisiteIssue] {
        &self.prerequisite_issues
    }

    pub fn skipped(&self) -> &[SkippedTool] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Interpreters the environment gate must find before execution.
    pub fn required_runtimes(&self) -> BTreeSet<Runtime> {
        self.entries.iter().filter_map(|e| e.runtime).collect()
    }
}

/// Builds execution plans for one project.
pub struct PlanSelector<'a> {
    catalog: &'a ToolCatalog,
    config: &'a QaConfig,
    resolver: &'a CommandResolver,
    probe: &'a dyn ToolProbe,
    project_root: &'a Path,
    profile: &'a ProjectProfile,
    discovery: FileDiscoveryService,
    changed_files: Option<Vec<String>>,
}

impl<'a> PlanSelector<'a> {
    pub fn new(
        catalog: &'a ToolCatalog,
        config: &'a QaConfig,
        resolver: &'a CommandResolver,
        probe: &'a dyn ToolProbe,
        project_root: &'a Path,
        profile: &'a ProjectProfile,
    ) -> Self {
        Self {
            catalog,
            config,
            resolver,
            probe,
            project_root,
            profile,
            discovery: FileDiscoveryService::new(project_root, config.execution.walk_depth),
            changed_files: None,
        }
    }

    /// Use this list instead of asking git for changed files in fast mode.
    pub fn with_changed_files(mut self, files: Vec<String>) -> Self {
        self.changed_files = Some(files);
        self
    }

    pub async fn build_plan(
        &self,
        context: &Context,
        request: &PlanRequest,
        cache: &mut AvailabilityCache,
    ) -> ExecutionPlan {
        let mapper = ContextMapper::new(self.catalog, self.config);
        let (dimension_map, file_scope) = self.select_mapping(&mapper, context, request);
        let validation = mapper.validate_mapping(&dimension_map);
        if !validation.is_valid() {
            tracing::warn!(uncovered = ?validation.uncovered, "Activated dimensions without candidate tools");
        }

        let mut skipped = Vec::new();
        let ordered: Vec<(ToolRef, Priority)> = self
            .flatten(&dimension_map)
            .into_iter()
            .filter(|(tool, _)| {
                let disabled = self.config.is_tool_disabled(&tool.name);
                if disabled {
                    skipped.push(SkippedTool {
                        tool: tool.clone(),
                        reason: "disabled by config".to_string(),
                    });
                }
                !disabled
            })
            .collect();

        let validator = ToolValidator::new(
            self.catalog,
            self.resolver,
            self.probe,
            self.project_root,
            self.profile,
        );
        let filtered = validator
            .validate_and_filter_tools(ordered.iter().map(|(t, _)| t.clone()).collect(), cache)
            .await;
        let prerequisite_issues = validator.validate_prerequisites(&filtered.available);
        let blocked: BTreeSet<&str> = prerequisite_issues
            .iter()
            .map(|i| i.tool.name.as_str())
            .collect();

        let configurator = ToolConfigurator::new(self.catalog, self.config);
        let changed = match request.mode {
            ExecutionMode::Fast => Some(self.changed_files()),
            _ => None,
        };

        let survivors: Vec<(ToolRef, Priority)> = ordered
            .into_iter()
            .filter(|(tool, _)| !blocked.contains(tool.name.as_str()) && filtered.available.contains(tool))
            .collect();
        let tools: Vec<ToolRef> = survivors.iter().map(|(tool, _)| tool.clone()).collect();

        let mut entries = Vec::new();
        for (tool, config) in configurator.configure_tools(&tools, request.mode) {
            let Some(spec) = self.catalog.get(&tool.name) else {
                continue;
            };
            let Some(priority) = survivors.iter().find(|(t, _)| *t == tool).map(|(_, p)| *p) else {
                continue;
            };

            let files = match self.resolve_files(spec, file_scope, changed.as_deref()) {
                Ok(files) => files,
                Err(reason) => {
                    tracing::debug!(tool = %tool.name, "{}", reason);
                    skipped.push(SkippedTool { tool, reason });
                    continue;
                }
            };

            entries.push(PlanEntry {
                config,
                command: self.resolver.resolve(spec),
                output: spec.output,
                runtime: spec.runtime,
                priority,
                files,
                tool,
            });
        }

        tracing::info!(
            mode = %request.mode,
            planned = entries.len(),
            unavailable = filtered.unavailable.len(),
            prerequisites = prerequisite_issues.len(),
            skipped = skipped.len(),
            "Execution plan frozen"
        );

        ExecutionPlan {
            mode: request.mode,
            context: context.clone(),
            dimension_map,
            validation,
            entries,
            unavailable: filtered.unavailable,
            prerequisite_issues,
            skipped,
        }
    }

    /// Dimension map plus the scope used for file resolution.
    fn select_mapping(
        &self,
        mapper: &ContextMapper<'_>,
        context: &Context,
        request: &PlanRequest,
    ) -> (DimensionMap, Scope) {
        let technologies = &context.technologies;
        if let Some(profile) = request.dod {
            let scope = request.scope.or(profile.scope()).unwrap_or(context.scope);
            return (mapper.map_for_dod(profile, context), scope);
        }
        match (request.dimension, request.scope) {
            (Some(dimension), scope) => {
                let scope = scope.unwrap_or(Scope::All);
                (mapper.map_for_dimension(dimension, scope, technologies), scope)
            }
            (None, Some(scope)) => (mapper.map_for_scope(scope, technologies), scope),
            (None, None) => (mapper.map(context), context.scope),
        }
    }

    /// Activated tools ordered by priority (critical first), then dimension
    /// declaration order, then catalog registration order.
    fn flatten(&self, map: &DimensionMap) -> Vec<(ToolRef, Priority)> {
        let mut refs: Vec<(ToolRef, Priority)> = map
            .activated()
            .flat_map(|(_, entry)| {
                entry
                    .tools
                    .iter()
                    .filter_map(|name| self.catalog.get(name))
                    .map(move |spec| (spec.tool_ref(), entry.priority))
            })
            .collect();
        refs.sort_by_key(|(tool, priority)| {
            (Reverse(*priority), tool.dimension, self.catalog.position(&tool.name))
        });
        refs
    }

    fn changed_files(&self) -> Vec<String> {
        match &self.changed_files {
            Some(files) => files.clone(),
            None => GitFileService::new(self.project_root).changed_files(),
        }
    }

    fn resolve_files(
        &self,
        spec: &ToolSpec,
        scope: Scope,
        changed: Option<&[String]>,
    ) -> Result<Vec<String>, String> {
        match (spec.shape, changed) {
            (WrapperShape::FileScoped, Some(changed)) => {
                let files = filter_for_tool(changed, spec, scope);
                if files.is_empty() {
                    return Err("no changed files match".to_string());
                }
                Ok(files)
            }
            (WrapperShape::FileScoped, None) => {
                let files = self.discovery.discover(spec, scope);
                if files.is_empty() {
                    return Err("no matching files".to_string());
                }
                Ok(files)
            }
            (WrapperShape::WholeProject, Some(changed)) => {
                if !spec.file_patterns.is_empty() && filter_for_tool(changed, spec, scope).is_empty() {
                    return Err("no changed files match".to_string());
                }
                Ok(Vec::new())
            }
            (WrapperShape::WholeProject, None) => Ok(Vec::new()),
        }
    }
}
