//! QA Cascade Quality Gates
//!
//! Everything between a checkout and a frozen execution plan:
//!
//! - `git` - Diff parsing, change classification, complexity and conflict analysis (`GitIntegrator`)
//! - `project` - Marker-file project detection (`ProjectDetector`, `ProjectProfile`)
//! - `detector` - Change classification into a `Context` (`ContextDetector`)
//! - `mapper` - Context to dimension priorities (`ContextMapper`)
//! - `dod` - Definition-of-Done checklists (`DodProfile`)
//! - `catalog` - Known tools and their invocation details (`ToolCatalog`, `ToolSpec`)
//! - `config` - The `qa-config.json` model (`QaConfig`)
//! - `environment` - Venv activation, package managers, environment gate
//! - `validator` - Tool availability probing and prerequisite checks (`ToolValidator`)
//! - `configurator` - Per-mode tool configuration (`ToolConfigurator`)
//! - `discovery` - Per-tool file sets (`GitFileService`, `FileDiscoveryService`)
//! - `plan` - Frozen execution plans (`PlanSelector`, `ExecutionPlan`)
//!
//! Process execution and output parsing live in `qa-cascade-tools`.

pub mod catalog;
pub mod config;
pub mod configurator;
pub mod detector;
pub mod discovery;
pub mod dod;
pub mod environment;
pub mod git;
pub mod mapper;
pub mod plan;
pub mod project;
pub mod validator;

// Git and project detection
pub use git::{
    ChangeSummary, ConflictPrediction, ConflictSeverity, DiffFormat, DiffSummary, FileChange,
    FileClassification, GitIntegrator,
};
pub use project::{detect_project, ProjectDetector, ProjectKind, ProjectProfile};

// Context and mapping
pub use detector::{ContextDetector, DetectionFlags};
pub use dod::DodProfile;
pub use mapper::{ContextMapper, MappingValidation};

// Tools and configuration
pub use catalog::{OutputFormat, Runtime, ToolCatalog, ToolSpec};
pub use config::{QaConfig, DEFAULT_CONFIG_FILE};
pub use configurator::ToolConfigurator;

// Environment
pub use environment::{
    CommandResolver, EnvironmentChecker, EnvironmentReport, PackageManagerService, ResolvedCommand,
    ToolEnvironment, VenvActivation, VenvManager,
};

// Validation, discovery and planning
pub use discovery::{FileDiscoveryService, GitFileService};
pub use plan::{ExecutionPlan, PlanEntry, PlanRequest, PlanSelector, SkippedTool};
pub use validator::{
    AvailabilityCache, CommandProbe, PrerequisiteIssue, ToolProbe, ToolValidator, UnavailableTool,
};
