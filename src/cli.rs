//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use qa_cascade_core::{Dimension, Scope};
use qa_cascade_quality_gates::{DodProfile, PlanRequest, DEFAULT_CONFIG_FILE};

use crate::orchestrator::RunOptions;
use crate::reporting::ReportFormat;

#[derive(Parser, Debug)]
#[command(name = "qa-cascade")]
#[command(version, about = "Context-aware QA orchestration for git working trees", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Task identifier, or a DoD profile name (e.g. `code-review`)
    pub task: Option<String>,

    /// Only check git-changed files with short timeouts
    #[arg(long)]
    pub fast: bool,

    #[arg(long, value_enum)]
    pub scope: Option<ScopeArg>,

    #[arg(long, value_enum)]
    pub dimension: Option<DimensionArg>,

    /// Definition-of-Done checklist to run
    #[arg(long, value_enum)]
    pub dod: Option<DodArg>,

    /// Configuration file, relative to the project root
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    pub report: ReportFormat,

    /// Record an issue automatically when the run fails
    #[arg(long)]
    pub report_issue: bool,

    /// Project root
    #[arg(long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Maximum number of tools running at once
    #[arg(long, value_parser = parse_positive)]
    pub concurrency: Option<usize>,

    /// Branch to check for likely merge conflicts
    #[arg(long)]
    pub target_branch: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Record an issue manually, attaching the last run
    ReportIssue {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,
    },
    /// List recorded issues, newest first
    ListIssues {
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Print issues as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Frontend,
    Backend,
    #[value(alias = "infra")]
    Infrastructure,
    Docs,
    All,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Frontend => Scope::Frontend,
            ScopeArg::Backend => Scope::Backend,
            ScopeArg::Infrastructure => Scope::Infrastructure,
            ScopeArg::Docs => Scope::Docs,
            ScopeArg::All => Scope::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DimensionArg {
    Format,
    Lint,
    Test,
    Security,
    Build,
    All,
}

impl DimensionArg {
    /// `None` for `all`.
    pub fn dimension(self) -> Option<Dimension> {
        match self {
            DimensionArg::Format => Some(Dimension::Formatting),
            DimensionArg::Lint => Some(Dimension::ErrorDetection),
            DimensionArg::Test => Some(Dimension::TestingCoverage),
            DimensionArg::Security => Some(Dimension::SecurityAudit),
            DimensionArg::Build => Some(Dimension::BuildVerification),
            DimensionArg::All => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DodArg {
    CodeReview,
    Integration,
    Performance,
    Security,
    Documentation,
}

impl From<DodArg> for DodProfile {
    fn from(arg: DodArg) -> Self {
        match arg {
            DodArg::CodeReview => DodProfile::CodeReview,
            DodArg::Integration => DodProfile::Integration,
            DodArg::Performance => DodProfile::Performance,
            DodArg::Security => DodProfile::Security,
            DodArg::Documentation => DodProfile::Documentation,
        }
    }
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Cli {
    /// DoD profile from `--dod`, or from a positional task naming one.
    pub fn dod_profile(&self) -> Option<DodProfile> {
        self.dod
            .map(DodProfile::from)
            .or_else(|| self.task.as_deref().and_then(|t| t.parse().ok()))
    }

    /// Positional task, unless it names a DoD profile.
    pub fn task_id(&self) -> Option<String> {
        self.task
            .as_deref()
            .filter(|t| t.parse::<DodProfile>().is_err())
            .map(str::to_string)
    }

    pub fn plan_request(&self) -> PlanRequest {
        PlanRequest::from_flags(
            self.fast,
            self.scope.map(Scope::from),
            self.dimension.and_then(DimensionArg::dimension),
            self.dod_profile(),
        )
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            project_root: self.project.clone(),
            config_path: self.config.clone(),
            request: self.plan_request(),
            task_id: self.task_id(),
            target_branch: self.target_branch.clone(),
            concurrency: self.concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_cascade_core::ExecutionMode;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("qa-cascade").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.report, ReportFormat::Console);
        assert_eq!(cli.config, PathBuf::from("qa-config.json"));
        assert_eq!(cli.plan_request().mode, ExecutionMode::Automatic);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_dimension_and_scope_flags() {
        let cli = parse(&["--dimension", "lint", "--scope", "infra", "--report", "ci-json"]);
        let request = cli.plan_request();
        assert_eq!(request.mode, ExecutionMode::Dimension);
        assert_eq!(request.dimension, Some(Dimension::ErrorDetection));
        assert_eq!(request.scope, Some(Scope::Infrastructure));
        assert_eq!(cli.report, ReportFormat::CiJson);

        let all = parse(&["--dimension", "all"]);
        assert_eq!(all.plan_request().dimension, None);
    }

    #[test]
    fn test_positional_dod_profile() {
        let cli = parse(&["code-review"]);
        assert_eq!(cli.dod_profile(), Some(DodProfile::CodeReview));
        assert_eq!(cli.task_id(), None);
        assert_eq!(cli.plan_request().mode, ExecutionMode::Dod);

        let task = parse(&["QA-42", "--fast"]);
        assert_eq!(task.task_id().as_deref(), Some("QA-42"));
        assert_eq!(task.plan_request().mode, ExecutionMode::Fast);
    }

    #[test]
    fn test_unknown_argument_rejected() {
        assert!(Cli::try_parse_from(["qa-cascade", "--bogus"]).is_err());
        assert!(Cli::try_parse_from(["qa-cascade", "--scope", "mobile"]).is_err());
        assert!(Cli::try_parse_from(["qa-cascade", "--concurrency", "0"]).is_err());
    }

    #[test]
    fn test_subcommands() {
        let cli = parse(&["list-issues", "--limit", "3"]);
        assert_eq!(cli.command, Some(Commands::ListIssues { limit: 3, json: false }));

        let cli = parse(&["report-issue", "--title", "flaky"]);
        assert_eq!(
            cli.command,
            Some(Commands::ReportIssue {
                title: "flaky".to_string(),
                description: String::new(),
            })
        );
    }
}
