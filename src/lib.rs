//! QA Cascade
//!
//! Context-aware QA orchestration. A run classifies the current change from
//! git, maps it to quality dimensions, validates and configures the matching
//! tools, runs them with bounded concurrency and reports the result:
//!
//! - `cli` - Command-line surface
//! - `orchestrator` - Run state machine (`Orchestrator`)
//! - `reporting` - Result aggregation and rendering (`RunReport`)
//! - `feedback` - Issue reports and local issue history (`FeedbackManager`)
//! - `utils` - Errors, logging and state paths

pub mod cli;
pub mod feedback;
pub mod orchestrator;
pub mod reporting;
pub mod utils;

pub use feedback::{FeedbackManager, IssueReport, IssueSource, IssueStore};
pub use orchestrator::{FatalError, Orchestrator, RunOptions, RunOutcome, RunState};
pub use reporting::{render, ReportFormat, RunReport, TreeFormatter, ViolationAnalyzer};
pub use utils::error::{AppError, AppResult};
