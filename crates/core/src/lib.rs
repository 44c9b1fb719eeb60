//! QA Cascade Core
//!
//! Foundational error types and the run data model shared by every crate in
//! the QA Cascade workspace. This crate has no dependencies on process
//! execution, git, or the filesystem.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`, `ErrorKind`)
//! - `context` - Immutable run classification (`Context`, `ChangeType`, `Scope`)
//! - `dimension` - Quality dimensions and priorities (`Dimension`, `Priority`, `DimensionMap`)
//! - `tool` - Tool identity and computed configuration (`ToolRef`, `ToolConfig`, `ExecutionMode`)
//! - `result` - Execution outcomes (`ToolExecutionResult`, `Violation`, `Severity`)

pub mod context;
pub mod dimension;
pub mod error;
pub mod result;
pub mod tool;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult, ErrorKind};

// ── Context ────────────────────────────────────────────────────────────
pub use context::{ChangeType, ComplexityLevel, Context, ContextSignals, RiskLevel, Scope};

// ── Dimensions ─────────────────────────────────────────────────────────
pub use dimension::{Dimension, DimensionEntry, DimensionMap, Priority};

// ── Tools ──────────────────────────────────────────────────────────────
pub use tool::{ExecutionMode, RetryPolicy, ToolConfig, ToolRef, WrapperShape};

// ── Results ────────────────────────────────────────────────────────────
pub use result::{Severity, ToolExecutionResult, Violation};
