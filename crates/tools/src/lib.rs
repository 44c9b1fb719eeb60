//! QA Cascade Tools
//!
//! Execution side of a QA run. Takes the frozen plan produced by
//! `qa-cascade-quality-gates` and turns it into one `ToolExecutionResult`
//! per entry:
//!
//! - `coordinator` - Wrapper shapes and command assembly (`WrapperCoordinator`)
//! - `executor` - Timed, batched process execution (`ToolExecutor`)
//! - `parsers` - Tool output to `Violation`s (`parse_output`)

pub mod coordinator;
pub mod executor;
pub mod parsers;

pub use coordinator::{FileScopedWrapper, Invocation, ToolWrapper, WholeProjectWrapper, WrapperCoordinator};
pub use executor::{ExecutorConfig, ResultAccumulator, ToolExecutor};
pub use parsers::{parse_output, RawOutput, EXIT_STATUS_RULE};
