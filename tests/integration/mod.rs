//! Integration Tests
//!
//! Drive the public API end to end: planning against a scratch project tree,
//! process execution with timeouts, and full orchestrated runs.

mod common;

// Context detection and plan building
mod plan_test;

// Tool execution through the wrapper coordinator
mod executor_test;

// Orchestrated runs, reporting and issue history
mod orchestrator_test;
