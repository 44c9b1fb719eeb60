//! Shared fixtures.

use std::fs;
use std::path::Path;

use async_trait::async_trait;

use qa_cascade_quality_gates::{ResolvedCommand, ToolProbe};

/// Probe that reports every program as installed.
pub struct AlwaysAvailable;

#[async_trait]
impl ToolProbe for AlwaysAvailable {
    async fn probe(&self, _command: &ResolvedCommand, _probe_args: Option<&[String]>) -> bool {
        true
    }
}

/// Probe that reports only the listed programs as missing.
pub struct MissingPrograms(pub Vec<&'static str>);

#[async_trait]
impl ToolProbe for MissingPrograms {
    async fn probe(&self, command: &ResolvedCommand, _probe_args: Option<&[String]>) -> bool {
        !self.0.contains(&command.program.as_str())
    }
}

pub fn touch(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}
