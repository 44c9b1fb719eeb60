//! Wrapper Coordination
//!
//! A tool is invoked through one of two wrapper shapes, chosen at plan time:
//! whole-project wrappers run in the project root and find their own files,
//! file-scoped wrappers receive the plan's file list as trailing arguments.
//! Long file lists are split over several invocations so the command line
//! stays well under the platform's argument limit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use qa_cascade_core::WrapperShape;
use qa_cascade_quality_gates::{PlanEntry, ToolEnvironment};

/// Most files passed to a single file-scoped invocation.
pub const MAX_FILES_PER_INVOCATION: usize = 500;

/// Byte budget for the file arguments of a single invocation.
pub const MAX_FILE_ARG_BYTES: usize = 64 * 1024;

/// A fully specified process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Inherited variables removed before spawning
    pub env_remove: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl Invocation {
    /// Shell-like rendering for logs and issue reports.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Turns a plan entry into one or more invocations.
pub trait ToolWrapper: Send + Sync {
    fn shape(&self) -> WrapperShape;

    /// Never empty.
    fn invocations(&self, entry: &PlanEntry, project_root: &Path) -> Vec<Invocation>;
}

fn base_invocation(entry: &PlanEntry, project_root: &Path) -> Invocation {
    let args = entry
        .command
        .prefix
        .iter()
        .chain(entry.config.args.iter())
        .cloned()
        .collect();
    Invocation {
        program: entry.command.program.clone(),
        args,
        env: entry.config.env.clone(),
        env_remove: Vec::new(),
        cwd: project_root.to_path_buf(),
        timeout: entry.config.timeout,
    }
}

pub struct WholeProjectWrapper;

impl ToolWrapper for WholeProjectWrapper {
    fn shape(&self) -> WrapperShape {
        WrapperShape::WholeProject
    }

    fn invocations(&self, entry: &PlanEntry, project_root: &Path) -> Vec<Invocation> {
        vec![base_invocation(entry, project_root)]
    }
}

pub struct FileScopedWrapper;

impl ToolWrapper for FileScopedWrapper {
    fn shape(&self) -> WrapperShape {
        WrapperShape::FileScoped
    }

    fn invocations(&self, entry: &PlanEntry, project_root: &Path) -> Vec<Invocation> {
        let base = base_invocation(entry, project_root);
        if entry.files.is_empty() {
            return vec![base];
        }
        chunk_files(&entry.files)
            .into_iter()
            .map(|files| {
                let mut invocation = base.clone();
                invocation.args.extend(files.iter().cloned());
                invocation
            })
            .collect()
    }
}

/// Split `files` into runs bounded by count and argument bytes. A single
/// oversized path still gets a chunk of its own.
fn chunk_files(files: &[String]) -> Vec<&[String]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut bytes = 0;
    for (i, file) in files.iter().enumerate() {
        let size = file.len() + 1;
        let count = i - start;
        if count > 0 && (count == MAX_FILES_PER_INVOCATION || bytes + size > MAX_FILE_ARG_BYTES) {
            chunks.push(&files[start..i]);
            start = i;
            bytes = 0;
        }
        bytes += size;
    }
    chunks.push(&files[start..]);
    chunks
}

/// Dispatches each plan entry to the wrapper for its shape.
pub struct WrapperCoordinator {
    project_root: PathBuf,
    environment: ToolEnvironment,
    whole_project: WholeProjectWrapper,
    file_scoped: FileScopedWrapper,
}

impl WrapperCoordinator {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            environment: ToolEnvironment::default(),
            whole_project: WholeProjectWrapper,
            file_scoped: FileScopedWrapper,
        }
    }

    /// Variables layered under each tool's own `env` (venv PATH and friends).
    pub fn with_environment(mut self, environment: ToolEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn wrapper_for(&self, shape: WrapperShape) -> &dyn ToolWrapper {
        match shape {
            WrapperShape::WholeProject => &self.whole_project,
            WrapperShape::FileScoped => &self.file_scoped,
        }
    }

    pub fn invocations(&self, entry: &PlanEntry) -> Vec<Invocation> {
        let mut invocations = self
            .wrapper_for(entry.shape())
            .invocations(entry, &self.project_root);
        if !self.environment.is_empty() {
            for invocation in &mut invocations {
                self.apply_environment(invocation);
            }
        }
        invocations
    }

    /// The tool's own `env` wins over the layered environment.
    fn apply_environment(&self, invocation: &mut Invocation) {
        let mut env: BTreeMap<String, String> = self
            .environment
            .overrides()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        env.append(&mut invocation.env);
        invocation.env_remove = self
            .environment
            .removals()
            .filter(|name| !env.contains_key(*name))
            .map(str::to_string)
            .collect();
        invocation.env = env;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_cascade_core::{Dimension, ExecutionMode, Priority, RetryPolicy, Scope, ToolConfig, ToolRef};
    use qa_cascade_quality_gates::{OutputFormat, ResolvedCommand};

    fn entry(shape: WrapperShape, files: &[&str]) -> PlanEntry {
        PlanEntry {
            tool: ToolRef::new("eslint", Dimension::ErrorDetection, Scope::Frontend),
            priority: Priority::High,
            config: ToolConfig {
                timeout: Duration::from_secs(5),
                args: vec!["--format".to_string(), "json".to_string()],
                env: BTreeMap::from([("CI".to_string(), "1".to_string())]),
                retries: RetryPolicy::none(),
                mode: ExecutionMode::Automatic,
                shape,
            },
            command: ResolvedCommand {
                program: "npx".to_string(),
                prefix: vec!["eslint".to_string()],
            },
            files: files.iter().map(|f| f.to_string()).collect(),
            output: OutputFormat::EslintJson,
            runtime: None,
        }
    }

    fn single(coordinator: &WrapperCoordinator, entry: &PlanEntry) -> Invocation {
        let mut invocations = coordinator.invocations(entry);
        assert_eq!(invocations.len(), 1);
        invocations.remove(0)
    }

    #[test]
    fn test_file_scoped_appends_files() {
        let coordinator = WrapperCoordinator::new("/repo");
        let invocation = single(&coordinator, &entry(WrapperShape::FileScoped, &["src/a.ts", "src/b.ts"]));
        assert_eq!(invocation.program, "npx");
        assert_eq!(invocation.args, vec!["eslint", "--format", "json", "src/a.ts", "src/b.ts"]);
        assert_eq!(invocation.cwd, PathBuf::from("/repo"));
        assert_eq!(invocation.display(), "npx eslint --format json src/a.ts src/b.ts");
    }

    #[test]
    fn test_whole_project_ignores_files() {
        let coordinator = WrapperCoordinator::new("/repo");
        let invocation = single(&coordinator, &entry(WrapperShape::WholeProject, &["src/a.ts"]));
        assert_eq!(invocation.args, vec!["eslint", "--format", "json"]);
        assert_eq!(invocation.env.get("CI").map(String::as_str), Some("1"));
        assert_eq!(invocation.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_dispatch_by_shape() {
        let coordinator = WrapperCoordinator::new("/repo");
        assert_eq!(coordinator.wrapper_for(WrapperShape::FileScoped).shape(), WrapperShape::FileScoped);
        assert_eq!(coordinator.wrapper_for(WrapperShape::WholeProject).shape(), WrapperShape::WholeProject);
    }

    #[test]
    fn test_large_file_lists_are_split() {
        let files: Vec<String> = (0..3000)
            .map(|i| format!("src/features/module_{:04}/component_{:04}.tsx", i, i))
            .collect();
        let mut big = entry(WrapperShape::FileScoped, &[]);
        big.files = files.clone();

        let coordinator = WrapperCoordinator::new("/repo");
        let invocations = coordinator.invocations(&big);
        assert!(invocations.len() >= 6, "{} invocations", invocations.len());

        let mut passed = Vec::new();
        for invocation in &invocations {
            assert_eq!(&invocation.args[..3], ["eslint", "--format", "json"]);
            let chunk = &invocation.args[3..];
            assert!(chunk.len() <= MAX_FILES_PER_INVOCATION);
            assert!(chunk.iter().map(|f| f.len() + 1).sum::<usize>() <= MAX_FILE_ARG_BYTES);
            passed.extend(chunk.iter().cloned());
        }
        assert_eq!(passed, files);
    }

    #[test]
    fn test_chunks_respect_byte_budget() {
        let long = "x".repeat(40 * 1024);
        let files = vec![long.clone(), long.clone(), "a.ts".to_string()];
        let chunks = chunk_files(&files);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], &files[..1]);
        assert_eq!(chunks[1], &files[1..]);
    }

    #[test]
    fn test_environment_layered_under_tool_env() {
        let mut environment = ToolEnvironment::new();
        environment.set("PATH", "/repo/.venv/bin:/usr/bin");
        environment.set("CI", "0");
        environment.unset("PYTHONHOME");

        let coordinator = WrapperCoordinator::new("/repo").with_environment(environment);
        let invocation = single(&coordinator, &entry(WrapperShape::WholeProject, &[]));
        assert_eq!(invocation.env.get("PATH").map(String::as_str), Some("/repo/.venv/bin:/usr/bin"));
        assert_eq!(invocation.env.get("CI").map(String::as_str), Some("1"));
        assert_eq!(invocation.env_remove, vec!["PYTHONHOME"]);
    }
}
