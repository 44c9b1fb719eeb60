//! Environment Discovery
//!
//! Finds the interpreters, virtual environment and package managers a project
//! uses so tool invocations resolve to project-local installs:
//!
//! - `VenvManager` / `ToolEnvironment` - virtualenv activation applied to spawned tools
//! - `PackageManagerService` - lockfile-based npm/pnpm/yarn/bun and uv/poetry/pipenv/pip detection
//! - `CommandResolver` - maps a catalog entry to the program that should run
//! - `EnvironmentChecker` - the pre-execution gate

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use qa_cascade_core::{CoreError, CoreResult};

use crate::catalog::{PackageTask, Runtime, ToolSpec};

/// Variables touched by venv activation.
const VENV_VARS: [&str; 3] = ["PATH", "VIRTUAL_ENV", "PYTHONHOME"];

/// Locate an executable on `PATH`.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| executable_in(&dir, name))
}

/// Locate an executable inside one directory.
pub fn executable_in(dir: &Path, name: &str) -> Option<PathBuf> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        return Some(candidate);
    }
    if cfg!(windows) {
        for ext in ["exe", "cmd", "bat"] {
            let candidate = dir.join(format!("{}.{}", name, ext));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn venv_bin_dir(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    }
}

// ============================================================================
// VenvManager
// ============================================================================

/// Discovers and activates a project's Python virtual environment.
#[derive(Debug, Clone, Default)]
pub struct VenvManager {
    venv: Option<PathBuf>,
}

impl VenvManager {
    /// Candidate directory names checked under the project root.
    pub const CANDIDATES: [&'static str; 3] = [".venv", "venv", "env"];

    /// Discover a venv: `$VIRTUAL_ENV` first, then the conventional
    /// directories under `project_root`.
    pub fn discover(project_root: &Path) -> Self {
        Self::discover_with(std::env::var_os("VIRTUAL_ENV").map(PathBuf::from), project_root)
    }

    /// [`VenvManager::discover`] with an explicit `$VIRTUAL_ENV` value.
    pub fn discover_with(virtual_env: Option<PathBuf>, project_root: &Path) -> Self {
        let from_env = virtual_env.filter(|p| p.is_dir());
        let venv = from_env.or_else(|| {
            Self::CANDIDATES
                .iter()
                .map(|name| project_root.join(name))
                .find(|dir| dir.join("pyvenv.cfg").is_file() || venv_bin_dir(dir).join("python").exists())
        });
        if let Some(ref venv) = venv {
            tracing::debug!(venv = %venv.display(), "Discovered virtual environment");
        }
        Self { venv }
    }

    pub fn at(venv: impl Into<PathBuf>) -> Self {
        Self {
            venv: Some(venv.into()),
        }
    }

    pub fn venv_path(&self) -> Option<&Path> {
        self.venv.as_deref()
    }

    pub fn bin_dir(&self) -> Option<PathBuf> {
        self.venv.as_deref().map(venv_bin_dir)
    }

    /// Activate the venv on `env`.
    ///
    /// Returns `None` when there is no venv or `env` already carries an
    /// activation; `env` is left untouched in both cases. Handing the returned
    /// activation to [`VenvActivation::deactivate`] restores every entry it
    /// changed.
    pub fn activate(&self, env: &mut ToolEnvironment) -> Option<VenvActivation> {
        let venv = self.venv.as_deref()?;
        if env.venv_active {
            tracing::debug!("Virtual environment already active; skipping activation");
            return None;
        }

        let saved = VENV_VARS.iter().map(|name| (*name, env.entry(name))).collect();

        let mut paths = vec![venv_bin_dir(venv)];
        if let Some(current) = env.var("PATH") {
            paths.extend(std::env::split_paths(&current));
        }
        match std::env::join_paths(paths) {
            Ok(joined) => env.set("PATH", joined.to_string_lossy()),
            Err(e) => tracing::warn!("Could not prepend venv to PATH: {}", e),
        }
        env.set("VIRTUAL_ENV", venv.to_string_lossy());
        env.unset("PYTHONHOME");
        env.venv_active = true;

        tracing::info!(venv = %venv.display(), "Activated virtual environment");
        Some(VenvActivation { saved })
    }
}

/// One venv activation. Restores the saved entries exactly, including
/// variables that had no entry before activation.
#[derive(Debug)]
#[must_use = "an activation should be deactivated when the run is over"]
pub struct VenvActivation {
    saved: Vec<(&'static str, Option<Option<String>>)>,
}

impl VenvActivation {
    pub fn deactivate(self, env: &mut ToolEnvironment) {
        for (name, entry) in self.saved {
            env.restore_entry(name, entry);
        }
        env.venv_active = false;
        tracing::debug!("Deactivated virtual environment");
    }
}

// ============================================================================
// ToolEnvironment
// ============================================================================

/// Variables layered over the inherited environment when tools are spawned.
///
/// `Some` sets a variable and `None` removes it; names without an entry are
/// inherited unchanged. The process environment itself is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolEnvironment {
    vars: BTreeMap<String, Option<String>>,
    venv_active: bool,
}

impl ToolEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective value of `name` for a spawned tool.
    pub fn var(&self, name: &str) -> Option<String> {
        match self.vars.get(name) {
            Some(value) => value.clone(),
            None => std::env::var(name).ok(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), Some(value.into()));
    }

    pub fn unset(&mut self, name: impl Into<String>) {
        self.vars.insert(name.into(), None);
    }

    /// Variables to set on spawn.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (name.as_str(), v)))
    }

    /// Variables to remove on spawn.
    pub fn removals(&self) -> impl Iterator<Item = &str> {
        self.vars
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn venv_active(&self) -> bool {
        self.venv_active
    }

    fn entry(&self, name: &str) -> Option<Option<String>> {
        self.vars.get(name).cloned()
    }

    fn restore_entry(&mut self, name: &str, entry: Option<Option<String>>) {
        match entry {
            Some(value) => {
                self.vars.insert(name.to_string(), value);
            }
            None => {
                self.vars.remove(name);
            }
        }
    }
}

// ============================================================================
// Package managers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodePackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl NodePackageManager {
    pub fn binary(&self) -> &'static str {
        match self {
            NodePackageManager::Npm => "npm",
            NodePackageManager::Pnpm => "pnpm",
            NodePackageManager::Yarn => "yarn",
            NodePackageManager::Bun => "bun",
        }
    }

    pub fn run_script_args(&self, script: &str) -> Vec<String> {
        vec!["run".to_string(), script.to_string()]
    }

    pub fn audit_args(&self) -> Vec<String> {
        match self {
            NodePackageManager::Npm => vec!["audit".into(), "--audit-level=high".into()],
            NodePackageManager::Pnpm => vec!["audit".into(), "--audit-level".into(), "high".into()],
            NodePackageManager::Yarn => vec!["audit".into(), "--level".into(), "high".into()],
            NodePackageManager::Bun => vec!["audit".into()],
        }
    }

    fn from_package_manager_field(value: &str) -> Option<Self> {
        match value.split('@').next()? {
            "npm" => Some(NodePackageManager::Npm),
            "pnpm" => Some(NodePackageManager::Pnpm),
            "yarn" => Some(NodePackageManager::Yarn),
            "bun" => Some(NodePackageManager::Bun),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PythonPackageManager {
    Uv,
    Poetry,
    Pipenv,
    Pip,
}

impl PythonPackageManager {
    pub fn binary(&self) -> &'static str {
        match self {
            PythonPackageManager::Uv => "uv",
            PythonPackageManager::Poetry => "poetry",
            PythonPackageManager::Pipenv => "pipenv",
            PythonPackageManager::Pip => "pip",
        }
    }

    /// Prefix that runs a command inside the manager's environment.
    pub fn run_prefix(&self) -> Option<Vec<String>> {
        match self {
            PythonPackageManager::Pip => None,
            other => Some(vec![other.binary().to_string(), "run".to_string()]),
        }
    }
}

/// Package managers detected from lockfiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManagerService {
    pub node: Option<NodePackageManager>,
    pub python: Option<PythonPackageManager>,
}

impl PackageManagerService {
    pub fn detect(project_root: &Path) -> Self {
        Self {
            node: detect_node_manager(project_root),
            python: detect_python_manager(project_root),
        }
    }
}

fn detect_node_manager(root: &Path) -> Option<NodePackageManager> {
    let manifest = root.join("package.json");
    if !manifest.is_file() {
        return None;
    }

    let declared = std::fs::read_to_string(&manifest)
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .and_then(|json| {
            json.get("packageManager")
                .and_then(|v| v.as_str())
                .and_then(NodePackageManager::from_package_manager_field)
        });
    if declared.is_some() {
        return declared;
    }

    let by_lockfile = [
        ("pnpm-lock.yaml", NodePackageManager::Pnpm),
        ("yarn.lock", NodePackageManager::Yarn),
        ("bun.lockb", NodePackageManager::Bun),
        ("bun.lock", NodePackageManager::Bun),
        ("package-lock.json", NodePackageManager::Npm),
    ];
    Some(
        by_lockfile
            .iter()
            .find(|(file, _)| root.join(file).is_file())
            .map(|(_, manager)| *manager)
            .unwrap_or(NodePackageManager::Npm),
    )
}

fn detect_python_manager(root: &Path) -> Option<PythonPackageManager> {
    let by_lockfile = [
        ("uv.lock", PythonPackageManager::Uv),
        ("poetry.lock", PythonPackageManager::Poetry),
        ("Pipfile.lock", PythonPackageManager::Pipenv),
        ("Pipfile", PythonPackageManager::Pipenv),
    ];
    if let Some((_, manager)) = by_lockfile.iter().find(|(file, _)| root.join(file).is_file()) {
        return Some(*manager);
    }
    ["pyproject.toml", "requirements.txt", "setup.py"]
        .iter()
        .any(|f| root.join(f).is_file())
        .then_some(PythonPackageManager::Pip)
}

// ============================================================================
// CommandResolver
// ============================================================================

/// Program and leading arguments for one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCommand {
    pub program: String,
    /// Arguments placed before the tool's own arguments
    pub prefix: Vec<String>,
}

impl ResolvedCommand {
    pub fn bare(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix: Vec::new(),
        }
    }
}

/// Resolves catalog entries to project-local programs.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    project_root: PathBuf,
    venv_bin: Option<PathBuf>,
    packages: PackageManagerService,
}

impl CommandResolver {
    pub fn new(project_root: &Path, venv: &VenvManager, packages: PackageManagerService) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            venv_bin: venv.bin_dir(),
            packages,
        }
    }

    pub fn packages(&self) -> &PackageManagerService {
        &self.packages
    }

    pub fn resolve(&self, spec: &ToolSpec) -> ResolvedCommand {
        if let Some(task) = &spec.package_task {
            let manager = self.packages.node.unwrap_or(NodePackageManager::Npm);
            let prefix = match task {
                PackageTask::Script(script) => manager.run_script_args(script),
                PackageTask::Audit => manager.audit_args(),
            };
            return ResolvedCommand {
                program: manager.binary().to_string(),
                prefix,
            };
        }

        match spec.runtime {
            Some(Runtime::Node) => {
                let local_bin = self.project_root.join("node_modules").join(".bin");
                if let Some(path) = executable_in(&local_bin, &spec.binary) {
                    return ResolvedCommand::bare(path.to_string_lossy());
                }
            }
            Some(Runtime::Python) => {
                if let Some(path) = self
                    .venv_bin
                    .as_deref()
                    .and_then(|bin| executable_in(bin, &spec.binary))
                {
                    return ResolvedCommand::bare(path.to_string_lossy());
                }
                if spec.binary == "python" {
                    return ResolvedCommand::bare(self.python_interpreter().unwrap_or_else(|| "python3".to_string()));
                }
                if find_in_path(&spec.binary).is_none() {
                    if let Some(prefix) = self.packages.python.and_then(|m| m.run_prefix()) {
                        if find_in_path(&prefix[0]).is_some() {
                            let (program, rest) = prefix.split_at(1);
                            let mut prefix = rest.to_vec();
                            prefix.push(spec.binary.clone());
                            return ResolvedCommand {
                                program: program[0].clone(),
                                prefix,
                            };
                        }
                    }
                }
            }
            None => {}
        }

        ResolvedCommand::bare(spec.binary.clone())
    }

    /// Python interpreter: the venv's first, then `python3`/`python` on PATH.
    pub fn python_interpreter(&self) -> Option<String> {
        self.venv_bin
            .as_deref()
            .and_then(|bin| executable_in(bin, "python").or_else(|| executable_in(bin, "python3")))
            .or_else(|| find_in_path("python3"))
            .or_else(|| find_in_path("python"))
            .map(|p| p.to_string_lossy().into_owned())
    }

    pub fn node_interpreter(&self) -> Option<String> {
        find_in_path("node").map(|p| p.to_string_lossy().into_owned())
    }
}

// ============================================================================
// EnvironmentChecker
// ============================================================================

/// Snapshot of the resolved environment, attached to reports and issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentReport {
    pub os: String,
    pub arch: String,
    pub python: Option<String>,
    pub node: Option<String>,
    pub venv: Option<String>,
    pub package_managers: PackageManagerService,
}

/// Pre-execution gate.
pub struct EnvironmentChecker<'a> {
    project_root: &'a Path,
    resolver: &'a CommandResolver,
    venv: &'a VenvManager,
}

impl<'a> EnvironmentChecker<'a> {
    pub fn new(project_root: &'a Path, resolver: &'a CommandResolver, venv: &'a VenvManager) -> Self {
        Self {
            project_root,
            resolver,
            venv,
        }
    }

    /// Describe the environment without judging it.
    pub fn snapshot(&self) -> EnvironmentReport {
        EnvironmentReport {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            python: self.resolver.python_interpreter(),
            node: self.resolver.node_interpreter(),
            venv: self.venv.venv_path().map(|p| p.to_string_lossy().into_owned()),
            package_managers: self.resolver.packages().clone(),
        }
    }

    /// Verify the project root exists and every runtime the plan needs has an
    /// interpreter.
    pub fn verify(&self, required: &BTreeSet<Runtime>) -> CoreResult<EnvironmentReport> {
        if !self.project_root.is_dir() {
            return Err(CoreError::environment(format!(
                "project root {} is not a directory",
                self.project_root.display()
            )));
        }

        let report = self.snapshot();
        let missing: Vec<&str> = required
            .iter()
            .filter(|runtime| match runtime {
                Runtime::Python => report.python.is_none(),
                Runtime::Node => report.node.is_none(),
            })
            .map(|runtime| runtime.as_str())
            .collect();

        if !missing.is_empty() {
            return Err(CoreError::environment(format!(
                "no interpreter found for required runtime(s): {}",
                missing.join(", ")
            )));
        }

        tracing::info!(
            python = report.python.as_deref().unwrap_or("-"),
            node = report.node.as_deref().unwrap_or("-"),
            "Environment verified"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use qa_cascade_core::{Dimension, Scope};

    fn make_venv(root: &Path) -> PathBuf {
        let venv = root.join(".venv");
        fs::create_dir_all(venv_bin_dir(&venv)).unwrap();
        fs::write(venv.join("pyvenv.cfg"), "home = /usr/bin\n").unwrap();
        venv
    }

    #[test]
    fn test_discover_conventional_venv() {
        let temp = tempfile::tempdir().unwrap();
        let venv = make_venv(temp.path());

        let manager = VenvManager::discover_with(None, temp.path());
        assert_eq!(manager.venv_path(), Some(venv.as_path()));

        // a stale $VIRTUAL_ENV falls through to the project's own venv
        let manager = VenvManager::discover_with(Some(temp.path().join("gone")), temp.path());
        assert_eq!(manager.venv_path(), Some(venv.as_path()));
    }

    #[test]
    fn test_second_activation_is_refused() {
        let temp = tempfile::tempdir().unwrap();
        let manager = VenvManager::at(make_venv(temp.path()));
        let mut env = ToolEnvironment::new();

        let activation = manager.activate(&mut env).expect("first activation");
        let after_first = env.clone();

        assert!(manager.activate(&mut env).is_none());
        assert_eq!(env, after_first);

        activation.deactivate(&mut env);
        assert!(!env.venv_active());
    }

    #[test]
    fn test_deactivation_restores_exact_state() {
        let temp = tempfile::tempdir().unwrap();
        let venv = make_venv(temp.path());
        let manager = VenvManager::at(&venv);

        let mut env = ToolEnvironment::new();
        env.set("PYTHONHOME", "/opt/python-home");
        let before = env.clone();
        let process_path = std::env::var_os("PATH");

        let activation = manager.activate(&mut env).expect("activation");
        assert_eq!(env.var("VIRTUAL_ENV"), Some(venv.to_string_lossy().into_owned()));
        assert!(env.removals().any(|name| name == "PYTHONHOME"));
        let path = env.var("PATH").unwrap();
        assert!(path.starts_with(&*venv_bin_dir(&venv).to_string_lossy()));

        activation.deactivate(&mut env);
        assert_eq!(env, before);
        // VIRTUAL_ENV had no entry before, so it has none now
        assert!(!env.overrides().any(|(name, _)| name == "VIRTUAL_ENV"));
        assert_eq!(std::env::var_os("PATH"), process_path);
    }

    #[test]
    fn test_package_manager_detection() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("package.json"), "{}").unwrap();
        fs::write(temp.path().join("pnpm-lock.yaml"), "").unwrap();
        fs::write(temp.path().join("pyproject.toml"), "[project]\nname='x'\n").unwrap();
        fs::write(temp.path().join("poetry.lock"), "").unwrap();

        let service = PackageManagerService::detect(temp.path());
        assert_eq!(service.node, Some(NodePackageManager::Pnpm));
        assert_eq!(service.python, Some(PythonPackageManager::Poetry));

        fs::write(temp.path().join("package.json"), r#"{"packageManager":"yarn@4.1.0"}"#).unwrap();
        assert_eq!(PackageManagerService::detect(temp.path()).node, Some(NodePackageManager::Yarn));
    }

    #[test]
    fn test_resolver_prefers_node_modules_bin() {
        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("node_modules").join(".bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("eslint"), "#!/bin/sh\n").unwrap();

        let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), PackageManagerService::default());
        let spec = ToolSpec::new("eslint", "eslint", Dimension::ErrorDetection, Scope::Frontend)
            .with_runtime(Runtime::Node);
        let resolved = resolver.resolve(&spec);
        assert_eq!(PathBuf::from(&resolved.program), bin.join("eslint"));
    }

    #[test]
    fn test_resolver_runs_scripts_through_manager() {
        let temp = tempfile::tempdir().unwrap();
        let packages = PackageManagerService {
            node: Some(NodePackageManager::Pnpm),
            python: None,
        };
        let resolver = CommandResolver::new(temp.path(), &VenvManager::default(), packages);
        let spec = ToolSpec::new("npm-build", "npm", Dimension::BuildVerification, Scope::Frontend)
            .via_package_manager(PackageTask::Script("build".into()));
        let resolved = resolver.resolve(&spec);
        assert_eq!(resolved.program, "pnpm");
        assert_eq!(resolved.prefix, vec!["run", "build"]);
    }

    #[test]
    fn test_verify_rejects_missing_root() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope");
        let venv = VenvManager::default();
        let resolver = CommandResolver::new(&missing, &venv, PackageManagerService::default());
        let checker = EnvironmentChecker::new(&missing, &resolver, &venv);

        let err = checker.verify(&BTreeSet::new()).unwrap_err();
        assert_eq!(err.kind(), qa_cascade_core::ErrorKind::EnvironmentVerification);
    }
}
