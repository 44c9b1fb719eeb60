//! Tool Catalog
//!
//! Pre-configured external tools, grouped by quality dimension:
//! - Formatting: prettier, black, cargo-fmt, gofmt, markdownlint
//! - Error detection: eslint, tsc, ruff, mypy, clippy, go-vet, hadolint, yamllint
//! - Testing: jest, pytest, cargo-test, go-test
//! - Security: semgrep, bandit, npm-audit, pip-audit, cargo-audit, gitleaks, trivy
//! - Build: npm-build, cargo-check, compileall, go-build
//! - Design metrics: lizard
//! - Data compatibility: alembic, squawk

use std::time::Duration;

use serde::{Deserialize, Serialize};

use qa_cascade_core::{Dimension, Scope, ToolRef, WrapperShape};

/// Interpreter ecosystem a tool is installed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Node,
    Python,
}

impl Runtime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Runtime::Node => "node",
            Runtime::Python => "python",
        }
    }
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format a tool emits, selecting the violation parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    EslintJson,
    RuffJson,
    BanditJson,
    SemgrepJson,
    HadolintJson,
    /// `path:line[:col]: message`
    CompilerStyle,
    /// `path(line,col): error TSxxxx: message`
    TypeScript,
    /// "would reformat x", "[warn] x", "Diff in x at line N"
    FormatterListing,
    /// One offending path per line
    FileListing,
    /// pytest / cargo test / go test failure lines
    TestFailures,
    /// Exit status only
    Generic,
}

/// Work delegated to the project's package manager instead of a binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PackageTask {
    /// `<manager> run <script>`; requires the script in package.json
    Script(String),
    /// `<manager> audit`
    Audit,
}

/// Static description of an external tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub binary: String,
    /// Probe arguments; `None` means a PATH lookup only
    pub probe_args: Option<Vec<String>>,
    pub dimension: Dimension,
    pub scope: Scope,
    /// Technologies the tool applies to; empty means any
    pub technologies: Vec<String>,
    pub shape: WrapperShape,
    /// File-name globs (or path globs when they contain `/`)
    pub file_patterns: Vec<String>,
    pub base_timeout: Duration,
    pub args: Vec<String>,
    pub fast_args: Vec<String>,
    /// May contain `{coverage}`, replaced with the coverage threshold
    pub dod_args: Vec<String>,
    pub runtime: Option<Runtime>,
    /// Marker files that must exist; `a|b` accepts either
    pub prerequisites: Vec<String>,
    pub package_task: Option<PackageTask>,
    pub output: OutputFormat,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, binary: impl Into<String>, dimension: Dimension, scope: Scope) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            probe_args: Some(vec!["--version".to_string()]),
            dimension,
            scope,
            technologies: Vec::new(),
            shape: WrapperShape::WholeProject,
            file_patterns: Vec::new(),
            base_timeout: Duration::from_secs(120),
            args: Vec::new(),
            fast_args: Vec::new(),
            dod_args: Vec::new(),
            runtime: None,
            prerequisites: Vec::new(),
            package_task: None,
            output: OutputFormat::Generic,
        }
    }

    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.args = to_strings(args);
        self
    }

    pub fn with_fast_args(mut self, args: &[&str]) -> Self {
        self.fast_args = to_strings(args);
        self
    }

    pub fn with_dod_args(mut self, args: &[&str]) -> Self {
        self.dod_args = to_strings(args);
        self
    }

    pub fn with_probe(mut self, args: &[&str]) -> Self {
        self.probe_args = Some(to_strings(args));
        self
    }

    /// Probe by PATH lookup only (tools without a cheap version flag).
    pub fn probe_by_lookup(mut self) -> Self {
        self.probe_args = None;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.base_timeout = Duration::from_secs(secs);
        self
    }

    pub fn for_technologies(mut self, technologies: &[&str]) -> Self {
        self.technologies = to_strings(technologies);
        self
    }

    /// Mark the tool as file-scoped over the given patterns.
    pub fn file_scoped(mut self, patterns: &[&str]) -> Self {
        self.shape = WrapperShape::FileScoped;
        self.file_patterns = to_strings(patterns);
        self
    }

    /// Whole-project tool whose relevance is still judged by file patterns.
    pub fn with_patterns(mut self, patterns: &[&str]) -> Self {
        self.file_patterns = to_strings(patterns);
        self
    }

    pub fn with_runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn requires(mut self, markers: &[&str]) -> Self {
        self.prerequisites = to_strings(markers);
        self
    }

    pub fn via_package_manager(mut self, task: PackageTask) -> Self {
        self.package_task = Some(task);
        self
    }

    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn tool_ref(&self) -> ToolRef {
        ToolRef::new(self.name.clone(), self.dimension, self.scope)
    }

    /// Whether the tool is relevant for a technology set.
    pub fn applies_to(&self, technologies: &std::collections::BTreeSet<String>) -> bool {
        self.technologies.is_empty() || self.technologies.iter().any(|t| technologies.contains(t))
    }

    /// Whether a project-relative path matches the tool's file patterns.
    ///
    /// Tools without patterns accept every file.
    pub fn matches_file(&self, relative_path: &str) -> bool {
        if self.file_patterns.is_empty() {
            return true;
        }
        let normalized = relative_path.replace('\\', "/");
        let file_name = normalized.rsplit('/').next().unwrap_or(&normalized);
        let options = glob::MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.file_patterns.iter().any(|pattern| {
            let target = if pattern.contains('/') { normalized.as_str() } else { file_name };
            glob::Pattern::new(pattern)
                .map(|p| p.matches_with(target, options))
                .unwrap_or(false)
        })
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Known substitutes for tools that are not installed.
const ALTERNATIVES: &[(&str, &[&str])] = &[
    ("prettier", &["biome", "dprint"]),
    ("black", &["ruff format", "autopep8"]),
    ("cargo-fmt", &["rustfmt"]),
    ("gofmt", &["goimports"]),
    ("eslint", &["biome", "oxlint"]),
    ("tsc", &["vue-tsc"]),
    ("ruff", &["flake8", "pylint"]),
    ("mypy", &["pyright"]),
    ("clippy", &["cargo check"]),
    ("go-vet", &["staticcheck"]),
    ("hadolint", &["dockerfilelint"]),
    ("yamllint", &["prettier --check"]),
    ("markdownlint", &["remark-lint"]),
    ("jest", &["vitest", "mocha"]),
    ("pytest", &["python -m unittest"]),
    ("semgrep", &["bandit", "njsscan"]),
    ("bandit", &["semgrep"]),
    ("npm-audit", &["osv-scanner"]),
    ("pip-audit", &["safety", "osv-scanner"]),
    ("cargo-audit", &["cargo-deny", "osv-scanner"]),
    ("gitleaks", &["trufflehog", "detect-secrets"]),
    ("trivy", &["checkov", "tfsec"]),
    ("lizard", &["radon", "eslint complexity rule"]),
    ("alembic", &["django makemigrations --check"]),
    ("squawk", &["sqlfluff"]),
];

/// Registry of known tools, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
}

impl ToolCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog with every built-in tool.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.register_formatters();
        catalog.register_linters();
        catalog.register_test_runners();
        catalog.register_security_scanners();
        catalog.register_build_checks();
        catalog.register_design_metrics();
        catalog.register_data_checks();
        catalog
    }

    /// Register a tool, replacing any tool with the same name in place.
    pub fn register(&mut self, spec: ToolSpec) {
        match self.tools.iter_mut().find(|t| t.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.tools.push(spec),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registration index, used as the final plan-ordering tie-breaker.
    pub fn position(&self, name: &str) -> usize {
        self.tools
            .iter()
            .position(|t| t.name == name)
            .unwrap_or(usize::MAX)
    }

    /// Candidate tool names for a dimension, scope and technology set.
    pub fn candidates(
        &self,
        dimension: Dimension,
        scope: Scope,
        technologies: &std::collections::BTreeSet<String>,
    ) -> Vec<String> {
        self.tools
            .iter()
            .filter(|t| t.dimension == dimension)
            .filter(|t| scope.accepts(t.scope))
            .filter(|t| t.applies_to(technologies))
            .map(|t| t.name.clone())
            .collect()
    }

    /// Substitutes to suggest when `name` is unavailable.
    pub fn alternatives(&self, name: &str) -> Vec<String> {
        ALTERNATIVES
            .iter()
            .find(|(tool, _)| *tool == name)
            .map(|(_, alts)| alts.iter().map(|a| a.to_string()).collect())
            .unwrap_or_default()
    }

    fn register_formatters(&mut self) {
        self.register(
            ToolSpec::new("prettier", "prettier", Dimension::Formatting, Scope::Frontend)
                .with_args(&["--check"])
                .with_fast_args(&["--cache"])
                .file_scoped(&["*.ts", "*.tsx", "*.js", "*.jsx", "*.vue", "*.css", "*.scss", "*.html", "*.json", "*.md"])
                .for_technologies(&["javascript", "typescript", "vue", "svelte", "css"])
                .with_runtime(Runtime::Node)
                .with_timeout(60)
                .with_output(OutputFormat::FormatterListing),
        );
        self.register(
            ToolSpec::new("black", "black", Dimension::Formatting, Scope::Backend)
                .with_args(&["--check"])
                .file_scoped(&["*.py"])
                .for_technologies(&["python"])
                .with_runtime(Runtime::Python)
                .with_timeout(60)
                .with_output(OutputFormat::FormatterListing),
        );
        self.register(
            ToolSpec::new("cargo-fmt", "cargo", Dimension::Formatting, Scope::Backend)
                .with_args(&["fmt", "--all", "--", "--check"])
                .with_probe(&["fmt", "--version"])
                .with_patterns(&["*.rs"])
                .for_technologies(&["rust"])
                .with_timeout(60)
                .with_output(OutputFormat::FormatterListing),
        );
        self.register(
            ToolSpec::new("gofmt", "gofmt", Dimension::Formatting, Scope::Backend)
                .with_args(&["-l"])
                .probe_by_lookup()
                .file_scoped(&["*.go"])
                .for_technologies(&["go"])
                .with_timeout(60)
                .with_output(OutputFormat::FileListing),
        );
        self.register(
            ToolSpec::new("markdownlint", "markdownlint", Dimension::Formatting, Scope::Docs)
                .file_scoped(&["*.md", "*.mdx"])
                .with_runtime(Runtime::Node)
                .with_timeout(60)
                .with_output(OutputFormat::CompilerStyle),
        );
    }

    fn register_linters(&mut self) {
        self.register(
            ToolSpec::new("eslint", "eslint", Dimension::ErrorDetection, Scope::Frontend)
                .with_args(&["--format", "json"])
                .with_fast_args(&["--cache"])
                .with_dod_args(&["--max-warnings", "0"])
                .file_scoped(&["*.ts", "*.tsx", "*.js", "*.jsx", "*.vue", "*.mjs", "*.cjs"])
                .for_technologies(&["javascript", "typescript", "vue"])
                .with_runtime(Runtime::Node)
                .requires(&["node_modules"])
                .with_timeout(180)
                .with_output(OutputFormat::EslintJson),
        );
        self.register(
            ToolSpec::new("tsc", "tsc", Dimension::ErrorDetection, Scope::Frontend)
                .with_args(&["--noEmit", "--pretty", "false"])
                .with_fast_args(&["--incremental", "--tsBuildInfoFile", ".qa-cascade/tsbuildinfo"])
                .with_patterns(&["*.ts", "*.tsx"])
                .for_technologies(&["typescript"])
                .with_runtime(Runtime::Node)
                .requires(&["tsconfig.json", "node_modules"])
                .with_timeout(120)
                .with_output(OutputFormat::TypeScript),
        );
        self.register(
            ToolSpec::new("ruff", "ruff", Dimension::ErrorDetection, Scope::Backend)
                .with_args(&["check", "--output-format", "json"])
                .file_scoped(&["*.py", "*.pyi"])
                .for_technologies(&["python"])
                .with_runtime(Runtime::Python)
                .with_timeout(60)
                .with_output(OutputFormat::RuffJson),
        );
        self.register(
            ToolSpec::new("mypy", "mypy", Dimension::ErrorDetection, Scope::Backend)
                .with_args(&["--show-column-numbers", "--no-error-summary", "--no-pretty"])
                .with_dod_args(&["--strict"])
                .file_scoped(&["*.py", "*.pyi"])
                .for_technologies(&["python"])
                .with_runtime(Runtime::Python)
                .with_timeout(180)
                .with_output(OutputFormat::CompilerStyle),
        );
        self.register(
            ToolSpec::new("clippy", "cargo", Dimension::ErrorDetection, Scope::Backend)
                .with_args(&["clippy", "--message-format", "short", "--", "-D", "warnings"])
                .with_probe(&["clippy", "--version"])
                .with_patterns(&["*.rs"])
                .for_technologies(&["rust"])
                .requires(&["Cargo.toml"])
                .with_timeout(300)
                .with_output(OutputFormat::CompilerStyle),
        );
        self.register(
            ToolSpec::new("go-vet", "go", Dimension::ErrorDetection, Scope::Backend)
                .with_args(&["vet", "./..."])
                .with_probe(&["version"])
                .with_patterns(&["*.go"])
                .for_technologies(&["go"])
                .requires(&["go.mod"])
                .with_timeout(120)
                .with_output(OutputFormat::CompilerStyle),
        );
        self.register(
            ToolSpec::new("hadolint", "hadolint", Dimension::ErrorDetection, Scope::Infrastructure)
                .with_args(&["--format", "json", "--no-fail"])
                .file_scoped(&["Dockerfile", "Dockerfile.*", "*.dockerfile"])
                .with_timeout(60)
                .with_output(OutputFormat::HadolintJson),
        );
        self.register(
            ToolSpec::new("yamllint", "yamllint", Dimension::ErrorDetection, Scope::Infrastructure)
                .with_args(&["-f", "parsable"])
                .file_scoped(&["*.yml", "*.yaml"])
                .with_runtime(Runtime::Python)
                .with_timeout(60)
                .with_output(OutputFormat::CompilerStyle),
        );
    }

    fn register_test_runners(&mut self) {
        self.register(
            ToolSpec::new("jest", "jest", Dimension::TestingCoverage, Scope::Frontend)
                .with_args(&["--ci", "--silent"])
                .with_fast_args(&["--onlyChanged", "--bail"])
                .with_dod_args(&["--coverage", "--coverageThreshold={\"global\":{\"lines\":{coverage}}}"])
                .for_technologies(&["javascript", "typescript"])
                .with_runtime(Runtime::Node)
                .requires(&["node_modules"])
                .with_timeout(300)
                .with_output(OutputFormat::TestFailures),
        );
        self.register(
            ToolSpec::new("pytest", "pytest", Dimension::TestingCoverage, Scope::Backend)
                .with_args(&["-q", "-rf"])
                .with_fast_args(&["-x", "--ff"])
                .with_dod_args(&["--cov", "--cov-fail-under={coverage}"])
                .for_technologies(&["python"])
                .with_runtime(Runtime::Python)
                .with_timeout(600)
                .with_output(OutputFormat::TestFailures),
        );
        self.register(
            ToolSpec::new("cargo-test", "cargo", Dimension::TestingCoverage, Scope::Backend)
                .with_args(&["test", "--quiet"])
                .for_technologies(&["rust"])
                .requires(&["Cargo.toml"])
                .with_timeout(600)
                .with_output(OutputFormat::TestFailures),
        );
        self.register(
            ToolSpec::new("go-test", "go", Dimension::TestingCoverage, Scope::Backend)
                .with_args(&["test", "./..."])
                .with_probe(&["version"])
                .with_fast_args(&["-failfast", "-short"])
                .with_dod_args(&["-cover"])
                .for_technologies(&["go"])
                .requires(&["go.mod"])
                .with_timeout(600)
                .with_output(OutputFormat::TestFailures),
        );
    }

    fn register_security_scanners(&mut self) {
        self.register(
            ToolSpec::new("semgrep", "semgrep", Dimension::SecurityAudit, Scope::All)
                .with_args(&["scan", "--json", "--quiet", "--config", "p/default"])
                .file_scoped(&["*.py", "*.ts", "*.tsx", "*.js", "*.jsx", "*.go", "*.java", "*.rb", "*.rs"])
                .with_timeout(300)
                .with_output(OutputFormat::SemgrepJson),
        );
        self.register(
            ToolSpec::new("bandit", "bandit", Dimension::SecurityAudit, Scope::Backend)
                .with_args(&["-f", "json", "-q"])
                .file_scoped(&["*.py"])
                .for_technologies(&["python"])
                .with_runtime(Runtime::Python)
                .with_timeout(180)
                .with_output(OutputFormat::BanditJson),
        );
        self.register(
            ToolSpec::new("npm-audit", "npm", Dimension::SecurityAudit, Scope::Frontend)
                .via_package_manager(PackageTask::Audit)
                .for_technologies(&["javascript", "typescript"])
                .with_runtime(Runtime::Node)
                .requires(&["package-lock.json|pnpm-lock.yaml|yarn.lock|bun.lockb"])
                .with_timeout(120),
        );
        self.register(
            ToolSpec::new("pip-audit", "pip-audit", Dimension::SecurityAudit, Scope::Backend)
                .with_args(&["--progress-spinner", "off"])
                .for_technologies(&["python"])
                .with_runtime(Runtime::Python)
                .requires(&["requirements.txt|pyproject.toml"])
                .with_timeout(180),
        );
        self.register(
            ToolSpec::new("cargo-audit", "cargo", Dimension::SecurityAudit, Scope::Backend)
                .with_args(&["audit"])
                .with_probe(&["audit", "--version"])
                .for_technologies(&["rust"])
                .requires(&["Cargo.lock"])
                .with_timeout(180),
        );
        self.register(
            ToolSpec::new("gitleaks", "gitleaks", Dimension::SecurityAudit, Scope::All)
                .with_args(&["detect", "--no-banner", "--redact", "--source", "."])
                .with_probe(&["version"])
                .with_timeout(120),
        );
        self.register(
            ToolSpec::new("trivy", "trivy", Dimension::SecurityAudit, Scope::Infrastructure)
                .with_args(&["config", "--quiet", "--exit-code", "1", "."])
                .with_patterns(&["Dockerfile", "*.tf", "*.yaml", "*.yml"])
                .with_timeout(300),
        );
    }

    fn register_build_checks(&mut self) {
        self.register(
            ToolSpec::new("npm-build", "npm", Dimension::BuildVerification, Scope::Frontend)
                .via_package_manager(PackageTask::Script("build".to_string()))
                .for_technologies(&["javascript", "typescript"])
                .with_runtime(Runtime::Node)
                .requires(&["node_modules"])
                .with_timeout(300),
        );
        self.register(
            ToolSpec::new("cargo-check", "cargo", Dimension::BuildVerification, Scope::Backend)
                .with_args(&["check", "--all-targets", "--message-format", "short"])
                .for_technologies(&["rust"])
                .requires(&["Cargo.toml"])
                .with_timeout(600)
                .with_output(OutputFormat::CompilerStyle),
        );
        self.register(
            ToolSpec::new("compileall", "python", Dimension::BuildVerification, Scope::Backend)
                .with_args(&["-m", "compileall", "-q"])
                .file_scoped(&["*.py"])
                .for_technologies(&["python"])
                .with_runtime(Runtime::Python)
                .with_timeout(120),
        );
        self.register(
            ToolSpec::new("go-build", "go", Dimension::BuildVerification, Scope::Backend)
                .with_args(&["build", "./..."])
                .with_probe(&["version"])
                .for_technologies(&["go"])
                .requires(&["go.mod"])
                .with_timeout(300)
                .with_output(OutputFormat::CompilerStyle),
        );
    }

    fn register_design_metrics(&mut self) {
        self.register(
            ToolSpec::new("lizard", "lizard", Dimension::DesignMetrics, Scope::All)
                .with_args(&["--warnings_only", "--CCN", "15"])
                .with_dod_args(&["--CCN", "10"])
                .file_scoped(&["*.py", "*.ts", "*.tsx", "*.js", "*.jsx", "*.go", "*.rs", "*.java"])
                .with_runtime(Runtime::Python)
                .with_timeout(120)
                .with_output(OutputFormat::CompilerStyle),
        );
    }

    fn register_data_checks(&mut self) {
        self.register(
            ToolSpec::new("alembic", "alembic", Dimension::DataCompatibility, Scope::Backend)
                .with_args(&["check"])
                .for_technologies(&["python"])
                .with_runtime(Runtime::Python)
                .requires(&["alembic.ini"])
                .with_timeout(120),
        );
        self.register(
            ToolSpec::new("squawk", "squawk", Dimension::DataCompatibility, Scope::Backend)
                .file_scoped(&["*.sql"])
                .with_timeout(60)
                .with_output(OutputFormat::CompilerStyle),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn techs(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_catalog_covers_every_dimension() {
        let catalog = ToolCatalog::builtin();
        for dimension in Dimension::ALL {
            assert!(
                catalog.iter().any(|t| t.dimension == dimension),
                "no tool for {}",
                dimension
            );
        }
    }

    #[test]
    fn test_candidates_respect_scope_and_technology() {
        let catalog = ToolCatalog::builtin();
        let lint = catalog.candidates(Dimension::ErrorDetection, Scope::Frontend, &techs(&["typescript"]));
        assert!(lint.contains(&"eslint".to_string()));
        assert!(lint.contains(&"tsc".to_string()));
        assert!(!lint.contains(&"ruff".to_string()));

        let security = catalog.candidates(Dimension::SecurityAudit, Scope::Frontend, &techs(&["typescript"]));
        assert_eq!(security.first().map(String::as_str), Some("semgrep"));
        assert!(!security.contains(&"bandit".to_string()));
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut catalog = ToolCatalog::builtin();
        let before = catalog.position("ruff");
        catalog.register(
            ToolSpec::new("ruff", "ruff", Dimension::ErrorDetection, Scope::Backend).with_timeout(5),
        );
        assert_eq!(catalog.position("ruff"), before);
        assert_eq!(catalog.get("ruff").unwrap().base_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_matches_file() {
        let catalog = ToolCatalog::builtin();
        let eslint = catalog.get("eslint").unwrap();
        assert!(eslint.matches_file("src/App.TSX"));
        assert!(!eslint.matches_file("server/app.py"));

        let hadolint = catalog.get("hadolint").unwrap();
        assert!(hadolint.matches_file("deploy/Dockerfile"));
        assert!(hadolint.matches_file("Dockerfile.prod"));

        let spec = ToolSpec::new("x", "x", Dimension::DataCompatibility, Scope::Backend)
            .file_scoped(&["migrations/*.sql"]);
        assert!(spec.matches_file("migrations/001_init.sql"));
        assert!(!spec.matches_file("seeds/001.sql"));
    }

    #[test]
    fn test_alternatives_lookup() {
        let catalog = ToolCatalog::builtin();
        assert_eq!(catalog.alternatives("eslint"), vec!["biome", "oxlint"]);
        assert!(catalog.alternatives("unknown-tool").is_empty());
    }
}
