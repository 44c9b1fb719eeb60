//! Output Parsers
//!
//! Turns raw tool output into [`Violation`]s. One parser per
//! [`OutputFormat`]; malformed output yields no violations rather than an
//! error. When a tool exits non-zero and nothing could be parsed, a single
//! exit-status violation is synthesized so the failure is never silent.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use qa_cascade_core::{Severity, Violation};
use qa_cascade_quality_gates::OutputFormat;

/// Rule attached to violations synthesized from the exit status.
pub const EXIT_STATUS_RULE: &str = "exit-status";

/// Everything a parser may look at.
pub struct RawOutput<'a> {
    pub tool: &'a str,
    pub stdout: &'a str,
    pub stderr: &'a str,
    pub exit_code: Option<i32>,
    /// Absolute paths under this root are reported relative to it
    pub project_root: &'a Path,
}

/// Parse `raw` according to `format`.
pub fn parse_output(format: OutputFormat, raw: &RawOutput<'_>) -> Vec<Violation> {
    let mut violations = match format {
        OutputFormat::EslintJson => parse_eslint(raw.stdout),
        OutputFormat::RuffJson => parse_ruff(raw.stdout),
        OutputFormat::BanditJson => parse_bandit(raw.stdout),
        OutputFormat::SemgrepJson => parse_semgrep(raw.stdout),
        OutputFormat::HadolintJson => parse_hadolint(raw.stdout),
        OutputFormat::CompilerStyle => parse_compiler_style(raw.tool, &combined(raw)),
        OutputFormat::TypeScript => parse_typescript(raw.stdout),
        OutputFormat::FormatterListing => parse_formatter_listing(&combined(raw)),
        OutputFormat::FileListing => parse_file_listing(raw.stdout),
        OutputFormat::TestFailures => parse_test_failures(&combined(raw)),
        OutputFormat::Generic => Vec::new(),
    };

    for violation in &mut violations {
        violation.file_path = relativize(&violation.file_path, raw.project_root);
    }

    if violations.is_empty() {
        if let Some(code) = raw.exit_code.filter(|c| *c != 0) {
            violations.push(exit_status_violation(raw, code));
        }
    }

    violations
}

fn combined(raw: &RawOutput<'_>) -> String {
    format!("{}\n{}", raw.stdout, raw.stderr)
}

fn exit_status_violation(raw: &RawOutput<'_>, code: i32) -> Violation {
    let message = raw
        .stderr
        .lines()
        .chain(raw.stdout.lines())
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} exited with code {}", raw.tool, code));
    Violation::new(".", Severity::Error, EXIT_STATUS_RULE, message)
}

/// Strip the project root from absolute paths and normalize separators.
pub fn relativize(path: &str, root: &Path) -> String {
    let candidate = Path::new(path);
    let relative = candidate
        .strip_prefix(root)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let normalized = relative.replace('\\', "/");
    match normalized.strip_prefix("./") {
        Some(stripped) => stripped.to_string(),
        None => normalized,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn str_field<'v>(value: &'v Value, key: &str) -> &'v str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn json(stdout: &str) -> Option<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Tool output is not valid JSON: {}", e);
            None
        }
    }
}

// ============================================================================
// JSON formats
// ============================================================================

/// `[{filePath, messages: [{ruleId, severity, message, line, column}]}]`
fn parse_eslint(stdout: &str) -> Vec<Violation> {
    let Some(Value::Array(files)) = json(stdout) else {
        return Vec::new();
    };
    files
        .iter()
        .flat_map(|file| {
            let path = str_field(file, "filePath").to_string();
            file.get("messages")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(move |m| {
                    let severity = match m.get("severity").and_then(Value::as_u64) {
                        Some(2) => Severity::Error,
                        Some(1) => Severity::Warning,
                        _ => Severity::Info,
                    };
                    let rule = m.get("ruleId").and_then(Value::as_str).unwrap_or("eslint");
                    Violation::new(path.clone(), severity, rule, str_field(m, "message"))
                        .at(m.get("line").and_then(as_u32), m.get("column").and_then(as_u32))
                })
        })
        .collect()
}

/// `[{code, message, filename, location: {row, column}}]`
fn parse_ruff(stdout: &str) -> Vec<Violation> {
    let Some(Value::Array(items)) = json(stdout) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| {
            let code = item.get("code").and_then(Value::as_str).unwrap_or("ruff");
            // pyflakes and pycodestyle errors are real defects, the rest is style
            let severity = if code.starts_with('F') || code.starts_with('E') {
                Severity::Error
            } else {
                Severity::Warning
            };
            let location = item.get("location");
            Violation::new(str_field(item, "filename"), severity, code, str_field(item, "message")).at(
                location.and_then(|l| l.get("row")).and_then(as_u32),
                location.and_then(|l| l.get("column")).and_then(as_u32),
            )
        })
        .collect()
}

/// `{results: [{filename, line_number, col_offset, issue_severity, test_id, issue_text}]}`
fn parse_bandit(stdout: &str) -> Vec<Violation> {
    let Some(report) = json(stdout) else {
        return Vec::new();
    };
    report
        .get("results")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|r| {
            Violation::new(
                str_field(r, "filename"),
                Severity::from_tool_label(str_field(r, "issue_severity")),
                str_field(r, "test_id"),
                str_field(r, "issue_text"),
            )
            .at(
                r.get("line_number").and_then(as_u32),
                r.get("col_offset").and_then(as_u32).map(|c| c + 1),
            )
        })
        .collect()
}

/// `{results: [{check_id, path, start: {line, col}, extra: {message, severity}}]}`
fn parse_semgrep(stdout: &str) -> Vec<Violation> {
    let Some(report) = json(stdout) else {
        return Vec::new();
    };
    report
        .get("results")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|r| {
            let extra = r.get("extra");
            let start = r.get("start");
            Violation::new(
                str_field(r, "path"),
                Severity::from_tool_label(extra.map(|e| str_field(e, "severity")).unwrap_or_default()),
                str_field(r, "check_id"),
                extra.map(|e| str_field(e, "message")).unwrap_or_default(),
            )
            .at(
                start.and_then(|s| s.get("line")).and_then(as_u32),
                start.and_then(|s| s.get("col")).and_then(as_u32),
            )
        })
        .collect()
}

/// `[{file, line, column, code, level, message}]`
fn parse_hadolint(stdout: &str) -> Vec<Violation> {
    let Some(Value::Array(items)) = json(stdout) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| {
            Violation::new(
                str_field(item, "file"),
                Severity::from_tool_label(str_field(item, "level")),
                str_field(item, "code"),
                str_field(item, "message"),
            )
            .at(item.get("line").and_then(as_u32), item.get("column").and_then(as_u32))
        })
        .collect()
}

// ============================================================================
// Line formats
// ============================================================================

fn compiler_line() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<file>[^\s:][^:]*?):(?P<line>\d+)(?::(?P<col>\d+))?:?\s+(?P<rest>.+)$").ok()
    })
    .as_ref()
}

fn severity_prefix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[?(?P<sev>error|warning|note|info)\]?(?:\[(?P<rule>[^\]]+)\])?:?\s+(?P<msg>.*)$").ok()
    })
    .as_ref()
}

fn trailing_rule() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+[\[(](?P<rule>[A-Za-z0-9_.-]+)[\])]$").ok())
        .as_ref()
}

/// `path:line[:col]: [severity[rule]:] message`, as emitted by mypy, clippy
/// (short format), go vet, yamllint (parsable) and markdownlint.
fn parse_compiler_style(tool: &str, output: &str) -> Vec<Violation> {
    let Some(line_re) = compiler_line() else {
        return Vec::new();
    };
    output
        .lines()
        .filter_map(|line| line_re.captures(line.trim_end()))
        .map(|caps| {
            let file = caps.name("file").map_or("", |m| m.as_str());
            let line_no = caps.name("line").and_then(|m| m.as_str().parse().ok());
            let column = caps.name("col").and_then(|m| m.as_str().parse().ok());
            let rest = caps.name("rest").map_or("", |m| m.as_str()).trim();

            let (severity, mut rule, mut message) = match severity_prefix().and_then(|re| re.captures(rest)) {
                Some(sev) => (
                    Severity::from_tool_label(sev.name("sev").map_or("", |m| m.as_str())),
                    sev.name("rule").map(|m| m.as_str().to_string()),
                    sev.name("msg").map_or("", |m| m.as_str()).to_string(),
                ),
                None => match markdownlint_rule(rest) {
                    Some((rule, msg)) => (Severity::Warning, Some(rule), msg),
                    None => (Severity::Error, None, rest.to_string()),
                },
            };

            if rule.is_none() {
                if let Some(caps) = trailing_rule().and_then(|re| re.captures(&message)) {
                    let full = caps.get(0).map_or(0, |m| m.start());
                    rule = caps.name("rule").map(|m| m.as_str().to_string());
                    message.truncate(full);
                }
            }

            Violation::new(file, severity, rule.unwrap_or_else(|| tool.to_string()), message)
                .at(line_no, column)
        })
        .collect()
}

/// `MD022/blanks-around-headings Headings should be surrounded...`
fn markdownlint_rule(rest: &str) -> Option<(String, String)> {
    let (rule, message) = rest.split_once(' ')?;
    let is_md = rule.len() > 2 && rule.starts_with("MD") && rule[2..].chars().next()?.is_ascii_digit();
    is_md.then(|| (rule.to_string(), message.trim().to_string()))
}

fn typescript_line() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<file>.+?)\((?P<line>\d+),(?P<col>\d+)\): (?P<sev>error|warning) (?P<code>TS\d+): (?P<msg>.*)$").ok()
    })
    .as_ref()
}

/// `path(line,col): error TSxxxx: message`
fn parse_typescript(stdout: &str) -> Vec<Violation> {
    let Some(re) = typescript_line() else {
        return Vec::new();
    };
    stdout
        .lines()
        .filter_map(|line| re.captures(line.trim_end()))
        .map(|caps| {
            Violation::new(
                caps.name("file").map_or("", |m| m.as_str()),
                Severity::from_tool_label(caps.name("sev").map_or("", |m| m.as_str())),
                caps.name("code").map_or("", |m| m.as_str()),
                caps.name("msg").map_or("", |m| m.as_str()),
            )
            .at(
                caps.name("line").and_then(|m| m.as_str().parse().ok()),
                caps.name("col").and_then(|m| m.as_str().parse().ok()),
            )
        })
        .collect()
}

fn unformatted(path: &str) -> Violation {
    Violation::new(path.trim(), Severity::Warning, "format", "file is not formatted")
}

/// prettier `[warn] path`, black `would reformat path`, rustfmt `Diff in path at line N:`.
fn parse_formatter_listing(output: &str) -> Vec<Violation> {
    let mut violations: Vec<Violation> = Vec::new();
    for line in output.lines().map(str::trim) {
        let path = if let Some(rest) = line.strip_prefix("[warn] ") {
            if rest.contains("Code style issues") || rest.contains(' ') {
                continue;
            }
            rest
        } else if let Some(rest) = line.strip_prefix("would reformat ") {
            rest
        } else if let Some(rest) = line.strip_prefix("Diff in ") {
            strip_line_suffix(rest.split(" at line ").next().unwrap_or(rest))
        } else {
            continue;
        };
        if !violations.iter().any(|v| v.file_path == path) {
            violations.push(unformatted(path));
        }
    }
    violations
}

/// `path:3:` and `path:` both become `path`.
fn strip_line_suffix(location: &str) -> &str {
    let trimmed = location.trim_end_matches(':');
    match trimmed.rsplit_once(':') {
        Some((path, line)) if !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()) => path,
        _ => trimmed,
    }
}

/// One offending path per line (`gofmt -l`).
fn parse_file_listing(stdout: &str) -> Vec<Violation> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(unformatted)
        .collect()
}

fn test_failure(file: &str, message: impl Into<String>) -> Violation {
    Violation::new(file, Severity::Error, "test-failure", message)
}

/// pytest `FAILED path::test - msg`, jest `FAIL path`, cargo `test name ... FAILED`,
/// go `--- FAIL: TestName`.
fn parse_test_failures(output: &str) -> Vec<Violation> {
    let mut violations = Vec::new();
    for line in output.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("FAILED ") {
            let (target, message) = rest.split_once(" - ").unwrap_or((rest, ""));
            let (file, test) = target.split_once("::").unwrap_or((target, target));
            let message = if message.is_empty() {
                format!("{} failed", test)
            } else {
                format!("{} failed: {}", test, message)
            };
            violations.push(test_failure(file, message));
        } else if let Some(rest) = line.strip_prefix("FAIL ") {
            let file = rest.split_whitespace().next().unwrap_or(rest);
            violations.push(test_failure(file, "test suite failed"));
        } else if let Some(name) = line
            .strip_prefix("test ")
            .and_then(|rest| rest.strip_suffix(" ... FAILED"))
        {
            violations.push(test_failure(".", format!("{} failed", name)));
        } else if let Some(rest) = line.strip_prefix("--- FAIL: ") {
            let name = rest.split_whitespace().next().unwrap_or(rest);
            violations.push(test_failure(".", format!("{} failed", name)));
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw<'a>(tool: &'a str, stdout: &'a str, stderr: &'a str, exit_code: i32) -> RawOutput<'a> {
        RawOutput {
            tool,
            stdout,
            stderr,
            exit_code: Some(exit_code),
            project_root: Path::new("/work/project"),
        }
    }

    #[test]
    fn test_eslint_json() {
        let stdout = r#"[{"filePath":"/work/project/src/a.ts","messages":[
            {"ruleId":"no-unused-vars","severity":2,"message":"'x' is unused","line":3,"column":7},
            {"ruleId":null,"severity":1,"message":"Parsing hint","line":9,"column":1}]}]"#;
        let violations = parse_output(OutputFormat::EslintJson, &raw("eslint", stdout, "", 1));
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].file_path, "src/a.ts");
        assert_eq!(violations[0].severity, Severity::Error);
        assert_eq!(violations[0].rule, "no-unused-vars");
        assert_eq!(violations[0].line, Some(3));
        assert_eq!(violations[1].rule, "eslint");
        assert_eq!(violations[1].severity, Severity::Warning);
    }

    #[test]
    fn test_ruff_and_bandit_json() {
        let ruff = r#"[{"code":"F401","message":"`os` imported but unused","filename":"/work/project/app/x.py","location":{"row":1,"column":8}},
                       {"code":"UP006","message":"Use `list`","filename":"app/y.py","location":{"row":4,"column":2}}]"#;
        let violations = parse_output(OutputFormat::RuffJson, &raw("ruff", ruff, "", 1));
        assert_eq!(violations[0].file_path, "app/x.py");
        assert_eq!(violations[0].severity, Severity::Error);
        assert_eq!(violations[1].severity, Severity::Warning);

        let bandit = r#"{"results":[{"filename":"./app/db.py","line_number":12,"col_offset":4,
            "issue_severity":"HIGH","test_id":"B608","issue_text":"SQL injection"}]}"#;
        let violations = parse_output(OutputFormat::BanditJson, &raw("bandit", bandit, "", 1));
        assert_eq!(violations[0].file_path, "app/db.py");
        assert_eq!(violations[0].severity, Severity::Error);
        assert_eq!(violations[0].column, Some(5));
    }

    #[test]
    fn test_semgrep_json() {
        let stdout = r#"{"results":[{"check_id":"js.jwt.hardcoded","path":"src/auth/token.ts",
            "start":{"line":5,"col":3},"extra":{"message":"Hardcoded secret","severity":"WARNING"}}],"errors":[]}"#;
        let violations = parse_output(OutputFormat::SemgrepJson, &raw("semgrep", stdout, "", 1));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "js.jwt.hardcoded");
        assert_eq!(violations[0].severity, Severity::Warning);
    }

    #[test]
    fn test_compiler_style_variants() {
        let output = "\
app/x.py:3:5: error: Incompatible types in assignment  [assignment]
src/main.rs:10:9: warning[unused_variables]: unused variable: `x`
./cmd/main.go:7:2: fmt.Printf format %d has arg of wrong type
ci.yml:1:1: [warning] missing document start \"---\" (document-start)
README.md:3 MD022/blanks-around-headings Headings should be surrounded by blank lines
Found 1 error in 1 file";
        let violations = parse_output(OutputFormat::CompilerStyle, &raw("mypy", output, "", 1));
        assert_eq!(violations.len(), 5);

        assert_eq!(violations[0].rule, "assignment");
        assert_eq!(violations[0].message, "Incompatible types in assignment");
        assert_eq!(violations[0].column, Some(5));

        assert_eq!(violations[1].rule, "unused_variables");
        assert_eq!(violations[1].severity, Severity::Warning);

        assert_eq!(violations[2].file_path, "cmd/main.go");
        assert_eq!(violations[2].severity, Severity::Error);

        assert_eq!(violations[3].rule, "document-start");
        assert_eq!(violations[3].severity, Severity::Warning);

        assert_eq!(violations[4].rule, "MD022/blanks-around-headings");
        assert_eq!(violations[4].line, Some(3));
        assert_eq!(violations[4].column, None);
    }

    #[test]
    fn test_typescript_lines() {
        let stdout = "src/a.ts(4,10): error TS2322: Type 'string' is not assignable to type 'number'.";
        let violations = parse_output(OutputFormat::TypeScript, &raw("tsc", stdout, "", 2));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "TS2322");
        assert_eq!(violations[0].line, Some(4));
        assert_eq!(violations[0].column, Some(10));
    }

    #[test]
    fn test_formatter_listings() {
        let prettier = "Checking formatting...\n[warn] src/a.ts\n[warn] Code style issues found in the above file. Run Prettier with --write to fix.";
        let violations = parse_output(OutputFormat::FormatterListing, &raw("prettier", prettier, "", 1));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].file_path, "src/a.ts");

        let black = "would reformat /work/project/app/x.py\nOh no! 1 file would be reformatted.";
        let violations = parse_output(OutputFormat::FormatterListing, &raw("black", "", black, 1));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].file_path, "app/x.py");

        let rustfmt = "Diff in /work/project/src/lib.rs at line 3:\nDiff in /work/project/src/lib.rs at line 9:";
        let violations = parse_output(OutputFormat::FormatterListing, &raw("cargo-fmt", rustfmt, "", 1));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].file_path, "src/lib.rs");
    }

    #[test]
    fn test_test_failure_lines() {
        let output = "\
FAILED tests/test_auth.py::test_login - AssertionError: 401 != 200
FAIL src/auth.test.ts
test tests::it_parses ... FAILED
--- FAIL: TestToken (0.01s)";
        let violations = parse_output(OutputFormat::TestFailures, &raw("pytest", output, "", 1));
        assert_eq!(violations.len(), 4);
        assert_eq!(violations[0].file_path, "tests/test_auth.py");
        assert_eq!(violations[0].message, "test_login failed: AssertionError: 401 != 200");
        assert_eq!(violations[1].file_path, "src/auth.test.ts");
        assert_eq!(violations[2].message, "tests::it_parses failed");
        assert_eq!(violations[3].message, "TestToken failed");
    }

    #[test]
    fn test_exit_status_fallback() {
        let violations = parse_output(OutputFormat::EslintJson, &raw("eslint", "not json", "Oops! config missing\n", 2));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, EXIT_STATUS_RULE);
        assert_eq!(violations[0].file_path, ".");
        assert_eq!(violations[0].message, "Oops! config missing");

        let clean = parse_output(OutputFormat::Generic, &raw("gitleaks", "", "", 0));
        assert!(clean.is_empty());

        let silent = parse_output(OutputFormat::Generic, &raw("trivy", "", "", 1));
        assert_eq!(silent[0].message, "trivy exited with code 1");
    }
}
