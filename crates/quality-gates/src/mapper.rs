//! Context Mapping
//!
//! Turns a [`Context`] into a [`DimensionMap`]. Priorities are resolved in
//! four passes, each able to build on the previous one:
//!
//! 1. scope x type matrix lookup
//! 2. conditional activation rules (change size, migrations, complexity)
//! 3. per-dimension defaults from the config file
//! 4. path-glob overrides (built-in, then configured), which win outright

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use qa_cascade_core::{
    ChangeType, ComplexityLevel, Context, Dimension, DimensionEntry, DimensionMap, Priority,
    RiskLevel, Scope,
};

use crate::catalog::ToolCatalog;
use crate::config::{ActivationRule, QaConfig};
use crate::dod::DodProfile;

const DESIGN_MEDIUM_LINES: u64 = 200;
const DESIGN_HIGH_LINES: u64 = 500;
const DESIGN_MEDIUM_FILES: usize = 10;

/// Built-in overrides: touching these paths forces the priority.
const BUILTIN_PATH_RULES: &[(&[&str], Dimension, Priority, &str)] = &[(
    &["**/auth/**", "**/*auth*", "**/security/**", "**/crypto/**", "**/*secret*"],
    Dimension::SecurityAudit,
    Priority::Critical,
    "auth/security path touched",
)];

/// Base priority from the scope x type matrix's scope axis.
pub fn matrix_priority(scope: Scope, dimension: Dimension) -> Priority {
    use Dimension::*;
    use Priority::*;

    match scope {
        Scope::Frontend => match dimension {
            Formatting => High,
            ErrorDetection => High,
            TestingCoverage => Medium,
            SecurityAudit => Low,
            BuildVerification => Medium,
            DesignMetrics => Low,
            DataCompatibility => Skip,
        },
        Scope::Backend | Scope::Mixed | Scope::All => match dimension {
            Formatting => Medium,
            ErrorDetection => High,
            TestingCoverage => High,
            SecurityAudit => Medium,
            BuildVerification => Medium,
            DesignMetrics => Low,
            DataCompatibility => Low,
        },
        Scope::Infrastructure => match dimension {
            Formatting => Low,
            ErrorDetection => Medium,
            TestingCoverage => Low,
            SecurityAudit => High,
            BuildVerification => High,
            DesignMetrics => Skip,
            DataCompatibility => Skip,
        },
        Scope::Docs => match dimension {
            Formatting => Medium,
            ErrorDetection => Low,
            _ => Skip,
        },
    }
}

/// Type axis of the matrix, applied on top of the scope priority.
fn adjust_for_type(change_type: ChangeType, dimension: Dimension, priority: Priority) -> Priority {
    use Dimension::*;

    match change_type {
        ChangeType::Security => match dimension {
            SecurityAudit => Priority::Critical,
            _ => priority.max(Priority::High),
        },
        ChangeType::Hotfix => match dimension {
            TestingCoverage => priority.max(Priority::High),
            SecurityAudit => priority.max(Priority::Medium),
            Formatting if priority.is_active() => Priority::Low,
            DesignMetrics => Priority::Skip,
            _ => priority,
        },
        ChangeType::Bugfix => match dimension {
            TestingCoverage => priority.max(Priority::High),
            _ => priority,
        },
        ChangeType::Release => match dimension {
            BuildVerification => Priority::Critical,
            TestingCoverage | SecurityAudit => priority.max(Priority::High),
            DataCompatibility => priority.max(Priority::Medium),
            _ => priority,
        },
        ChangeType::Feature => match dimension {
            ErrorDetection => priority.max(Priority::High),
            _ => priority,
        },
        ChangeType::Unknown => priority,
    }
}

fn is_data_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".sql")
        || lower
            .split('/')
            .any(|seg| matches!(seg, "migrations" | "migration" | "alembic" | "schema" | "schemas" | "models"))
        || lower.ends_with("schema.prisma")
        || lower.ends_with("models.py")
}

fn glob_matches(patterns: &[impl AsRef<str>], paths: &[String]) -> bool {
    patterns.iter().any(|pattern| match glob::Pattern::new(pattern.as_ref()) {
        Ok(p) => paths.iter().any(|path| p.matches(path)),
        Err(e) => {
            tracing::debug!(pattern = pattern.as_ref(), "Ignoring invalid glob: {}", e);
            false
        }
    })
}

/// Result of [`ContextMapper::validate_mapping`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingValidation {
    pub activated: usize,
    pub covered: usize,
    /// covered / activated; 1.0 when nothing is activated
    pub coverage: f64,
    /// Activated dimensions with no candidate tool
    pub uncovered: Vec<Dimension>,
}

impl MappingValidation {
    pub fn is_valid(&self) -> bool {
        self.uncovered.is_empty()
    }
}

/// Maps contexts to dimension maps.
pub struct ContextMapper<'a> {
    catalog: &'a ToolCatalog,
    config: &'a QaConfig,
}

impl<'a> ContextMapper<'a> {
    pub fn new(catalog: &'a ToolCatalog, config: &'a QaConfig) -> Self {
        Self { catalog, config }
    }

    /// Full automatic mapping.
    pub fn map(&self, context: &Context) -> DimensionMap {
        let mut map = DimensionMap::new();

        for dimension in Dimension::ALL {
            let mut reasons = vec![format!("scope {}", context.scope)];
            let mut priority = matrix_priority(context.scope, dimension);

            let adjusted = adjust_for_type(context.change_type, dimension, priority);
            if adjusted != priority {
                reasons.push(format!("{} change", context.change_type));
                priority = adjusted;
            }

            priority = self.apply_conditional_rules(context, dimension, priority, &mut reasons);
            priority = self.apply_dimension_defaults(dimension, priority, &mut reasons);
            priority = self.apply_path_overrides(&context.changed_paths, dimension, priority, &mut reasons);

            let tools = self.candidates(dimension, context.scope, &context.technologies);
            map.insert(dimension, DimensionEntry::new(priority, tools, reasons.join("; ")));
        }

        if !map.has_activated() {
            tracing::warn!("Dimension mapping activated nothing; using fallback strategy");
            return self.get_fallback_strategy(&context.technologies);
        }

        map
    }

    /// Mapping for an explicit scope, bypassing change classification.
    pub fn map_for_scope(&self, scope: Scope, technologies: &BTreeSet<String>) -> DimensionMap {
        let mut map = DimensionMap::new();
        for dimension in Dimension::ALL {
            let mut reasons = vec![format!("explicit scope {}", scope)];
            let priority = self.apply_dimension_defaults(
                dimension,
                matrix_priority(scope, dimension),
                &mut reasons,
            );
            let tools = self.candidates(dimension, scope, technologies);
            map.insert(dimension, DimensionEntry::new(priority, tools, reasons.join("; ")));
        }
        map
    }

    /// Mapping with exactly one dimension active.
    pub fn map_for_dimension(
        &self,
        requested: Dimension,
        scope: Scope,
        technologies: &BTreeSet<String>,
    ) -> DimensionMap {
        let mut map = DimensionMap::new();
        for dimension in Dimension::ALL {
            let entry = if dimension == requested {
                DimensionEntry::new(
                    Priority::High,
                    self.candidates(dimension, scope, technologies),
                    "explicitly requested",
                )
            } else {
                DimensionEntry::new(Priority::Skip, Vec::new(), "not requested")
            };
            map.insert(dimension, entry);
        }
        map
    }

    /// Mapping for a Definition-of-Done checklist.
    pub fn map_for_dod(&self, profile: DodProfile, context: &Context) -> DimensionMap {
        let scope = profile.scope().unwrap_or(context.scope);
        let mut map = DimensionMap::new();
        for dimension in Dimension::ALL {
            let entry = match profile.checklist().iter().find(|(d, _)| *d == dimension) {
                Some((_, priority)) => DimensionEntry::new(
                    *priority,
                    self.candidates(dimension, scope, &context.technologies),
                    format!("DoD {}", profile),
                ),
                None => DimensionEntry::new(Priority::Skip, Vec::new(), format!("not in DoD {}", profile)),
            };
            map.insert(dimension, entry);
        }
        map
    }

    /// Medium-priority error-detection + testing-coverage over the whole tree.
    pub fn get_fallback_strategy(&self, technologies: &BTreeSet<String>) -> DimensionMap {
        let mut map = DimensionMap::new();
        for dimension in Dimension::ALL {
            let entry = match dimension {
                Dimension::ErrorDetection | Dimension::TestingCoverage => DimensionEntry::new(
                    Priority::Medium,
                    self.candidates(dimension, Scope::All, technologies),
                    "fallback strategy",
                ),
                _ => DimensionEntry::new(Priority::Skip, Vec::new(), "fallback strategy"),
            };
            map.insert(dimension, entry);
        }
        map
    }

    /// Check that every activated dimension has at least one candidate tool.
    pub fn validate_mapping(&self, map: &DimensionMap) -> MappingValidation {
        let activated: Vec<(Dimension, bool)> = map
            .activated()
            .map(|(d, e)| (d, !e.tools.is_empty()))
            .collect();
        let covered = activated.iter().filter(|(_, has_tools)| *has_tools).count();
        let uncovered: Vec<Dimension> = activated
            .iter()
            .filter(|(_, has_tools)| !*has_tools)
            .map(|(d, _)| *d)
            .collect();
        let coverage = if activated.is_empty() {
            1.0
        } else {
            covered as f64 / activated.len() as f64
        };

        MappingValidation {
            activated: activated.len(),
            covered,
            coverage,
            uncovered,
        }
    }

    fn candidates(&self, dimension: Dimension, scope: Scope, technologies: &BTreeSet<String>) -> Vec<String> {
        self.catalog.candidates(dimension, scope, technologies)
    }

    fn apply_conditional_rules(
        &self,
        context: &Context,
        dimension: Dimension,
        priority: Priority,
        reasons: &mut Vec<String>,
    ) -> Priority {
        let mut promote = |floor: Priority, why: &str, current: Priority| -> Priority {
            if floor > current {
                reasons.push(why.to_string());
                floor
            } else {
                current
            }
        };

        match dimension {
            Dimension::DesignMetrics => {
                if context.lines_changed > DESIGN_HIGH_LINES {
                    promote(Priority::High, "large change", priority)
                } else if context.lines_changed > DESIGN_MEDIUM_LINES
                    || context.files_affected > DESIGN_MEDIUM_FILES
                {
                    promote(Priority::Medium, "sizeable change", priority)
                } else {
                    priority
                }
            }
            Dimension::DataCompatibility if context.touches(is_data_path) => {
                promote(Priority::High, "schema/migration paths changed", priority)
            }
            Dimension::TestingCoverage if context.complexity == ComplexityLevel::High => {
                promote(Priority::High, "high complexity", priority)
            }
            Dimension::SecurityAudit if context.risk >= RiskLevel::High => {
                promote(Priority::High, "high risk", priority)
            }
            _ => priority,
        }
    }

    fn apply_dimension_defaults(
        &self,
        dimension: Dimension,
        priority: Priority,
        reasons: &mut Vec<String>,
    ) -> Priority {
        match self.config.dimensions.get(&dimension).and_then(|d| d.priority) {
            Some(floor) if floor > priority => {
                reasons.push("config default".to_string());
                floor
            }
            _ => priority,
        }
    }

    fn apply_path_overrides(
        &self,
        changed_paths: &[String],
        dimension: Dimension,
        mut priority: Priority,
        reasons: &mut Vec<String>,
    ) -> Priority {
        if changed_paths.is_empty() {
            return priority;
        }

        for (patterns, rule_dimension, rule_priority, why) in BUILTIN_PATH_RULES {
            if *rule_dimension == dimension && glob_matches(&patterns[..], changed_paths) {
                priority = *rule_priority;
                reasons.push(why.to_string());
            }
        }

        for ActivationRule {
            paths,
            dimension: rule_dimension,
            priority: rule_priority,
            reason,
        } in &self.config.activation_rules
        {
            if *rule_dimension == dimension && glob_matches(paths.as_slice(), changed_paths) {
                priority = *rule_priority;
                reasons.push(reason.clone().unwrap_or_else(|| "activation rule".to_string()));
            }
        }

        priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_cascade_core::ContextSignals;

    fn context(change_type: ChangeType, scope: Scope, paths: &[&str], lines: u64) -> Context {
        let mut ctx = Context::fallback(["typescript".to_string(), "python".to_string()].into_iter().collect());
        ctx.change_type = change_type;
        ctx.scope = scope;
        ctx.changed_paths = paths.iter().map(|s| s.to_string()).collect();
        ctx.files_affected = paths.len();
        ctx.lines_changed = lines;
        ctx.signals = ContextSignals::default();
        ctx
    }

    #[test]
    fn test_backend_scope_prioritizes_testing() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::default();
        let mapper = ContextMapper::new(&catalog, &config);
        let map = mapper.map(&context(ChangeType::Unknown, Scope::Backend, &["server/api.py"], 10));
        assert_eq!(map.priority_of(Dimension::TestingCoverage), Priority::High);
        assert!(map.get(Dimension::TestingCoverage).unwrap().tools.contains(&"pytest".to_string()));
    }

    #[test]
    fn test_security_change_on_auth_path() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::default();
        let mapper = ContextMapper::new(&catalog, &config);
        let map = mapper.map(&context(ChangeType::Security, Scope::Frontend, &["src/auth/token.ts"], 40));

        assert_eq!(map.priority_of(Dimension::SecurityAudit), Priority::Critical);
        assert!(map.priority_of(Dimension::TestingCoverage) >= Priority::High);
        for (dimension, entry) in map.activated() {
            assert!(entry.priority >= Priority::High, "{} below high", dimension);
        }
    }

    #[test]
    fn test_security_change_raises_skipped_dimensions() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::default();
        let mapper = ContextMapper::new(&catalog, &config);
        let map = mapper.map(&context(ChangeType::Security, Scope::Docs, &["docs/SECURITY.md"], 6));

        assert_eq!(map.priority_of(Dimension::SecurityAudit), Priority::Critical);
        for dimension in Dimension::ALL {
            assert!(map.priority_of(dimension) >= Priority::High, "{} below high", dimension);
        }
    }

    #[test]
    fn test_auth_path_override_wins_for_feature() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::default();
        let mapper = ContextMapper::new(&catalog, &config);
        let map = mapper.map(&context(ChangeType::Feature, Scope::Frontend, &["web/auth/login.tsx"], 5));
        assert_eq!(map.priority_of(Dimension::SecurityAudit), Priority::Critical);
        assert!(map.get(Dimension::SecurityAudit).unwrap().reason.contains("auth/security path"));
    }

    #[test]
    fn test_configured_rule_applies_last() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::from_json(
            r#"{"activationRules":[{"paths":["docs/**"],"dimension":"error-detection","priority":"skip"}]}"#,
        )
        .unwrap();
        let mapper = ContextMapper::new(&catalog, &config);
        let map = mapper.map(&context(ChangeType::Feature, Scope::Docs, &["docs/intro.md"], 3));
        assert_eq!(map.priority_of(Dimension::ErrorDetection), Priority::Skip);
        assert_eq!(map.priority_of(Dimension::Formatting), Priority::Medium);
    }

    #[test]
    fn test_design_metrics_promote_with_size() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::default();
        let mapper = ContextMapper::new(&catalog, &config);

        let small = mapper.map(&context(ChangeType::Unknown, Scope::Backend, &["a.py"], 20));
        let medium = mapper.map(&context(ChangeType::Unknown, Scope::Backend, &["a.py"], 300));
        let large = mapper.map(&context(ChangeType::Unknown, Scope::Backend, &["a.py"], 900));
        assert_eq!(small.priority_of(Dimension::DesignMetrics), Priority::Low);
        assert_eq!(medium.priority_of(Dimension::DesignMetrics), Priority::Medium);
        assert_eq!(large.priority_of(Dimension::DesignMetrics), Priority::High);
    }

    #[test]
    fn test_migrations_activate_data_compatibility() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::default();
        let mapper = ContextMapper::new(&catalog, &config);
        let map = mapper.map(&context(
            ChangeType::Feature,
            Scope::Backend,
            &["server/migrations/0003_add_index.sql"],
            12,
        ));
        assert_eq!(map.priority_of(Dimension::DataCompatibility), Priority::High);
    }

    #[test]
    fn test_fallback_when_everything_skipped() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::from_json(
            r#"{"activationRules":[
                {"paths":["**"],"dimension":"formatting","priority":"skip"},
                {"paths":["**"],"dimension":"error-detection","priority":"skip"}
            ]}"#,
        )
        .unwrap();
        let mapper = ContextMapper::new(&catalog, &config);
        let map = mapper.map(&context(ChangeType::Unknown, Scope::Docs, &["docs/a.md"], 1));

        let active: Vec<Dimension> = map.activated().map(|(d, _)| d).collect();
        assert_eq!(active, vec![Dimension::ErrorDetection, Dimension::TestingCoverage]);
        assert!(map.activated().all(|(_, e)| e.priority == Priority::Medium));
    }

    #[test]
    fn test_dimension_mode_activates_only_requested() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::default();
        let mapper = ContextMapper::new(&catalog, &config);
        let techs: BTreeSet<String> = ["python".to_string()].into_iter().collect();
        let map = mapper.map_for_dimension(Dimension::ErrorDetection, Scope::All, &techs);

        let active: Vec<Dimension> = map.activated().map(|(d, _)| d).collect();
        assert_eq!(active, vec![Dimension::ErrorDetection]);
        let tools = &map.get(Dimension::ErrorDetection).unwrap().tools;
        assert!(tools.contains(&"ruff".to_string()));
        assert!(!tools.contains(&"eslint".to_string()));
    }

    #[test]
    fn test_validate_mapping_reports_coverage() {
        let catalog = ToolCatalog::empty();
        let config = QaConfig::default();
        let mapper = ContextMapper::new(&catalog, &config);
        let map = mapper.map(&context(ChangeType::Unknown, Scope::Docs, &["docs/a.md"], 1));

        let validation = mapper.validate_mapping(&map);
        assert_eq!(validation.activated, 2);
        assert_eq!(validation.covered, 0);
        assert_eq!(validation.coverage, 0.0);
        assert!(!validation.is_valid());
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let catalog = ToolCatalog::builtin();
        let config = QaConfig::default();
        let mapper = ContextMapper::new(&catalog, &config);
        let ctx = context(ChangeType::Hotfix, Scope::Mixed, &["web/a.ts", "server/b.py"], 80);
        assert_eq!(mapper.map(&ctx), mapper.map(&ctx));
    }
}
