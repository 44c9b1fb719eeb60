//! Definition of Done profiles
//!
//! A DoD profile is a named acceptance checklist: a fixed subset of quality
//! dimensions, each with the priority it runs at.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use qa_cascade_core::{CoreError, Dimension, Priority, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DodProfile {
    CodeReview,
    Integration,
    Performance,
    Security,
    Documentation,
}

impl DodProfile {
    pub const ALL: [DodProfile; 5] = [
        DodProfile::CodeReview,
        DodProfile::Integration,
        DodProfile::Performance,
        DodProfile::Security,
        DodProfile::Documentation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DodProfile::CodeReview => "code-review",
            DodProfile::Integration => "integration",
            DodProfile::Performance => "performance",
            DodProfile::Security => "security",
            DodProfile::Documentation => "documentation",
        }
    }

    /// Dimensions checked by this profile and their priorities.
    pub fn checklist(&self) -> &'static [(Dimension, Priority)] {
        match self {
            DodProfile::CodeReview => &[
                (Dimension::Formatting, Priority::High),
                (Dimension::ErrorDetection, Priority::High),
                (Dimension::DesignMetrics, Priority::Medium),
            ],
            DodProfile::Integration => &[
                (Dimension::TestingCoverage, Priority::Critical),
                (Dimension::BuildVerification, Priority::High),
                (Dimension::DataCompatibility, Priority::High),
            ],
            DodProfile::Performance => &[
                (Dimension::DesignMetrics, Priority::High),
                (Dimension::BuildVerification, Priority::High),
                (Dimension::TestingCoverage, Priority::Medium),
            ],
            DodProfile::Security => &[
                (Dimension::SecurityAudit, Priority::Critical),
                (Dimension::ErrorDetection, Priority::High),
            ],
            DodProfile::Documentation => &[
                (Dimension::Formatting, Priority::High),
                (Dimension::ErrorDetection, Priority::Medium),
            ],
        }
    }

    /// Scope the profile is restricted to, if any.
    pub fn scope(&self) -> Option<Scope> {
        match self {
            DodProfile::Documentation => Some(Scope::Docs),
            _ => None,
        }
    }
}

impl std::fmt::Display for DodProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DodProfile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        DodProfile::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| CoreError::parse(format!("unknown DoD profile '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profiles() {
        assert_eq!("code-review".parse::<DodProfile>().unwrap(), DodProfile::CodeReview);
        assert_eq!("Code_Review".parse::<DodProfile>().unwrap(), DodProfile::CodeReview);
        assert!("TASK-42".parse::<DodProfile>().is_err());
    }

    #[test]
    fn test_security_profile_checklist() {
        let checklist = DodProfile::Security.checklist();
        assert!(checklist.contains(&(Dimension::SecurityAudit, Priority::Critical)));
        assert_eq!(DodProfile::Documentation.scope(), Some(Scope::Docs));
    }
}
