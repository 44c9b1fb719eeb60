//! Tool References and Configuration
//!
//! `ToolRef` names a tool before configuration; `ToolConfig` is the fully
//! computed invocation policy for one tool in one run.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::Scope;
use crate::dimension::Dimension;
use crate::error::CoreError;

/// Execution profile of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Changed files only, short timeouts, fail-fast flags
    Fast,
    /// Full context detection
    Automatic,
    /// Restricted to an explicitly requested dimension
    Dimension,
    /// Restricted to an explicitly requested scope
    Scope,
    /// Definition-of-Done checklist
    Dod,
}

impl ExecutionMode {
    /// Multiplier applied to every base tool timeout.
    pub fn timeout_multiplier(&self) -> f64 {
        match self {
            ExecutionMode::Fast => 0.2,
            ExecutionMode::Automatic => 1.0,
            ExecutionMode::Dimension => 0.7,
            ExecutionMode::Scope => 0.8,
            ExecutionMode::Dod => 1.2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Fast => "fast",
            ExecutionMode::Automatic => "automatic",
            ExecutionMode::Dimension => "dimension",
            ExecutionMode::Scope => "scope",
            ExecutionMode::Dod => "dod",
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Automatic
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(ExecutionMode::Fast),
            "automatic" | "auto" => Ok(ExecutionMode::Automatic),
            "dimension" => Ok(ExecutionMode::Dimension),
            "scope" => Ok(ExecutionMode::Scope),
            "dod" => Ok(ExecutionMode::Dod),
            other => Err(CoreError::parse(format!("unknown mode '{}'", other))),
        }
    }
}

/// How a tool receives its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapperShape {
    /// Runs over the project root and finds its own files
    WholeProject,
    /// Receives an explicit file list appended to its arguments
    FileScoped,
}

/// Identity of a tool before configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRef {
    pub name: String,
    pub dimension: Dimension,
    pub scope: Scope,
}

impl ToolRef {
    pub fn new(name: impl Into<String>, dimension: Dimension, scope: Scope) -> Self {
        Self {
            name: name.into(),
            dimension,
            scope,
        }
    }
}

impl std::fmt::Display for ToolRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.dimension)
    }
}

/// Retry policy for transient failures (timeouts, spawn failures).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub count: u32,
    pub delay_seconds: u64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(count: u32, delay_seconds: u64) -> Self {
        Self {
            count,
            delay_seconds,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }
}

/// Computed invocation policy for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    /// Wall-clock budget for one attempt
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub retries: RetryPolicy,
    pub mode: ExecutionMode,
    pub shape: WrapperShape,
}

impl ToolConfig {
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_multipliers() {
        assert_eq!(ExecutionMode::Fast.timeout_multiplier(), 0.2);
        assert_eq!(ExecutionMode::Automatic.timeout_multiplier(), 1.0);
        assert_eq!(ExecutionMode::Dimension.timeout_multiplier(), 0.7);
        assert_eq!(ExecutionMode::Scope.timeout_multiplier(), 0.8);
        assert_eq!(ExecutionMode::Dod.timeout_multiplier(), 1.2);
    }

    #[test]
    fn test_tool_config_serializes_timeout_as_millis() {
        let config = ToolConfig {
            timeout: Duration::from_millis(1500),
            args: vec!["--check".into()],
            env: BTreeMap::new(),
            retries: RetryPolicy::new(1, 2),
            mode: ExecutionMode::Fast,
            shape: WrapperShape::FileScoped,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["timeout"], 1500);
        assert_eq!(json["retries"]["delaySeconds"], 2);
        assert_eq!(json["shape"], "file-scoped");

        let back: ToolConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
