//! Tool Configuration
//!
//! Computes the [`ToolConfig`] for each planned tool: timeout scaled by the
//! execution mode, mode-specific arguments, environment and retry policy.
//! Config-file overrides are layered on top of catalog defaults.

use std::collections::BTreeMap;
use std::time::Duration;

use qa_cascade_core::{Dimension, ExecutionMode, RetryPolicy, ToolConfig, ToolRef};

use crate::catalog::{Runtime, ToolCatalog, ToolSpec};
use crate::config::QaConfig;

/// Retry applied to test runners in full runs.
pub const TEST_RETRY: RetryPolicy = RetryPolicy {
    count: 1,
    delay_seconds: 2,
};

const COVERAGE_PLACEHOLDER: &str = "{coverage}";

pub struct ToolConfigurator<'a> {
    catalog: &'a ToolCatalog,
    config: &'a QaConfig,
}

impl<'a> ToolConfigurator<'a> {
    pub fn new(catalog: &'a ToolCatalog, config: &'a QaConfig) -> Self {
        Self { catalog, config }
    }

    /// Configure every tool known to the catalog, preserving order.
    pub fn configure_tools(&self, tools: &[ToolRef], mode: ExecutionMode) -> Vec<(ToolRef, ToolConfig)> {
        tools
            .iter()
            .filter_map(|tool| {
                let spec = self.catalog.get(&tool.name)?;
                Some((tool.clone(), self.configure(spec, mode)))
            })
            .collect()
    }

    pub fn configure(&self, spec: &ToolSpec, mode: ExecutionMode) -> ToolConfig {
        let overrides = self.config.tool(&spec.name);

        let base_timeout = overrides
            .and_then(|o| o.timeout_seconds)
            .map(Duration::from_secs)
            .unwrap_or(spec.base_timeout);
        let timeout = scale_timeout(base_timeout, mode);

        let mut args = overrides
            .and_then(|o| o.args.clone())
            .unwrap_or_else(|| spec.args.clone());
        match mode {
            ExecutionMode::Fast => args.extend(spec.fast_args.iter().cloned()),
            ExecutionMode::Dod => {
                let threshold = self.config.coverage_threshold().to_string();
                args.extend(
                    spec.dod_args
                        .iter()
                        .map(|a| a.replace(COVERAGE_PLACEHOLDER, &threshold)),
                );
            }
            _ => {}
        }
        if let Some(o) = overrides {
            args.extend(o.extra_args.iter().cloned());
        }

        let mut env = BTreeMap::from([
            ("NO_COLOR".to_string(), "1".to_string()),
            ("CI".to_string(), "1".to_string()),
            ("FORCE_COLOR".to_string(), "0".to_string()),
        ]);
        if spec.runtime == Some(Runtime::Python) {
            env.insert("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string());
        }
        if let Some(o) = overrides {
            env.extend(o.env.clone());
        }

        let retries = overrides
            .and_then(|o| o.retries)
            .unwrap_or_else(|| default_retries(spec.dimension, mode));

        ToolConfig {
            timeout,
            args,
            env,
            retries,
            mode,
            shape: spec.shape,
        }
    }
}

/// Base timeout times the mode multiplier, never below one millisecond.
pub fn scale_timeout(base: Duration, mode: ExecutionMode) -> Duration {
    let millis = (base.as_millis() as f64 * mode.timeout_multiplier()).round() as u64;
    Duration::from_millis(millis.max(1))
}

fn default_retries(dimension: Dimension, mode: ExecutionMode) -> RetryPolicy {
    match (dimension, mode) {
        (Dimension::TestingCoverage, ExecutionMode::Automatic | ExecutionMode::Dod) => TEST_RETRY,
        _ => RetryPolicy::none(),
    }
}
