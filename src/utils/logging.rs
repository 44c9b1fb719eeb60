//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable overriding the log filter, e.g. `QA_LOG=qa_cascade_tools=debug`.
pub const LOG_ENV: &str = "QA_LOG";

const WORKSPACE_TARGETS: [&str; 4] = [
    "qa_cascade",
    "qa_cascade_core",
    "qa_cascade_quality_gates",
    "qa_cascade_tools",
];

/// Default filter: workspace crates at `info` (or `debug`), everything else at `warn`.
pub fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    std::iter::once("warn".to_string())
        .chain(WORKSPACE_TARGETS.iter().map(|t| format!("{}={}", t, level)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize logging to stderr. Idempotent.
pub fn init_logging(verbose: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

        let result = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(verbose))
            .with(filter)
            .try_init();
        if let Err(e) = result {
            eprintln!("logging already initialized: {}", e);
        }
    });
}
