//! Logging setup
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the
//! `--log-level` flag. `--json-logs` switches the human format for
//! line-delimited JSON.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber once, at startup
pub fn init(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).compact())
            .try_init()
    };
    result.map_err(|e| anyhow::anyhow!("logging init failed: {e}"))
}
