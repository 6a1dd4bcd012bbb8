//! Structured logging configuration.
//!
//! The engine logs through the `log` facade; those records are forwarded into
//! the tracing subscriber installed here.

use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Operations slower than this are reported at warn level
const SLOW_OPERATION: Duration = Duration::from_secs(1);

/// Initialize structured logging
///
/// Levels are configurable via the `RUST_LOG` env var and default to
/// `info,sqlx=warn`. Output goes to stderr so command results on stdout stay
/// machine readable.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!("Structured logging initialized");
}

/// Log how long an admin operation took
///
/// # Example
///
/// ```ignore
/// use std::time::Instant;
///
/// let start = Instant::now();
/// // ... run the command ...
/// log_performance("recompute-discipline", start.elapsed(), Some("tournament 7"));
/// ```
pub fn log_performance(operation: &str, elapsed: Duration, metadata: Option<&str>) {
    let duration_ms = elapsed.as_millis() as u64;
    if elapsed > SLOW_OPERATION {
        tracing::warn!(
            operation = operation,
            duration_ms = duration_ms,
            metadata = metadata,
            "PERFORMANCE: Slow operation"
        );
    } else {
        tracing::debug!(
            operation = operation,
            duration_ms = duration_ms,
            metadata = metadata,
            "Performance metric"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_performance() {
        log_performance("bracket", Duration::from_millis(40), Some("tournament 1"));
        log_performance("recompute-discipline", Duration::from_secs(3), None);
    }
}
