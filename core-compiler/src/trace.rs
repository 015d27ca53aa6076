// Tracing setup (stderr only).
// SNIPPET_LOG takes an EnvFilter directive; SNIPPET_TRACE=1 forces trace level.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "SNIPPET_LOG";
pub const TRACE_ENV: &str = "SNIPPET_TRACE";

static INIT: Once = Once::new();

/// Install the global subscriber. Later calls, and calls made after a host
/// installed its own subscriber, are no-ops.
pub fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter())
            .try_init();
    });
}

fn filter() -> EnvFilter {
    if std::env::var(TRACE_ENV).is_ok_and(|v| v == "1") {
        return EnvFilter::new("trace");
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}
