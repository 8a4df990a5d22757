//! Structured logging initialization.
//!
//! Grounded on the teacher's `main.rs` `tracing_subscriber::fmt()` setup, extended
//! with a JSON-output toggle for production deployments via the `json` feature
//! already pulled in by `tracing-subscriber`.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber.
///
/// Respects `RUST_LOG` if set; otherwise falls back to `default_directive`
/// (typically [`crate::config::AppConfig::log_directive`]). When `json` is true,
/// emits structured JSON lines instead of the default human-readable format —
/// suited to log aggregation in production.
///
/// # Errors
///
/// Returns an error if `default_directive` fails to parse as a filter directive.
pub fn init_tracing(default_directive: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}
