//! Observability infrastructure for silo.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors used across all silo
//! components.

use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `silo_cache=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for snapshot operations with standard fields.
///
/// # Example
///
/// ```rust
/// use silo_core::observability::snapshot_span;
///
/// let span = snapshot_span("expire", "alice@workstation:/home/alice");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn snapshot_span(operation: &str, source: &str) -> Span {
    tracing::info_span!("snapshot", op = operation, source = source)
}

/// Creates a span for cache operations.
#[must_use]
pub fn cache_span(operation: &str, cache_key: &str) -> Span {
    tracing::info_span!("cache", op = operation, cache_key = cache_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        // Uses Once internally; second call is a no-op
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty);
    }

    #[test]
    fn test_span_helpers_create_spans() {
        let span = snapshot_span("list", "u@h:/p");
        let _guard = span.enter();
        tracing::info!("test message in span");

        let span = cache_span("get", "k1");
        let _guard = span.enter();
    }
}
