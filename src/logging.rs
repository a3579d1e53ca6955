//! Logging utilities for icemap.
//!
//! Structured logging helpers shared by the session loop and the render
//! pipeline, so render cycles can be traced and correlated.

use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Initialize the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(val) => val,
        Err(_) => log_level.to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Generate a unique render-cycle ID
pub fn generate_render_id() -> String {
    Uuid::new_v4().to_string()
}

/// Log summary statistics for a completed render
pub fn log_render_stats(
    variable: &str,
    shape: (usize, usize),
    extent: [f64; 4],
    url_len: usize,
    start_time: Instant,
) {
    info!(
        operation = "render",
        variable = variable,
        rows = shape.0,
        cols = shape.1,
        extent = ?extent,
        url_bytes = url_len,
        duration_ms = start_time.elapsed().as_secs_f64() * 1000.0,
        "Overlay rendered"
    );
}

/// Log an error with context
pub fn log_error(error: &crate::error::IcemapError, context: &str) {
    error!(
        error = %error,
        context = context,
        "Error occurred"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_render_id() {
        let id1 = generate_render_id();
        let id2 = generate_render_id();

        assert!(!id1.is_empty());
        assert_ne!(id1, id2);
    }
}
