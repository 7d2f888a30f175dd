//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither `RUST_LOG` nor the config file provide one.
pub const DEFAULT_FILTER: &str = "info,inflight=debug,inflight_renderer=debug,inflight_rhi=info";

/// Initialize the logging system with tracing.
///
/// `RUST_LOG` takes precedence over `default_filter`, which normally comes
/// from the `[logging]` section of the config file.
///
/// # Example
/// ```
/// inflight_core::init_logging(inflight_core::DEFAULT_FILTER);
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second call (e.g. from several tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
