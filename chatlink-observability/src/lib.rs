pub mod tracing;

pub use tracing::{init_tracing, LogFormat, TracingConfig};

/// Minimal logging setup: `RUST_LOG` filter (default `info`) and compact
/// text output on stderr. Does nothing if a subscriber is already set.
pub fn init_minimal_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
