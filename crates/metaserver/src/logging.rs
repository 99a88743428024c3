//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level when set. Calling this twice
/// is harmless; the second call leaves the first subscriber in place.
pub fn init(cfg: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if cfg.json {
        builder.json().with_ansi(false).try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}
