//! Tracing bootstrap for binaries.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Handle to swap the active filter once configuration is known.
pub struct FilterHandle(reload::Handle<EnvFilter, tracing_subscriber::Registry>);

/// ## Summary
/// Installs the global subscriber with a reloadable filter, starting at `initial`.
/// `log` records are forwarded into `tracing` by the subscriber's log bridge.
///
/// ## Errors
/// Returns an error if a global subscriber or logger is already installed.
pub fn init_tracing(initial: &str) -> Result<FilterHandle> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new(initial));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()?;

    Ok(FilterHandle(filter_handle))
}

impl FilterHandle {
    /// ## Summary
    /// Applies the configured level; `RUST_LOG` wins when set.
    /// An invalid level is logged and the current filter is kept.
    pub fn apply(&self, logging: &LoggingConfig) {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(logging.level.as_str()));

        match filter {
            Ok(filter) => {
                if let Err(e) = self.0.modify(|current| *current = filter) {
                    tracing::warn!(error = %e, "Failed to update log filter from config");
                }
            }
            Err(e) => {
                tracing::warn!(level = %logging.level, error = %e, "Invalid log level in config, keeping current filter");
            }
        }
    }
}
