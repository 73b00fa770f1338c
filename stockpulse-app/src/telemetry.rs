//! Tracing subscriber setup.

use crate::config::LogFormat;
use crate::error::AppError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "stockpulse=info,warn";

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_tracing(format: LogFormat) -> Result<(), AppError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| AppError::Telemetry(e.to_string()))?;

    tracing::debug!(format = ?format, "Logging initialized");
    Ok(())
}
