//! Error types for the StockPulse client.

use crate::config::ConfigError;
use stockpulse_core::{BackendError, PulseError, StoreError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pulse(#[from] PulseError),
    #[error("Failed to initialize logging: {0}")]
    Telemetry(String),
    #[error("{0}")]
    Usage(String),
    /// An operation finished but reported a user-visible failure.
    #[error("{0}")]
    Failed(String),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        Self::Pulse(err.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Pulse(err.into())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Pulse(err.into())
    }
}
