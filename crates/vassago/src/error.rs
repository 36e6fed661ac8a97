//! Error types for the load controller

use thiserror::Error;
use vassago_core::CoreError;
use vassago_governor::GovernorError;
use vassago_priority::PriorityError;
use vassago_probe::ProbeError;

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, VassagoError>;

/// Errors that can occur while building a controller
#[derive(Error, Debug)]
pub enum VassagoError {
    /// Shared configuration error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Probe setup error
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Governor setup error
    #[error("Governor error: {0}")]
    Governor(#[from] GovernorError),

    /// Scorer setup error
    #[error("Priority error: {0}")]
    Priority(#[from] PriorityError),
}
