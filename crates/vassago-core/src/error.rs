//! Error types for configuration and shared model validation

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while validating caller-supplied configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A `[min, max]` bound pair is out of order or empty
    #[error("Invalid range for {name}: min {min} > max {max}")]
    InvalidRange { name: String, min: f64, max: f64 },

    /// A weight is negative or not finite
    #[error("Invalid weight {name}: {value}")]
    InvalidWeight { name: String, value: f64 },

    /// A buffer capacity or minimum is zero
    #[error("Invalid capacity for {0}: must be at least 1")]
    InvalidCapacity(String),

    /// A repeating interval is zero
    #[error("Invalid update interval: {0}ms")]
    InvalidInterval(u64),

    /// Configuration could not be parsed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Check a `[min, max]` pair, rejecting out-of-order bounds
    pub fn check_range(name: &str, min: f64, max: f64) -> Result<()> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(CoreError::InvalidRange {
                name: name.to_string(),
                min,
                max,
            });
        }
        Ok(())
    }

    /// Check that a weight is finite and non-negative
    pub fn check_weight(name: &str, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::InvalidWeight {
                name: name.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// Check that a capacity is non-zero
    pub fn check_capacity(name: &str, value: usize) -> Result<()> {
        if value == 0 {
            return Err(CoreError::InvalidCapacity(name.to_string()));
        }
        Ok(())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
