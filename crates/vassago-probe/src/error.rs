//! Error types for probe operations

use thiserror::Error;

/// Result type for probe operations
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors that can occur while probing
///
/// None of these escape a probe's public recomputation paths; they are
/// logged and the affected reading falls back to its default.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Microbenchmark did not produce a usable timing
    #[error("Benchmark failed: {0}")]
    Benchmark(String),

    /// Probe request timed out
    #[error("Probe timeout after {0}ms")]
    Timeout(u64),

    /// Probe endpoint answered with an error status
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Connection to the probe endpoint failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Probe URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Probe configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProbeError {
    /// Whether the failure concerns a single probe rather than the setup
    pub fn is_transient(&self) -> bool {
        match self {
            ProbeError::Timeout(_) | ProbeError::Connection(_) => true,
            ProbeError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProbeError::Timeout(0)
        } else if let Some(status) = e.status() {
            ProbeError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            ProbeError::Connection(e.to_string())
        }
    }
}

impl From<url::ParseError> for ProbeError {
    fn from(e: url::ParseError) -> Self {
        ProbeError::InvalidUrl(e.to_string())
    }
}
