// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Failure taxonomy for the poll-relay loop.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Upstream fetch failed. Nothing was mutated; the next cycle retries.
    #[error("content source unavailable: {0}")]
    SourceUnavailable(String),

    /// A single message could not be delivered. The watermark has already
    /// moved past the item, so the item is lost.
    #[error("relay sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Watermark or subscription persistence failed.
    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),

    /// Startup configuration is unusable.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

impl RelayError {
    /// Everything except bad configuration is survivable at the cycle boundary.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RelayError::ConfigInvalid(_))
    }

    /// Short label for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::SourceUnavailable(_) => "source_unavailable",
            RelayError::SinkUnavailable(_) => "sink_unavailable",
            RelayError::StoreUnavailable(_) => "store_unavailable",
            RelayError::ConfigInvalid(_) => "config_invalid",
        }
    }
}
