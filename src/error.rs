//! Unified error handling for the cliprelay crate
//!
//! Component errors are caught at the trigger boundary (fetch cycle or
//! publish cycle), converted into [`Error`] and logged. They never escape a
//! source supervisor.
//!
//! # Architecture
//!
//! - [`RelayErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors

use thiserror::Error;

pub use crate::scheduler::error::SchedulerError;
pub use crate::utils::error::{DownloadError, FetchError, LedgerError, PublishError};

/// Common trait for all cliprelay error types
pub trait RelayErrorTrait: std::error::Error {
    /// Check if this error is recoverable (a later trigger may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Token exchange or refresh failed
    Auth,
    /// Transient transport failure or 5xx
    Network,
    /// Downloaded size did not match the reported length
    Integrity,
    /// 4xx from any API; the item is dropped
    UpstreamRejection,
    /// Ledger or media file I/O
    Storage,
    /// Scheduler and timing errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Integrity => "integrity",
            Self::UpstreamRejection => "upstream_rejection",
            Self::Storage => "storage",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }
}

impl RelayErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        // Auth failures are retried by the next fetch window, not in place
        matches!(self, Self::Auth(_) | Self::Http(_) | Self::ServerError(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(_) => ErrorCategory::Auth,
            Self::Http(_) | Self::ServerError(_) => ErrorCategory::Network,
            Self::Rejected { .. } | Self::UnknownBroadcaster(_) => {
                ErrorCategory::UpstreamRejection
            }
        }
    }
}

impl RelayErrorTrait for DownloadError {
    fn is_recoverable(&self) -> bool {
        // A short file is re-downloaded when the clip shows up again
        matches!(
            self,
            Self::Http(_) | Self::ServerError(_) | Self::SizeMismatch { .. } | Self::Io { .. }
        )
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Http(_) | Self::ServerError(_) => ErrorCategory::Network,
            Self::Rejected(_) | Self::UnresolvableMediaUrl(_) => ErrorCategory::UpstreamRejection,
            Self::SizeMismatch { .. } => ErrorCategory::Integrity,
            Self::Io { .. } => ErrorCategory::Storage,
        }
    }
}

impl RelayErrorTrait for PublishError {
    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::ServerError(_) | Self::Io { .. }
        )
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Http(_) | Self::ServerError(_) => ErrorCategory::Network,
            Self::Unauthorized(_) => ErrorCategory::Auth,
            Self::Rejected { .. } | Self::MediaProcessing(_) => ErrorCategory::UpstreamRejection,
            Self::UnexpectedResponse(_) => ErrorCategory::Other,
            Self::Io { .. } => ErrorCategory::Storage,
        }
    }
}

impl RelayErrorTrait for LedgerError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Append { .. } | Self::Lock { .. })
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

/// Unified error type for the cliprelay crate
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream clip listing or authentication errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Media download errors
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    /// Social-media publish errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Ledger persistence errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Scheduler and timing errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RelayErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Download(e) => e.is_recoverable(),
            Self::Publish(e) => e.is_recoverable(),
            Self::Ledger(e) => e.is_recoverable(),
            Self::Scheduler(e) => e.is_recoverable(),
            Self::Http(_) => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Download(e) => e.category(),
            Self::Publish(e) => e.category(),
            Self::Ledger(e) => e.category(),
            Self::Scheduler(_) => ErrorCategory::Scheduler,
            Self::Http(_) => ErrorCategory::Network,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
