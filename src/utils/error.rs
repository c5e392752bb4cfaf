//! Error types for the clip relay
//!
//! This module defines the per-component error types. They are folded into
//! [`crate::error::Error`] at the trigger boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the upstream clip-listing API and its token exchange
#[derive(Error, Debug)]
pub enum FetchError {
    /// Token exchange or refresh failed; the cycle is abandoned
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// HTTP request error (connect, timeout, body)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a 4xx other than the token-expiry signal
    #[error("Upstream rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Server error with status code
    #[error("Server error: {0}")]
    ServerError(u16),

    /// The configured login does not exist upstream
    #[error("Unknown broadcaster: {0}")]
    UnknownBroadcaster(String),
}

/// Errors while resolving and streaming a clip's media
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Thumbnail reference does not follow the preview naming rule
    #[error("Cannot derive media URL from thumbnail: {0}")]
    UnresolvableMediaUrl(String),

    /// HTTP request error (connect, timeout, body)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Media server returned 5xx
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Media server returned 4xx; never retried
    #[error("Media request rejected with status {0}")]
    Rejected(u16),

    /// Bytes on disk do not match the reported content length
    #[error("Size mismatch for {path}: expected {expected} bytes, wrote {actual}")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Local file I/O failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Network errors and 5xx responses are retried; everything else is final
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::ServerError(_))
    }
}

/// Errors from the social-media publish API
#[derive(Error, Debug)]
pub enum PublishError {
    /// HTTP request error (connect, timeout, body)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials refused by the publish API
    #[error("Publish API refused credentials (status {0})")]
    Unauthorized(u16),

    /// 4xx from the publish API
    #[error("Publish API rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// 5xx from the publish API
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Media processing finished in a failed state
    #[error("Media processing failed: {0}")]
    MediaProcessing(String),

    /// Response body was missing an expected field
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Reading the local media file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PublishError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the published-clip ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Reading the existing log failed at startup
    #[error("Failed to load ledger {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appending or syncing a record failed; the id is not recorded
    #[error("Failed to append to ledger {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Taking the advisory lock that guards check-and-record failed
    #[error("Failed to lock ledger {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ids are stored one per line, so they cannot contain line breaks
    #[error("Invalid clip id for ledger: {0:?}")]
    InvalidId(String),
}
