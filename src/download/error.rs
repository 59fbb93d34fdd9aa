//! Error types for the download module.
//!
//! This module defines structured errors for probing, path resolution and
//! transfer, providing context-rich error messages for debugging and user
//! feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while probing, resolving or transferring a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, reset, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The configured target directory does not exist.
    #[error("target directory {path} does not exist or is not a directory")]
    MissingDirectory {
        /// The configured directory.
        path: PathBuf,
    },

    /// A client or download setting could not be applied.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What was wrong with the setting.
        reason: String,
    },

    /// The probe could not establish the remote object's size.
    #[error("size unavailable for {url}: {reason}")]
    SizeUnavailable {
        /// The probed URL.
        url: String,
        /// Why the size is unknown (missing header, parse failure, network error).
        reason: String,
        /// The `Content-Type` the probe did receive, if any.
        content_type: Option<String>,
    },

    /// The server rejected the requested range (HTTP 416).
    #[error("range starting at byte {offset} not satisfiable for {url}")]
    RangeNotSatisfiable {
        /// The URL requested.
        url: String,
        /// The requested start offset.
        offset: u64,
    },

    /// The server answered a ranged request without honoring the range.
    #[error(
        "server ignored range request for {url}: asked for bytes from {offset}, got status {status}"
    )]
    RangeIgnored {
        /// The URL requested.
        url: String,
        /// The requested start offset.
        offset: u64,
        /// The HTTP status actually returned.
        status: u16,
    },

    /// The response stream ended cleanly before the expected size was reached.
    #[error("stream for {url} ended at {received} of {expected} bytes")]
    Truncated {
        /// The URL requested.
        url: String,
        /// Bytes on disk when the stream ended.
        received: u64,
        /// Expected total size.
        expected: u64,
    },

    /// File size does not match the size declared by the server.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Download path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual (or remotely declared) size in bytes.
        actual_bytes: u64,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Maps a reqwest error to [`Timeout`](Self::Timeout) or [`Network`](Self::Network).
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a missing-directory configuration error.
    pub fn missing_directory(path: impl Into<PathBuf>) -> Self {
        Self::MissingDirectory { path: path.into() }
    }

    /// Creates an invalid-configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a size-unavailable probe error.
    pub fn size_unavailable(
        url: impl Into<String>,
        reason: impl Into<String>,
        content_type: Option<String>,
    ) -> Self {
        Self::SizeUnavailable {
            url: url.into(),
            reason: reason.into(),
            content_type,
        }
    }

    /// Creates a range-not-satisfiable error.
    pub fn range_not_satisfiable(url: impl Into<String>, offset: u64) -> Self {
        Self::RangeNotSatisfiable {
            url: url.into(),
            offset,
        }
    }

    /// Creates a range-ignored error.
    pub fn range_ignored(url: impl Into<String>, offset: u64, status: u16) -> Self {
        Self::RangeIgnored {
            url: url.into(),
            offset,
            status,
        }
    }

    /// Creates a truncated-stream error.
    pub fn truncated(url: impl Into<String>, received: u64, expected: u64) -> Self {
        Self::Truncated {
            url: url.into(),
            received,
            expected,
        }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Returns true for errors raised before any network or file I/O.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. } | Self::MissingDirectory { .. } | Self::InvalidConfig { .. }
        )
    }
}

// No `From<reqwest::Error>` or `From<std::io::Error>`: every variant needs the
// url or path the source error does not carry. Use the constructors above.
