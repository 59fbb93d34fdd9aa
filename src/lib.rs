//! rangeload core library
//!
//! A resumable single-file HTTP downloader. Given a URL it learns the remote
//! size and type, then copies the bytes to local storage, riding out
//! transient network failures by resuming from the last byte on disk.
//!
//! # Architecture
//!
//! Everything lives under [`download`]:
//! - `client` - reqwest-backed [`HttpClient`] built from a [`ClientConfig`]
//! - `probe` - HEAD-based metadata [`Prober`]
//! - [`download::filename`] - destination path resolution and sanitization
//! - `engine` - the resume/retry [`TransferEngine`]
//! - `progress` - [`ProgressSink`] and on-disk size polling
//! - `downloader` - the [`Downloader`] facade wiring it all together

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub(crate) mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use download::{
    ClientConfig, DownloadError, DownloadOptions, Downloader, HttpClient, NoProgress, Prober,
    ProgressCounter, ProgressSink, RetryBudget, RetryPolicy, Source, TransferEngine,
    TransferOutcome, Transport, UnknownSizePolicy,
};
