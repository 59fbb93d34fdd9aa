//! Resumable HTTP download of a single file.
//!
//! This module probes a remote object, resolves where it goes on disk, and
//! streams it there, resuming from the existing partial file after
//! interruptions instead of starting over.
//!
//! # Features
//!
//! - HEAD probe for size, content type and extension
//! - Range-request resume keyed on the partial file's length
//! - Bounded (or unlimited) retry with a fixed pause
//! - Filename sanitization with a length cap
//! - Progress reporting through a [`ProgressSink`]
//!
//! # Example
//!
//! ```no_run
//! use rangeload_core::download::{
//!     ClientConfig, DownloadOptions, Downloader, ProgressCounter, RetryBudget, RetryPolicy,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = DownloadOptions {
//!     retry: RetryPolicy::new(RetryBudget::Limited(3)),
//!     ..DownloadOptions::default()
//! };
//! let downloader = Downloader::from_config(
//!     "https://example.com/video.mp4",
//!     &ClientConfig::default(),
//!     options,
//! )?;
//! let progress = ProgressCounter::new();
//! let outcome = downloader.download(&progress).await?;
//! println!("Downloaded: {}", outcome.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod downloader;
mod engine;
mod error;
pub mod filename;
mod probe;
mod progress;
mod retry;
mod transport;

pub use client::{BasicAuth, ClientConfig, HttpClient, ProxyFn, ProxySetting, TlsOptions};
pub use downloader::{DownloadOptions, Downloader, UnknownSizePolicy};
pub use engine::{TransferEngine, TransferOutcome, TransferPhase, TransferState};
pub use error::DownloadError;
pub use filename::{Destination, SanitizeStyle, resolve_path, sanitize_filename};
pub use probe::{Prober, RemoteMetadata, Source, detect_extension};
pub use progress::{NoProgress, ProgressCounter, ProgressSink, downloaded_size};
pub use retry::{FailureType, RetryBudget, RetryDecision, RetryPolicy, classify_error};
pub use transport::{
    BodyStream, ContentRange, RangeResponse, ResponseHead, Transport, range_header_value,
};

// Note: no module-local Result alias; spell out `Result<T, DownloadError>`.
