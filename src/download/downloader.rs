//! High-level single-file download facade.
//!
//! [`Downloader`] ties the prober, destination resolution and the transfer
//! engine together for one URL. Configuration problems (bad URL, missing
//! directory) are reported by [`Downloader::new`] before any network or file
//! I/O happens.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::{ClientConfig, HttpClient};
use super::engine::{TransferEngine, TransferOutcome, TransferPhase};
use super::error::DownloadError;
use super::filename::{Destination, name_and_extension_from_url};
use super::probe::{Prober, Source};
use super::progress::{ProgressSink, downloaded_size};
use super::retry::RetryPolicy;
use super::transport::Transport;

/// What to do when the probe cannot determine the remote size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownSizePolicy {
    /// Download anyway; completion is end-of-stream.
    #[default]
    Proceed,
    /// Return the probe's [`DownloadError::SizeUnavailable`].
    Fail,
}

/// Per-download settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Target directory (must exist); `None` is the working directory.
    pub directory: Option<PathBuf>,
    /// Exact file name to use. When `None`, the name comes from the URL and
    /// the detected extension is appended.
    pub filename: Option<String>,
    /// Sanitize the file name for the host filesystem.
    pub sanitize: bool,
    /// Retry budget and delay.
    pub retry: RetryPolicy,
    /// Behavior when the size is unknown.
    pub unknown_size: UnknownSizePolicy,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            directory: None,
            filename: None,
            sanitize: true,
            retry: RetryPolicy::default(),
            unknown_size: UnknownSizePolicy::default(),
        }
    }
}

/// Downloads one URL to one local file.
#[derive(Debug, Clone)]
pub struct Downloader {
    url: Url,
    destination: Destination,
    prober: Prober,
    engine: TransferEngine,
    unknown_size: UnknownSizePolicy,
}

impl Downloader {
    /// Validates the URL and destination and prepares a downloader.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] if `url` does not parse or is not HTTP(S).
    /// - [`DownloadError::MissingDirectory`] if the configured directory does not exist.
    /// - [`DownloadError::InvalidConfig`] if an explicit file name is empty.
    #[instrument(level = "debug", skip(url, transport, options), fields(url = %url))]
    pub fn new(
        url: &str,
        transport: Arc<dyn Transport>,
        options: DownloadOptions,
    ) -> Result<Self, DownloadError> {
        let url = parse_http_url(url)?;

        if let Some(dir) = options.directory.as_deref()
            && !dir.as_os_str().is_empty()
            && !dir.is_dir()
        {
            return Err(DownloadError::missing_directory(dir));
        }

        let destination = match options.filename {
            Some(name) if name.trim().is_empty() => {
                return Err(DownloadError::invalid_config("file name must not be empty"));
            }
            Some(name) => Destination {
                directory: options.directory,
                base_name: name,
                rename: false,
                sanitize: options.sanitize,
            },
            None => Destination {
                directory: options.directory,
                base_name: name_and_extension_from_url(&url).0,
                rename: true,
                sanitize: options.sanitize,
            },
        };
        debug!(?destination, "downloader configured");

        Ok(Self {
            url,
            destination,
            prober: Prober::new(Arc::clone(&transport)),
            engine: TransferEngine::new(transport, options.retry),
            unknown_size: options.unknown_size,
        })
    }

    /// Builds a downloader backed by a fresh [`HttpClient`].
    ///
    /// # Errors
    ///
    /// Everything [`HttpClient::from_config`] and [`Downloader::new`] return.
    pub fn from_config(
        url: &str,
        config: &ClientConfig,
        options: DownloadOptions,
    ) -> Result<Self, DownloadError> {
        let client = HttpClient::from_config(config)?;
        Self::new(url, Arc::new(client), options)
    }

    /// The validated source URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The configured destination.
    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Probes the remote object.
    ///
    /// With [`UnknownSizePolicy::Proceed`] a missing size yields a [`Source`]
    /// with `declared_size == None` instead of an error.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::SizeUnavailable`] under
    /// [`UnknownSizePolicy::Fail`].
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn probe(&self) -> Result<Source, DownloadError> {
        debug!(phase = %TransferPhase::Probing, "transfer phase");
        match self.prober.probe(&self.url).await {
            Ok(metadata) => Ok(Source::from_metadata(self.url.clone(), metadata)),
            Err(DownloadError::SizeUnavailable {
                reason,
                content_type,
                ..
            }) if self.unknown_size == UnknownSizePolicy::Proceed => {
                warn!(%reason, "remote size unknown, downloading until end of stream");
                Ok(Source::with_unknown_size(self.url.clone(), content_type))
            }
            Err(e) => Err(e),
        }
    }

    /// Resolves the local path for `source`.
    ///
    /// # Errors
    ///
    /// See [`Destination::resolve`].
    pub fn destination_path(&self, source: &Source) -> Result<PathBuf, DownloadError> {
        self.destination.resolve(&source.extension)
    }

    /// Current on-disk size of the destination file (`0` if absent).
    ///
    /// Safe to call from another task while [`download`](Self::download) runs.
    ///
    /// # Errors
    ///
    /// Path resolution errors, or [`DownloadError::Io`] for metadata failures.
    pub async fn downloaded_size(&self, source: &Source) -> Result<u64, DownloadError> {
        let path = self.destination_path(source)?;
        downloaded_size(&path).await
    }

    /// Probes and then transfers.
    ///
    /// # Errors
    ///
    /// Probe errors (see [`probe`](Self::probe)) and transfer errors (see
    /// [`TransferEngine::transfer`]).
    pub async fn download(
        &self,
        progress: &dyn ProgressSink,
    ) -> Result<TransferOutcome, DownloadError> {
        let source = self.probe().await?;
        self.download_source(&source, progress).await
    }

    /// Transfers an already probed source.
    ///
    /// # Errors
    ///
    /// See [`TransferEngine::transfer`].
    #[instrument(skip(self, source, progress), fields(url = %source.url))]
    pub async fn download_source(
        &self,
        source: &Source,
        progress: &dyn ProgressSink,
    ) -> Result<TransferOutcome, DownloadError> {
        let path = self.destination_path(source)?;
        info!(
            path = %path.display(),
            size = ?source.declared_size,
            "starting download"
        );
        self.engine.transfer(source, &path, progress).await
    }
}

fn parse_http_url(raw: &str) -> Result<Url, DownloadError> {
    let url = Url::parse(raw.trim()).map_err(|_| DownloadError::invalid_url(raw))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(DownloadError::invalid_url(raw)),
    }
}
