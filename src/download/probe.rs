//! Remote metadata probing.
//!
//! A probe is a single HEAD request that learns the object's size and
//! content type. The file extension comes from the URL when it has one and
//! from the `Content-Type` subtype otherwise.

use std::sync::Arc;

use tracing::{debug, instrument, warn};
use url::Url;

use super::error::DownloadError;
use super::filename::{extension_from_content_type, name_and_extension_from_url};
use super::transport::Transport;

/// What a successful probe learned about the remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    /// Declared size in bytes.
    pub content_length: u64,
    /// Raw `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Detected extension without the dot (may be empty).
    pub extension: String,
}

/// The remote object to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Where the bytes come from.
    pub url: Url,
    /// Size reported by the probe; `None` when the server did not say.
    pub declared_size: Option<u64>,
    /// Detected extension without the dot (may be empty).
    pub extension: String,
    /// Raw `Content-Type` header, if known.
    pub content_type: Option<String>,
}

impl Source {
    /// Builds a source from a successful probe.
    #[must_use]
    pub fn from_metadata(url: Url, metadata: RemoteMetadata) -> Self {
        Self {
            url,
            declared_size: Some(metadata.content_length),
            extension: metadata.extension,
            content_type: metadata.content_type,
        }
    }

    /// Builds a source whose size is unknown, keeping whatever content type
    /// the probe did receive for extension detection.
    #[must_use]
    pub fn with_unknown_size(url: Url, content_type: Option<String>) -> Self {
        let extension = detect_extension(&url, content_type.as_deref());
        Self {
            url,
            declared_size: None,
            extension,
            content_type,
        }
    }
}

/// Determines the extension for `url`, falling back to the content type subtype.
#[must_use]
pub fn detect_extension(url: &Url, content_type: Option<&str>) -> String {
    name_and_extension_from_url(url)
        .1
        .or_else(|| content_type.and_then(extension_from_content_type))
        .unwrap_or_default()
}

/// Issues HEAD requests through a [`Transport`].
#[derive(Clone)]
pub struct Prober {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober").finish_non_exhaustive()
    }
}

impl Prober {
    /// Creates a prober over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Learns the size, content type and extension of `url`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::SizeUnavailable`] when the request fails,
    /// the status is not 2xx, or `Content-Length` is missing or unparseable.
    /// The error keeps any `Content-Type` that was received.
    #[instrument(skip(self, url), fields(url = %url))]
    pub async fn probe(&self, url: &Url) -> Result<RemoteMetadata, DownloadError> {
        let head = match self.transport.head(url).await {
            Ok(head) => head,
            Err(e) => {
                warn!(error = %e, "probe request failed");
                return Err(DownloadError::size_unavailable(
                    url.as_str(),
                    format!("HEAD request failed: {e}"),
                    None,
                ));
            }
        };

        let content_type = head.content_type.clone();
        if !head.is_success() {
            return Err(DownloadError::size_unavailable(
                url.as_str(),
                format!("HEAD returned status {}", head.status),
                content_type,
            ));
        }

        let content_length = match head.content_length.as_deref() {
            None => {
                return Err(DownloadError::size_unavailable(
                    url.as_str(),
                    "missing Content-Length header",
                    content_type,
                ));
            }
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                DownloadError::size_unavailable(
                    url.as_str(),
                    format!("unparseable Content-Length '{raw}'"),
                    content_type.clone(),
                )
            })?,
        };

        let extension = detect_extension(url, content_type.as_deref());
        debug!(content_length, %extension, "probe complete");
        Ok(RemoteMetadata {
            content_length,
            content_type,
            extension,
        })
    }
}
