//! The HTTP seam between the transfer engine and the network.
//!
//! The engine and prober only need two capabilities: a header-only request
//! and a (possibly ranged) streaming GET. [`Transport`] captures exactly
//! that so the production [`HttpClient`](super::HttpClient) and scripted
//! test transports are interchangeable.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use url::Url;

use super::error::DownloadError;

/// A boxed response body yielding chunks as they arrive.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>> + Send>>;

/// Parsed `Content-Range: bytes <start>-<end>/<total>` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte offset in the body.
    pub start: u64,
    /// Last byte offset in the body (inclusive).
    pub end: u64,
    /// Complete length of the resource, when the server states it.
    pub total: Option<u64>,
}

impl ContentRange {
    /// Parses a satisfied byte range. Unsatisfied ranges (`bytes */N`) and
    /// other units yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let spec = value.trim().strip_prefix("bytes")?.trim_start();
        let (range, total) = spec.split_once('/')?;
        let (start, end) = range.trim().split_once('-')?;
        let start = start.trim().parse().ok()?;
        let end = end.trim().parse().ok()?;
        if end < start {
            return None;
        }
        let total = match total.trim() {
            "*" => None,
            n => Some(n.parse().ok()?),
        };
        Some(Self { start, end, total })
    }

    /// Parses the complete length out of an unsatisfied range
    /// (`bytes */<total>`), as sent with a 416.
    #[must_use]
    pub fn parse_unsatisfied(value: &str) -> Option<u64> {
        let spec = value.trim().strip_prefix("bytes")?.trim_start();
        spec.strip_prefix("*/")?.trim().parse().ok()
    }
}

/// Status line and the headers the downloader cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Content-Length` header value.
    pub content_length: Option<String>,
    /// Raw `Content-Type` header value.
    pub content_type: Option<String>,
    /// Parsed `Content-Range` header.
    pub content_range: Option<ContentRange>,
    /// Complete length from an unsatisfied `Content-Range: bytes */N`.
    pub unsatisfied_total: Option<u64>,
}

impl ResponseHead {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Content-Length` parsed as a base-10 byte count.
    #[must_use]
    pub fn parsed_content_length(&self) -> Option<u64> {
        self.content_length.as_deref()?.trim().parse().ok()
    }
}

/// Response to a streaming GET.
pub struct RangeResponse {
    /// Status and headers.
    pub head: ResponseHead,
    /// Response body.
    pub body: BodyStream,
}

impl std::fmt::Debug for RangeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// Minimal HTTP capability used by the prober and the transfer engine.
///
/// Implementations return every HTTP status as a response; only failures to
/// obtain a response at all (DNS, connect, TLS, timeout) are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a header-only request.
    async fn head(&self, url: &Url) -> Result<ResponseHead, DownloadError>;

    /// Issues a GET, adding `Range: bytes=<start>-` when `range_start` is set.
    async fn get(&self, url: &Url, range_start: Option<u64>)
    -> Result<RangeResponse, DownloadError>;
}

/// Formats the `Range` header value for a suffix request from `offset`.
#[must_use]
pub fn range_header_value(offset: u64) -> String {
    format!("bytes={offset}-")
}
