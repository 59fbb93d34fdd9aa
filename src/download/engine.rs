//! Resumable transfer engine.
//!
//! The engine copies a [`Source`] into a local file, resuming from whatever
//! is already on disk. The partial file's length is the only checkpoint:
//! every decision (skip, resume, start fresh, retry from where) derives from
//! the on-disk size compared with the declared target size.
//!
//! # Phases
//!
//! ```text
//! Idle -> Probing -> Resuming | Fresh -> Streaming -> Complete
//!                                            |  ^
//!                                            v  |
//!                                          Retrying -> Failed
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use rangeload_core::download::{
//!     HttpClient, NoProgress, Prober, RetryBudget, RetryPolicy, Source, TransferEngine,
//! };
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpClient::new());
//! let url = Url::parse("https://example.com/video.mp4")?;
//! let metadata = Prober::new(client.clone()).probe(&url).await?;
//! let source = Source::from_metadata(url, metadata);
//!
//! let engine = TransferEngine::new(client, RetryPolicy::new(RetryBudget::Limited(3)));
//! let outcome = engine
//!     .transfer(&source, Path::new("video.mp4"), &NoProgress)
//!     .await?;
//! println!("{} bytes in {}", outcome.total_bytes, outcome.path.display());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::TRANSFER_BUFFER_SIZE;
use super::error::DownloadError;
use super::probe::Source;
use super::progress::{ProgressSink, downloaded_size};
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::transport::{ResponseHead, Transport};

/// Lifecycle of a single transfer, logged at every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Nothing has happened yet.
    Idle,
    /// Remote metadata is being fetched.
    Probing,
    /// A partial file exists and will be extended.
    Resuming,
    /// No usable partial file; starting from byte 0.
    Fresh,
    /// Body bytes are being copied to disk.
    Streaming,
    /// Waiting to reissue the request from the confirmed offset.
    Retrying,
    /// The file holds the complete object.
    Complete,
    /// Gave up; the partial file is left in place.
    Failed,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Resuming => "resuming",
            Self::Fresh => "fresh",
            Self::Streaming => "streaming",
            Self::Retrying => "retrying",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Mutable bookkeeping for one `transfer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    /// Bytes durably on disk; the start of the next ranged request.
    pub bytes_confirmed: u64,
    /// Expected final size, when known.
    pub bytes_target: Option<u64>,
    /// Retries consumed so far (the first attempt is not a retry).
    pub retries_used: u32,
}

impl TransferState {
    /// Returns true once the confirmed bytes reach a known target.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.bytes_target == Some(self.bytes_confirmed)
    }
}

/// Result of a successful transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    /// Where the file was written.
    pub path: PathBuf,
    /// Final file size.
    pub total_bytes: u64,
    /// Bytes written during this call.
    pub bytes_transferred: u64,
    /// Offset the first request started from (`0` for a fresh download).
    pub resumed_from: u64,
    /// Retries consumed.
    pub retries: u32,
    /// True when the file was already complete and no GET was issued.
    pub already_complete: bool,
}

enum StartPoint {
    Complete(u64),
    Resume(u64),
    Fresh,
}

/// How a response that passed the range checks is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compliance {
    /// Append the body to the file.
    Stream,
    /// The server says the object ends exactly at the requested offset.
    AlreadyComplete,
}

/// Copies a remote object to disk with resume and bounded retry.
#[derive(Clone)]
pub struct TransferEngine {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEngine")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TransferEngine {
    /// Creates an engine over `transport` governed by `policy`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Transfers `source` into `path`.
    ///
    /// An existing file whose length equals the declared size is reported as
    /// complete without any request. A shorter file is extended with a ranged
    /// GET. Retryable failures restart the GET from the new on-disk length
    /// after the policy's delay.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Integrity`] if the file on disk is larger than the
    ///   declared size, or the server reports a different total.
    /// - [`DownloadError::Io`] when the destination cannot be opened or flushed.
    /// - Otherwise the last transfer error once the retry policy gives up.
    ///   The partial file is never deleted.
    #[instrument(skip(self, source, path, progress), fields(url = %source.url, path = %path.display()))]
    pub async fn transfer(
        &self,
        source: &Source,
        path: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TransferOutcome, DownloadError> {
        log_phase(TransferPhase::Idle);
        let target = source.declared_size;
        progress.set_total(target);

        let start = match (existing_length(path).await?, target) {
            (Some(len), Some(total)) if len == total => StartPoint::Complete(len),
            (Some(len), Some(total)) if len > total => {
                warn!(len, total, "existing file is larger than the remote object");
                return Err(DownloadError::integrity(path, total, len));
            }
            (Some(len), _) if len > 0 => StartPoint::Resume(len),
            _ => StartPoint::Fresh,
        };

        let (file, offset) = match start {
            StartPoint::Complete(len) => {
                log_phase(TransferPhase::Complete);
                progress.advance(len);
                info!(bytes = len, "file already complete");
                return Ok(TransferOutcome {
                    path: path.to_path_buf(),
                    total_bytes: len,
                    bytes_transferred: 0,
                    resumed_from: len,
                    retries: 0,
                    already_complete: true,
                });
            }
            StartPoint::Resume(len) => {
                log_phase(TransferPhase::Resuming);
                progress.advance(len);
                (open_for_append(path).await?, len)
            }
            StartPoint::Fresh => {
                log_phase(TransferPhase::Fresh);
                let file = File::create(path)
                    .await
                    .map_err(|e| DownloadError::io(path, e))?;
                (file, 0)
            }
        };

        let mut writer = BufWriter::with_capacity(TRANSFER_BUFFER_SIZE, file);
        let mut state = TransferState {
            bytes_confirmed: offset,
            bytes_target: target,
            retries_used: 0,
        };
        let mut bytes_transferred = 0u64;

        loop {
            log_phase(TransferPhase::Streaming);
            let streamed = self
                .stream_once(&source.url, path, &mut writer, state.bytes_confirmed, target, progress)
                .await;

            writer
                .flush()
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            let on_disk = downloaded_size(path).await?;
            bytes_transferred += on_disk.saturating_sub(state.bytes_confirmed);
            state.bytes_confirmed = on_disk;

            let verified = streamed.and_then(|compliance| {
                verify_length(&source.url, path, &state).map(|()| compliance)
            });
            let error = match verified {
                Ok(compliance) => {
                    log_phase(TransferPhase::Complete);
                    info!(
                        bytes = on_disk,
                        resumed_from = offset,
                        retries = state.retries_used,
                        "transfer complete"
                    );
                    return Ok(TransferOutcome {
                        path: path.to_path_buf(),
                        total_bytes: on_disk,
                        bytes_transferred,
                        resumed_from: offset,
                        retries: state.retries_used,
                        already_complete: compliance == Compliance::AlreadyComplete
                            && bytes_transferred == 0,
                    });
                }
                Err(error) => error,
            };

            match self
                .policy
                .should_retry(classify_error(&error), state.retries_used)
            {
                RetryDecision::Retry { delay, retry } => {
                    log_phase(TransferPhase::Retrying);
                    info!(
                        retry,
                        budget = %self.policy.budget(),
                        resume_offset = state.bytes_confirmed,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying transfer"
                    );
                    state.retries_used = retry;
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    log_phase(TransferPhase::Failed);
                    warn!(
                        %reason,
                        bytes_on_disk = state.bytes_confirmed,
                        retries = state.retries_used,
                        error = %error,
                        "transfer failed"
                    );
                    return Err(error);
                }
            }
        }
    }

    /// Issues one GET from `offset` and copies its body into `writer`.
    async fn stream_once(
        &self,
        url: &Url,
        path: &Path,
        writer: &mut BufWriter<File>,
        offset: u64,
        target: Option<u64>,
        progress: &dyn ProgressSink,
    ) -> Result<Compliance, DownloadError> {
        let range_start = (offset > 0).then_some(offset);
        let response = self.transport.get(url, range_start).await?;
        let compliance = check_range_compliance(&response.head, url, path, offset, target)?;
        if compliance == Compliance::AlreadyComplete {
            info!(offset, "server reports the file already ends at the resume offset");
            return Ok(compliance);
        }

        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            progress.advance(chunk.len() as u64);
        }
        debug!(offset, "response body drained");
        Ok(Compliance::Stream)
    }
}

fn log_phase(phase: TransferPhase) {
    debug!(%phase, "transfer phase");
}

/// Length of the file at `path`, or `None` if it does not exist.
async fn existing_length(path: &Path) -> Result<Option<u64>, DownloadError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DownloadError::io(path, e)),
    }
}

async fn open_for_append(path: &Path) -> Result<File, DownloadError> {
    OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))
}

/// Rejects responses that would corrupt the file if their body were appended.
///
/// A 416 whose `bytes */N` total equals the offset (and the known target)
/// means the file on disk is already the whole object.
fn check_range_compliance(
    head: &ResponseHead,
    url: &Url,
    path: &Path,
    offset: u64,
    target: Option<u64>,
) -> Result<Compliance, DownloadError> {
    match head.status {
        416 => match head.unsatisfied_total {
            Some(total)
                if offset > 0 && total == offset && target.is_none_or(|t| t == total) =>
            {
                Ok(Compliance::AlreadyComplete)
            }
            _ => Err(DownloadError::range_not_satisfiable(url.as_str(), offset)),
        },
        206 => match head.content_range {
            Some(range) if range.start != offset => {
                Err(DownloadError::range_ignored(url.as_str(), offset, 206))
            }
            Some(range) => match (target, range.total) {
                (Some(expected), Some(total)) if expected != total => {
                    Err(DownloadError::integrity(path, expected, total))
                }
                _ => Ok(Compliance::Stream),
            },
            None => {
                if offset > 0 {
                    warn!(
                        offset,
                        "206 response has no Content-Range, assuming it starts at the offset"
                    );
                }
                Ok(Compliance::Stream)
            }
        },
        200 if offset > 0 => Err(DownloadError::range_ignored(url.as_str(), offset, 200)),
        status if !head.is_success() => Err(DownloadError::http_status(url.as_str(), status)),
        _ => Ok(Compliance::Stream),
    }
}

/// Checks the on-disk length after a cleanly drained body.
fn verify_length(url: &Url, path: &Path, state: &TransferState) -> Result<(), DownloadError> {
    match state.bytes_target {
        Some(expected) if state.bytes_confirmed < expected => Err(DownloadError::truncated(
            url.as_str(),
            state.bytes_confirmed,
            expected,
        )),
        Some(expected) if state.bytes_confirmed > expected => Err(DownloadError::integrity(
            path,
            expected,
            state.bytes_confirmed,
        )),
        _ => Ok(()),
    }
}
