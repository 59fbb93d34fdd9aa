//! Progress reporting for transfers.
//!
//! The engine feeds every accepted chunk length into a [`ProgressSink`].
//! [`ProgressCounter`] is the in-process sink that can be queried from
//! another task; [`downloaded_size`] is the out-of-band alternative that
//! only looks at file metadata.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::DownloadError;

/// Sentinel stored in [`ProgressCounter`] while the total is unknown.
const UNKNOWN_TOTAL: u64 = u64::MAX;

/// Consumer of byte-count increments.
pub trait ProgressSink: Send + Sync {
    /// Announces the expected total, or `None` when the size is unknown.
    fn set_total(&self, total: Option<u64>);

    /// Records `bytes` more bytes written.
    fn advance(&self, bytes: u64);
}

/// Sink that discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_total(&self, _total: Option<u64>) {}

    fn advance(&self, _bytes: u64) {}
}

/// Shared atomic progress counter.
///
/// Clones share the same counters, so one clone can be handed to the engine
/// while another is polled.
#[derive(Debug, Clone)]
pub struct ProgressCounter {
    inner: Arc<CounterInner>,
}

#[derive(Debug)]
struct CounterInner {
    bytes: AtomicU64,
    total: AtomicU64,
}

impl Default for ProgressCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCounter {
    /// Creates a counter at zero with an unknown total.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CounterInner {
                bytes: AtomicU64::new(0),
                total: AtomicU64::new(UNKNOWN_TOTAL),
            }),
        }
    }

    /// Cumulative bytes reported so far.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.inner.bytes.load(Ordering::SeqCst)
    }

    /// The announced total, if known.
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        match self.inner.total.load(Ordering::SeqCst) {
            UNKNOWN_TOTAL => None,
            total => Some(total),
        }
    }

    /// Fraction complete in `0.0..=1.0`, when the total is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total()?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.bytes() as f64 / total as f64).min(1.0))
    }
}

impl ProgressSink for ProgressCounter {
    fn set_total(&self, total: Option<u64>) {
        self.inner
            .total
            .store(total.unwrap_or(UNKNOWN_TOTAL), Ordering::SeqCst);
    }

    fn advance(&self, bytes: u64) {
        self.inner.bytes.fetch_add(bytes, Ordering::SeqCst);
    }
}

/// Reads the current on-disk size of `path` without opening it.
///
/// A missing file reports `0`.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] for metadata failures other than not-found.
pub async fn downloaded_size(path: &Path) -> Result<u64, DownloadError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(DownloadError::io(path, e)),
    }
}
