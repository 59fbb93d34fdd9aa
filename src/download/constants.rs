//! Constants for the download module (timeouts, retry pacing, buffer sizes).

use std::time::Duration;

/// Default HTTP connect timeout (60 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 60;

/// Default HTTP read timeout between body reads (60 seconds).
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Fixed pause between a failed transfer attempt and the next one.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Capacity of the write buffer between the response stream and the file.
pub const TRANSFER_BUFFER_SIZE: usize = 32 * 1024;

/// Maximum length of a sanitized file name, in characters.
pub const MAX_FILENAME_LEN: usize = 80;

/// Characters reserved below [`MAX_FILENAME_LEN`] when a name is truncated.
pub const TRUNCATION_RESERVE: usize = 3;

/// Default redirect hop limit.
pub const MAX_REDIRECTS: usize = 10;
