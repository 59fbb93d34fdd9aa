//! Retry budget and failure classification for interrupted transfers.
//!
//! When a transfer attempt fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - anything that went wrong while fetching or
//!   copying the body: network errors, timeouts, truncated streams, unexpected
//!   statuses, local write failures
//! - [`FailureType::Permanent`] - range and integrity violations, where
//!   reissuing the same request cannot produce a correct file, and
//!   configuration errors
//!
//! The [`RetryPolicy`] then decides whether another attempt is allowed under
//! its [`RetryBudget`]. Delays are fixed: the engine is meant to ride out short
//! connectivity blips, not long outages.
//!
//! # Example
//!
//! ```
//! use rangeload_core::download::{
//!     DownloadError, RetryBudget, RetryDecision, RetryPolicy, classify_error,
//! };
//!
//! let policy = RetryPolicy::new(RetryBudget::Limited(2));
//! let error = DownloadError::http_status("https://example.com/file.mp4", 503);
//!
//! match policy.should_retry(classify_error(&error), 0) {
//!     RetryDecision::Retry { delay, retry } => println!("retry #{retry} in {delay:?}"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;
use super::constants::RETRY_DELAY;

/// Number of extra attempts allowed after the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// Keep retrying until the transfer succeeds or fails permanently.
    Unlimited,
    /// At most this many retries after the initial attempt (`0` = single attempt).
    Limited(u32),
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::Limited(0)
    }
}

impl RetryBudget {
    /// Returns true if `retries_used` retries leave room for one more.
    #[must_use]
    pub fn allows(self, retries_used: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(max) => retries_used < max,
        }
    }
}

impl TryFrom<i64> for RetryBudget {
    type Error = DownloadError;

    /// Maps the command-line convention: `-1` is unlimited, `n >= 0` is `n` retries.
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Unlimited),
            n if n >= 0 => u32::try_from(n)
                .map(Self::Limited)
                .map_err(|_| DownloadError::invalid_config(format!("retry budget {n} too large"))),
            n => Err(DownloadError::invalid_config(format!(
                "retry budget {n} must be -1 (unlimited) or non-negative"
            ))),
        }
    }
}

impl FromStr for RetryBudget {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::Unlimited);
        }
        let value: i64 = trimmed.parse().map_err(|_| {
            DownloadError::invalid_config(format!("retry budget '{trimmed}' is not an integer"))
        })?;
        Self::try_from(value)
    }
}

impl fmt::Display for RetryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Limited(n) => write!(f, "{n}"),
        }
    }
}

/// Classification of transfer failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Permanent failure that won't succeed regardless of retries.
    Permanent,
}

/// Decision on whether to retry a failed transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which retry this will be (1-indexed).
        retry: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry budget plus the fixed pause between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    budget: RetryBudget,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryBudget::default())
    }
}

impl RetryPolicy {
    /// Creates a policy with the default one-second delay.
    #[must_use]
    pub fn new(budget: RetryBudget) -> Self {
        Self {
            budget,
            delay: RETRY_DELAY,
        }
    }

    /// Replaces the pause between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the configured budget.
    #[must_use]
    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    /// Returns the pause between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry after a failed attempt.
    ///
    /// `retries_used` counts retries already consumed, not including the
    /// initial attempt.
    #[instrument(skip(self), fields(budget = %self.budget))]
    pub fn should_retry(&self, failure_type: FailureType, retries_used: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if !self.budget.allows(retries_used) {
            debug!(retries_used, "retry budget exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retry budget ({}) exhausted", self.budget),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            retry: retries_used.saturating_add(1),
        }
    }
}

/// Classifies a download error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Network, Timeout, Truncated | Transient |
/// | any HTTP status | Transient |
/// | Io (writing the destination) | Transient |
/// | RangeNotSatisfiable, RangeIgnored, Integrity | Permanent |
/// | configuration and probe errors | Permanent |
#[instrument]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::Network { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::Truncated { .. }
        | DownloadError::HttpStatus { .. }
        | DownloadError::Io { .. } => FailureType::Transient,

        DownloadError::RangeNotSatisfiable { .. }
        | DownloadError::RangeIgnored { .. }
        | DownloadError::Integrity { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::MissingDirectory { .. }
        | DownloadError::InvalidConfig { .. }
        | DownloadError::SizeUnavailable { .. } => FailureType::Permanent,
    }
}
