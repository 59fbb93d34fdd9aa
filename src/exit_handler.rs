//! Exit code logic for the rangeload process.
//!
//! Single responsibility: map the download result to the process exit outcome.

use rangeload_core::DownloadError;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// The file is complete on disk.
    Success,
    /// The transfer failed; any partial file is kept for a later resume.
    Failure,
    /// The request could not be set up (bad URL, missing directory, bad option).
    Configuration,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Configuration => 2,
        }
    }
}

/// Determines the exit outcome from the top-level result.
pub(crate) fn determine_exit_outcome<T>(result: &anyhow::Result<T>) -> ProcessExit {
    match result {
        Ok(_) => ProcessExit::Success,
        Err(error) => match error.downcast_ref::<DownloadError>() {
            Some(download_error) if download_error.is_configuration() => {
                ProcessExit::Configuration
            }
            _ => ProcessExit::Failure,
        },
    }
}
