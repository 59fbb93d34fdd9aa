//! Terminal progress bar for a single transfer.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rangeload_core::ProgressSink;

const BAR_TEMPLATE: &str =
    "[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} | {binary_bytes_per_sec} | eta {eta}";
const SPINNER_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bytes} | {binary_bytes_per_sec}";

/// [`ProgressSink`] that drives an indicatif bar (known size) or spinner (unknown size).
pub(crate) struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Creates the display; a hidden bar swallows every update.
    pub(crate) fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    /// Bytes shown so far.
    #[cfg(test)]
    pub(crate) fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Removes the bar from the terminal.
    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for IndicatifProgress {
    fn set_total(&self, total: Option<u64>) {
        match total {
            Some(total) => {
                self.bar.set_length(total);
                self.bar.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
            }
            None => {
                self.bar.set_style(
                    ProgressStyle::with_template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
        }
    }

    fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }
}
