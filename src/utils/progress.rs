//! Terminal progress display for downloads.
//!
//! Wraps `indicatif` with the styling used by the CLI and honours
//! `PLUGIN_UPDATER_NO_PROGRESS` so scripted runs get clean output.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn is_progress_disabled() -> bool {
    std::env::var("PLUGIN_UPDATER_NO_PROGRESS").is_ok()
}

fn percent_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸━")
}

/// A 0-100 progress bar fed from the downloader's percentage channel.
pub struct DownloadProgressBar {
    inner: IndicatifBar,
}

impl DownloadProgressBar {
    /// A bar labelled `prefix`; hidden when `enabled` is false or
    /// `PLUGIN_UPDATER_NO_PROGRESS` is set.
    pub fn new(prefix: impl Into<String>, enabled: bool) -> Self {
        let bar = if !enabled || is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new(100);
            bar.set_style(percent_style());
            bar
        };
        bar.set_prefix(prefix.into());
        Self {
            inner: bar,
        }
    }

    /// Spawn a task that moves the bar for every percentage received.
    ///
    /// The task ends when the sending side is dropped.
    pub fn track(self, mut rx: mpsc::Receiver<u8>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(percent) = rx.recv().await {
                self.inner.set_position(u64::from(percent.min(100)));
            }
            self.inner.finish_and_clear();
        })
    }
}
