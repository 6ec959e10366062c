//! Download progress display.
//!
//! Wraps `indicatif` so the downloader can report bytes transferred without
//! caring whether a terminal is attached. Set `BEDROCK_UPDATER_NO_PROGRESS`
//! to hide the bar, which unattended runs (the `run` supervisor, cron)
//! usually want.

use indicatif::{ProgressBar, ProgressStyle};

use crate::constants::NO_PROGRESS_ENV;

fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// Progress bar for a download of `total` bytes (spinner when unknown).
///
/// Returns a hidden bar when `enabled` is false or progress is disabled via
/// the environment; callers use it the same way either way.
pub fn download_bar(total: Option<u64>, enabled: bool, label: &str) -> ProgressBar {
    if !enabled || is_progress_disabled() {
        return ProgressBar::hidden();
    }

    let bar = match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                bar.set_style(style.progress_chars("━╸━"));
            }
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{prefix:.bold.cyan} {spinner:.cyan} {bytes}")
            {
                bar.set_style(style);
            }
            bar
        }
    };
    bar.set_prefix(label.to_string());
    bar
}
