//! Progress bar reporter for install and remove batches.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pkgkit::{InstallOutcome, PackageRequest, Reporter};
use std::time::Duration;

use crate::ui;

/// Create a progress bar with pockit's standard style.
pub fn bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Reports batch progress on a progress bar, one status line per package.
pub struct BarReporter {
    pb: ProgressBar,
    quiet: bool,
}

impl BarReporter {
    pub fn new(verb: &str, quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            bar(0, verb)
        };
        Self { pb, quiet }
    }

    /// Handle for clearing the bar once the batch returns.
    pub fn handle(&self) -> ProgressBar {
        self.pb.clone()
    }
}

impl Reporter for BarReporter {
    fn on_batch_start(&self, total: usize, concurrency: usize) {
        self.pb.set_length(total as u64);
        log::debug!("Batch of {total} with {concurrency} worker(s)");
    }

    fn on_retry(
        &self,
        package: &PackageRequest,
        attempt: u32,
        max_attempts: u32,
        error: &str,
        delay: Duration,
    ) {
        if self.quiet {
            return;
        }
        self.pb.println(format!(
            "{} {} attempt {attempt}/{max_attempts} failed: {} (retrying in {}s)",
            "↻".yellow(),
            package.name().bold(),
            error.dimmed(),
            delay.as_secs()
        ));
    }

    fn on_outcome(&self, outcome: &InstallOutcome, completed: usize, _total: usize) {
        if !self.quiet {
            self.pb.println(ui::outcome_line(outcome));
        }
        self.pb.set_position(completed as u64);
        self.pb.set_message(outcome.package.name().to_string());
    }
}
