#![allow(dead_code)]

use colored::Colorize;
use pkgkit::{InstallOutcome, InstallStatus};
use std::time::Duration;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Status symbol for an outcome
pub fn status_symbol(status: InstallStatus) -> colored::ColoredString {
    match status {
        InstallStatus::AlreadySatisfied => "○".dimmed(),
        InstallStatus::Installed | InstallStatus::Removed => "✓".green(),
        InstallStatus::Failed => "✗".red(),
    }
}

/// One line describing a package outcome
pub fn outcome_line(outcome: &InstallOutcome) -> String {
    let status = match outcome.status {
        InstallStatus::AlreadySatisfied => outcome.status.label().dimmed(),
        InstallStatus::Installed | InstallStatus::Removed => outcome.status.label().green(),
        InstallStatus::Failed => outcome.status.label().red(),
    };
    format!(
        "{} {} {} {}",
        status_symbol(outcome.status),
        outcome.package.to_string().bold(),
        status,
        outcome.detail.dimmed()
    )
}

/// Format a duration as `1m 05s` or `4.2s`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

// ============================================================================
// Tests
// ============================================================================
