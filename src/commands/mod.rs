//! Command implementations.

pub mod install;
pub mod manifest;
pub mod remove;
pub mod status;

use colored::Colorize;
use pkgkit::{InstallBatchResult, InstallStatus, PackageRequest};

use crate::ui;

/// Parse specs from the command line, reporting and skipping bad ones.
pub(crate) fn parse_specs(specs: &[String]) -> Vec<PackageRequest> {
    specs
        .iter()
        .flat_map(|s| pkgkit::spec::parse_list(s))
        .filter_map(|parsed| match parsed {
            Ok(request) => Some(request),
            Err(e) => {
                ui::error(&e.to_string());
                None
            }
        })
        .collect()
}

/// Print the end-of-batch summary.
pub(crate) fn print_summary(result: &InstallBatchResult, title: &str) {
    ui::header(title);

    let total = result.total() + result.cancelled.len();
    let tally = format!("{}/{} succeeded", result.succeeded.len(), total);
    if result.is_success() {
        println!("  {}", tally.green().bold());
    } else {
        println!("  {}", tally.yellow().bold());
    }

    for status in [
        InstallStatus::Installed,
        InstallStatus::Removed,
        InstallStatus::AlreadySatisfied,
        InstallStatus::Failed,
    ] {
        let count = result.count(status);
        if count > 0 {
            ui::kv(status.label(), &count.to_string());
        }
    }

    if !result.failed.is_empty() {
        println!();
        for failure in &result.failed {
            println!(
                "  {} {}: {}",
                "✗".red(),
                failure.package.name().bold(),
                failure.detail
            );
            if let Some(category) = failure.category {
                ui::dim(&format!("{}. {}", category.description(), category.advice()));
            }
        }
    }

    if result.was_cancelled() {
        println!();
        ui::warn(&format!(
            "Interrupted: {} package(s) not processed",
            result.cancelled.len()
        ));
    }

    println!();
    ui::kv("elapsed", &ui::format_elapsed(result.elapsed));
}

/// Error out when `--strict` is set and the batch was not fully successful.
pub(crate) fn check_strict(result: &InstallBatchResult, strict: bool) -> anyhow::Result<()> {
    if strict && !result.is_success() {
        anyhow::bail!(
            "{} package(s) failed, {} not processed",
            result.failed.len(),
            result.cancelled.len()
        );
    }
    Ok(())
}
