//! `pockit status`

use anyhow::{Context, Result};
use colored::Colorize;
use pkgkit::backend::VersionOracle;
use pkgkit::backend::pip::PipBackend;
use pkgkit::backend::pkg::PkgBackend;
use pkgkit::{Manifest, PackageRequest};
use serde::Serialize;

use crate::Context as AppContext;
use crate::cli::StatusArgs;
use crate::config::{BackendKind, Settings};
use crate::ui;

/// One manifest entry checked against the system.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct StatusRow {
    name: String,
    constraint: String,
    installed: Option<String>,
    satisfied: bool,
}

impl StatusRow {
    fn check(request: &PackageRequest, oracle: &dyn VersionOracle) -> Self {
        let installed = oracle.installed_version(request.name());
        let satisfied = pkgkit::satisfies(installed.as_deref(), request.constraint());
        Self {
            name: request.name().to_string(),
            constraint: request.constraint().to_string(),
            installed,
            satisfied,
        }
    }
}

pub fn run(ctx: &AppContext, args: StatusArgs) -> Result<()> {
    let settings = Settings::load()?;
    let path = settings.manifest_path(args.manifest.as_deref())?;
    let manifest = Manifest::load_or_default(&path)
        .with_context(|| format!("Failed to load manifest: {}", path.display()))?;

    let requests: Vec<PackageRequest> = manifest
        .requests()
        .into_iter()
        .filter_map(|parsed| match parsed {
            Ok(request) => Some(request),
            Err(e) => {
                log::warn!("Skipping manifest entry: {e}");
                None
            }
        })
        .collect();

    let timeout = settings.engine_config().per_call_timeout;
    let backend = args.backend.unwrap_or(settings.backend);
    let rows = match backend {
        BackendKind::Pip => check_all(&requests, &PipBackend::new(timeout)),
        BackendKind::Pkg => check_all(&requests, &PkgBackend::new(timeout)),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    ui::header(&format!("Package Status ({backend})"));
    if !ctx.quiet {
        ui::dim(&path.display().to_string());
        println!();
    }
    for row in &rows {
        print_row(row);
    }

    let satisfied = rows.iter().filter(|r| r.satisfied).count();
    let missing = rows.iter().filter(|r| r.installed.is_none()).count();
    println!();
    ui::kv("satisfied", &format!("{satisfied}/{}", rows.len()));
    if missing > 0 {
        ui::kv("missing", &missing.to_string());
    }
    let outdated = rows.len() - satisfied - missing;
    if outdated > 0 {
        ui::kv("outdated", &outdated.to_string());
    }

    Ok(())
}

fn check_all(requests: &[PackageRequest], oracle: &dyn VersionOracle) -> Vec<StatusRow> {
    requests
        .iter()
        .map(|request| StatusRow::check(request, oracle))
        .collect()
}

fn print_row(row: &StatusRow) {
    let wanted = if row.constraint.is_empty() {
        String::new()
    } else {
        format!(" ({})", row.constraint)
    };
    match (&row.installed, row.satisfied) {
        (Some(version), true) => println!(
            "  {} {} {}",
            "✓".green(),
            row.name,
            version.dimmed()
        ),
        (Some(version), false) => println!(
            "  {} {} {}{}",
            "⚠".yellow(),
            row.name,
            version.yellow(),
            wanted.dimmed()
        ),
        (None, _) => println!(
            "  {} {} {}{}",
            "✗".red(),
            row.name,
            "not installed".red(),
            wanted.dimmed()
        ),
    }
}
