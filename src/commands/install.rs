//! `pockit install`

use anyhow::{Context, Result};
use colored::Colorize;
use pkgkit::backend::pip::PipBackend;
use pkgkit::backend::pkg::PkgBackend;
use pkgkit::backend::{Executor, MetadataSource, VersionOracle};
use pkgkit::notify::{NoNotifier, Notifier, TermuxNotifier};
use pkgkit::{EngineConfig, InstallBatchResult, InstallPlan, Manifest, Orchestrator, PackageRequest};
use std::path::Path;
use std::sync::Arc;

use crate::Context as AppContext;
use crate::cli::InstallArgs;
use crate::config::{BackendKind, Settings};
use crate::progress::BarReporter;
use crate::{privilege, ui};

pub fn run(ctx: &AppContext, args: InstallArgs) -> Result<()> {
    privilege::ensure_not_root()?;

    let settings = Settings::load()?;
    let engine = engine_config(&settings, &args);
    let manifest_path = settings.manifest_path(args.manifest.as_deref())?;

    let requests = if args.specs.is_empty() {
        manifest_requests(&manifest_path)?
    } else {
        let requests = super::parse_specs(&args.specs);
        if requests.is_empty() {
            anyhow::bail!("No valid package specs given");
        }
        if args.save && !args.dry_run {
            save_to_manifest(&manifest_path, &requests)?;
        }
        requests
    };

    let notifier: Arc<dyn Notifier> = if settings.notifications && !args.no_notify && !args.dry_run
    {
        Arc::new(TermuxNotifier::new())
    } else {
        Arc::new(NoNotifier)
    };

    let backend = args.backend.unwrap_or(settings.backend);
    if !ctx.quiet {
        ui::info(&format!(
            "Installing {} package(s) with {backend} ({} parallel, {} attempts)",
            requests.len(),
            engine.concurrency,
            engine.max_attempts
        ));
    }

    let timeout = engine.per_call_timeout;
    let result = match backend {
        BackendKind::Pip => {
            let pip = PipBackend::new(timeout);
            if args.self_update && !args.dry_run {
                match pip.upgrade_tool() {
                    Ok(()) => ui::success("pip upgraded"),
                    Err(e) => ui::warn(&format!("Could not upgrade pip: {e}")),
                }
            }
            install_with(&pip, ctx, engine, requests, args.dry_run, Arc::clone(&notifier))
        }
        BackendKind::Pkg => {
            let pkg = PkgBackend::new(timeout);
            if args.update && !args.dry_run {
                match pkg.update_index() {
                    Ok(()) => ui::success("Package lists updated"),
                    Err(e) => ui::warn(&format!("Could not update package lists: {e}")),
                }
            }
            install_with(&pkg, ctx, engine, requests, args.dry_run, Arc::clone(&notifier))
        }
    };

    let Some(result) = result else {
        return Ok(());
    };

    super::print_summary(&result, "Installation Summary");
    notify_complete(notifier.as_ref(), &result);
    super::check_strict(&result, args.strict)
}

/// Settings overridden by command-line flags.
fn engine_config(settings: &Settings, args: &InstallArgs) -> EngineConfig {
    let mut engine = settings.engine_config();
    if let Some(jobs) = args.jobs {
        engine.concurrency = jobs.max(1);
    }
    if let Some(attempts) = args.attempts {
        engine.max_attempts = attempts.max(1);
    }
    if let Some(depth) = args.depth {
        engine.expand_depth = depth;
    }
    engine
}

fn manifest_requests(path: &Path) -> Result<Vec<PackageRequest>> {
    let manifest = Manifest::load_or_default(path)
        .with_context(|| format!("Failed to load manifest: {}", path.display()))?;
    if !path.exists() {
        ui::dim(&format!(
            "No manifest at {}, using the default package set",
            path.display()
        ));
    }

    let mut requests = Vec::new();
    for parsed in manifest.requests() {
        match parsed {
            Ok(request) => requests.push(request),
            Err(e) => ui::warn(&format!("Skipping manifest entry: {e}")),
        }
    }
    if requests.is_empty() {
        anyhow::bail!("Manifest {} lists no packages", path.display());
    }
    Ok(requests)
}

fn save_to_manifest(path: &Path, requests: &[PackageRequest]) -> Result<()> {
    let mut manifest = Manifest::load_or_default(path)
        .with_context(|| format!("Failed to load manifest: {}", path.display()))?;
    for request in requests {
        manifest.insert(request);
    }
    manifest
        .save(path)
        .with_context(|| format!("Failed to save manifest: {}", path.display()))?;
    log::info!("Saved {} spec(s) to {}", requests.len(), path.display());
    Ok(())
}

/// Plan or run a batch on one backend. Returns `None` for a dry run.
fn install_with<B>(
    backend: &B,
    ctx: &AppContext,
    engine: EngineConfig,
    requests: Vec<PackageRequest>,
    dry_run: bool,
    notifier: Arc<dyn Notifier>,
) -> Option<InstallBatchResult>
where
    B: Executor + VersionOracle + MetadataSource,
{
    let orchestrator = Orchestrator::new(backend, backend, backend, engine)
        .with_notifier(notifier)
        .with_cancel_token(ctx.cancel.clone());

    if dry_run {
        print_plan(&orchestrator.plan(requests));
        return None;
    }

    let reporter = BarReporter::new("Installing", ctx.quiet);
    let pb = reporter.handle();
    let orchestrator = orchestrator.with_reporter(reporter);

    let result = orchestrator.run(requests);
    pb.finish_and_clear();
    Some(result)
}

fn print_plan(plan: &InstallPlan) {
    ui::header("Install Plan");

    for outcome in &plan.satisfied {
        println!(
            "  {} {} {}",
            "○".dimmed(),
            outcome.package.name(),
            outcome.detail.dimmed()
        );
    }
    for package in &plan.pending {
        println!("  {} {}", "+".green(), package.to_string().bold());
    }
    for outcome in plan.invalid.iter().chain(&plan.lookup_failures) {
        println!(
            "  {} {} {}",
            "✗".red(),
            outcome.package.name(),
            outcome.detail.dimmed()
        );
    }

    println!();
    ui::kv("to install", &plan.pending.len().to_string());
    ui::kv("already satisfied", &plan.satisfied.len().to_string());
    let rejected = plan.invalid.len() + plan.lookup_failures.len();
    if rejected > 0 {
        ui::kv("rejected", &rejected.to_string());
    }
    println!();
    println!("  {} Dry run - no changes made", "ℹ".blue());
}

/// Final best-effort notification.
fn notify_complete(notifier: &dyn Notifier, result: &InstallBatchResult) {
    let message = if result.failed.is_empty() {
        "All packages installed successfully!".to_string()
    } else {
        format!("{} packages failed", result.failed.len())
    };
    if let Err(e) = notifier.notify("Installation Complete", &message) {
        log::warn!("Notification failed: {e}");
    }
}
