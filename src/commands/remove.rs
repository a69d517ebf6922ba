//! `pockit remove`

use anyhow::{Context, Result};
use pkgkit::backend::pip::PipBackend;
use pkgkit::backend::pkg::PkgBackend;
use pkgkit::backend::{Executor, MetadataSource, VersionOracle};
use pkgkit::{EngineConfig, InstallBatchResult, Manifest};

use crate::Context as AppContext;
use crate::cli::RemoveArgs;
use crate::config::{BackendKind, Settings};
use crate::progress::BarReporter;
use crate::{privilege, ui};

pub fn run(ctx: &AppContext, args: RemoveArgs) -> Result<()> {
    privilege::ensure_not_root()?;

    let settings = Settings::load()?;
    let engine = settings.engine_config();
    let backend = args.backend.unwrap_or(settings.backend);

    if !args.yes && !confirm_removal(&args.names, backend)? {
        ui::info("Aborted");
        return Ok(());
    }

    let timeout = engine.per_call_timeout;
    let result = match backend {
        BackendKind::Pip => remove_with(&PipBackend::new(timeout), ctx, engine, &args),
        BackendKind::Pkg => remove_with(&PkgBackend::new(timeout), ctx, engine, &args),
    };

    if args.save {
        let path = settings.manifest_path(None)?;
        drop_from_manifest(&path, &result)?;
    }

    super::print_summary(&result, "Removal Summary");
    super::check_strict(&result, args.strict)
}

fn confirm_removal(names: &[String], backend: BackendKind) -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt(format!("Remove {} with {backend}?", names.join(", ")))
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(confirmed)
}

fn remove_with<B>(backend: &B, ctx: &AppContext, engine: EngineConfig, args: &RemoveArgs) -> InstallBatchResult
where
    B: Executor + VersionOracle + MetadataSource,
{
    let reporter = BarReporter::new("Removing", ctx.quiet);
    let pb = reporter.handle();
    let orchestrator = pkgkit::Orchestrator::new(backend, backend, backend, engine)
        .with_reporter(reporter)
        .with_cancel_token(ctx.cancel.clone());

    let result = orchestrator.remove(args.names.iter().cloned());
    pb.finish_and_clear();

    if args.auto_clean {
        if orchestrator.auto_clean() {
            ui::success("Cleaned up orphaned dependencies");
        } else {
            ui::warn("Auto-clean failed; run with -v for details");
        }
    }

    result
}

/// Remove successfully uninstalled packages from the manifest.
fn drop_from_manifest(path: &std::path::Path, result: &InstallBatchResult) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let mut manifest =
        Manifest::load(path).with_context(|| format!("Failed to load manifest: {}", path.display()))?;

    let removed = result
        .succeeded
        .iter()
        .filter(|p| manifest.remove(p.name()))
        .count();
    if removed > 0 {
        manifest
            .save(path)
            .with_context(|| format!("Failed to save manifest: {}", path.display()))?;
        ui::dim(&format!("Dropped {removed} entr(ies) from {}", path.display()));
    }
    Ok(())
}
