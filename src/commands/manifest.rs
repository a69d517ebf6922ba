//! `pockit manifest` - view and edit the package manifest.

use anyhow::{Context, Result};
use colored::Colorize;
use pkgkit::Manifest;
use std::path::Path;

use crate::cli::ManifestCommand;
use crate::config::Settings;
use crate::ui;

pub fn run(cmd: ManifestCommand) -> Result<()> {
    let settings = Settings::load()?;
    match cmd {
        ManifestCommand::Show { manifest } => {
            show(&settings.manifest_path(manifest.as_deref())?)
        }
        ManifestCommand::Add { specs, manifest } => {
            add(&settings.manifest_path(manifest.as_deref())?, &specs)
        }
        ManifestCommand::Rm { names, manifest } => {
            rm(&settings.manifest_path(manifest.as_deref())?, &names)
        }
        ManifestCommand::Init { manifest, force } => {
            init(&settings.manifest_path(manifest.as_deref())?, force)
        }
    }
}

fn load(path: &Path) -> Result<Manifest> {
    Manifest::load_or_default(path)
        .with_context(|| format!("Failed to load manifest: {}", path.display()))
}

fn save(manifest: &Manifest, path: &Path) -> Result<()> {
    manifest
        .save(path)
        .with_context(|| format!("Failed to save manifest: {}", path.display()))
}

fn show(path: &Path) -> Result<()> {
    let manifest = load(path)?;

    ui::header("Manifest");
    if path.exists() {
        ui::dim(&path.display().to_string());
    } else {
        ui::dim(&format!("{} (not created, showing defaults)", path.display()));
    }
    println!();

    let width = manifest.entries().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, constraint) in manifest.entries() {
        if constraint.is_empty() {
            println!("  {name}");
        } else {
            println!("  {name:<width$}  {}", constraint.cyan());
        }
    }
    println!();
    ui::kv("packages", &manifest.len().to_string());
    Ok(())
}

fn add(path: &Path, specs: &[String]) -> Result<()> {
    let requests = super::parse_specs(specs);
    if requests.is_empty() {
        anyhow::bail!("No valid package specs given");
    }

    let mut manifest = load(path)?;
    for request in &requests {
        if manifest.insert(request) {
            ui::success(&format!("Added {request}"));
        } else {
            ui::info(&format!("Updated {request}"));
        }
    }
    save(&manifest, path)
}

fn rm(path: &Path, names: &[String]) -> Result<()> {
    let mut manifest = load(path)?;
    let mut changed = false;
    for name in names {
        if manifest.remove(name) {
            ui::success(&format!("Removed {name}"));
            changed = true;
        } else {
            ui::warn(&format!("{name} is not in the manifest"));
        }
    }
    if changed {
        save(&manifest, path)?;
    }
    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Manifest already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    let manifest = Manifest::defaults();
    save(&manifest, path)?;
    ui::success(&format!(
        "Wrote {} packages to {}",
        manifest.len(),
        path.display()
    ));
    Ok(())
}
