//! User settings loaded from `config.toml`.
//!
//! ```toml
//! backend = "pip"
//! manifest = "~/dotfiles/pockit/packages.json"
//! notifications = true
//!
//! [engine]
//! concurrency = 3
//! max_attempts = 3
//! base_delay_secs = 5
//! timeout_secs = 30
//! notify_every = 5
//! expand_depth = 1
//! backoff = "linear"
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use pkgkit::{Backoff, EngineConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

/// Which package tool to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Python packages via `python3 -m pip`
    #[default]
    Pip,
    /// Termux system packages via `pkg`
    Pkg,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pip => f.write_str("pip"),
            Self::Pkg => f.write_str("pkg"),
        }
    }
}

/// Delay growth between retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Linear,
    Exponential,
}

/// Engine knobs as they appear in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub timeout_secs: u64,
    pub notify_every: usize,
    pub expand_depth: usize,
    pub backoff: BackoffKind,
    pub backoff_factor: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            concurrency: engine.concurrency,
            max_attempts: engine.max_attempts,
            base_delay_secs: engine.base_delay.as_secs(),
            timeout_secs: engine.per_call_timeout.as_secs(),
            notify_every: engine.notify_every,
            expand_depth: engine.expand_depth,
            backoff: BackoffKind::Linear,
            backoff_factor: 2.0,
        }
    }
}

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default backend
    pub backend: BackendKind,
    /// Manifest location, `~` and `$VARS` expanded
    pub manifest: Option<String>,
    /// Post progress to the Android notification shade
    pub notifications: bool,
    pub engine: EngineSettings,
}

impl Settings {
    /// Load settings from the config directory, or defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_file()?)
    }

    /// Load settings from a specific file, or defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Settings file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Resolve the manifest path: explicit flag, then settings, then default.
    pub fn manifest_path(&self, flag: Option<&str>) -> Result<PathBuf> {
        match flag.or(self.manifest.as_deref()) {
            Some(path) => Ok(paths::expand(path)),
            None => paths::default_manifest(),
        }
    }

    /// Engine configuration derived from these settings.
    pub fn engine_config(&self) -> EngineConfig {
        let e = &self.engine;
        EngineConfig {
            concurrency: e.concurrency.max(1),
            max_attempts: e.max_attempts.max(1),
            base_delay: Duration::from_secs(e.base_delay_secs),
            backoff: match e.backoff {
                BackoffKind::Linear => Backoff::Linear,
                BackoffKind::Exponential => Backoff::Exponential {
                    factor: e.backoff_factor.max(1.0),
                },
            },
            per_call_timeout: Duration::from_secs(e.timeout_secs.max(1)),
            notify_every: e.notify_every,
            expand_depth: e.expand_depth,
        }
    }
}
