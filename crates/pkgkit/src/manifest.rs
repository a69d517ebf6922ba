//! Persisted list of packages to install.
//!
//! The manifest is a JSON object mapping package names to constraint
//! strings; an empty string means any version:
//! ```json
//! {
//!   "flask": ">=2.2.0",
//!   "requests": ""
//! }
//! ```

use crate::error::{Error, Result};
use crate::types::{PackageRequest, VersionConstraint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Packages installed when no manifest exists yet.
const DEFAULT_PACKAGES: &[(&str, &str)] = &[
    ("requests", ">=2.28.0"),
    ("beautifulsoup4", ">=4.11.0"),
    ("scapy", ">=2.5.0"),
    ("numpy", ">=1.22.0"),
    ("pandas", ">=1.5.0"),
    ("matplotlib", ">=3.6.0"),
    ("flask", ">=2.2.0"),
    ("django", ">=4.1.0"),
    ("pycryptodome", ">=3.15.0"),
    ("paramiko", ">=3.0.0"),
    ("selenium", ">=4.7.0"),
    ("colorama", ">=0.4.0"),
    ("pillow", ">=9.3.0"),
    ("pyautogui", ">=0.9.0"),
    ("pynput", ">=1.7.0"),
    ("pyfiglet", ">=0.8.0"),
    ("termcolor", ">=2.2.0"),
    ("speedtest-cli", ">=2.1.0"),
    ("whois", ">=0.9.0"),
];

/// Ordered `{name: constraint}` map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    packages: BTreeMap<String, String>,
}

impl Manifest {
    /// The stock package set.
    pub fn defaults() -> Self {
        Self {
            packages: DEFAULT_PACKAGES
                .iter()
                .map(|(name, constraint)| ((*name).to_string(), (*constraint).to_string()))
                .collect(),
        }
    }

    /// Load a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ManifestNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&content)?;
        log::debug!("Loaded manifest from {}", path.display());
        Ok(manifest)
    }

    /// Load a manifest, falling back to [`Manifest::defaults`] when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(Error::ManifestNotFound(_)) => {
                log::debug!("No manifest at {}, using defaults", path.display());
                Ok(Self::defaults())
            }
            other => other,
        }
    }

    /// Write the manifest as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        fs::write(path, content)?;
        log::debug!("Saved manifest to {}", path.display());
        Ok(())
    }

    /// Add or replace an entry; returns true when the name was new.
    pub fn insert(&mut self, request: &PackageRequest) -> bool {
        self.packages
            .insert(request.name().to_string(), request.constraint().to_string())
            .is_none()
    }

    /// Remove an entry; returns true when it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.packages.remove(name).is_some()
    }

    /// Whether the manifest lists a package.
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Entries as `(name, constraint)` in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.packages.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    /// Parse every entry into a request, one result per entry.
    pub fn requests(&self) -> Vec<Result<PackageRequest>> {
        self.packages
            .iter()
            .map(|(name, constraint)| {
                let constraint: VersionConstraint = constraint.parse()?;
                let request = PackageRequest::parse(name)?;
                if !request.constraint().is_any() {
                    return Err(Error::invalid_spec(
                        name.as_str(),
                        "version constraint belongs in the value, not the key",
                    ));
                }
                Ok(PackageRequest::with_constraint(name.as_str(), constraint))
            })
            .collect()
    }
}
