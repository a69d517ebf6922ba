//! Centralized path resolution for pockit
//!
//! # Environment Variables
//!
//! - `POCKIT_CONFIG_DIR` - Override config directory (e.g., `~/dotfiles/pockit`)
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `POCKIT_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/pockit` (if set)
//! 3. `~/.config/pockit`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "POCKIT_CONFIG_DIR";

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "config.toml";

/// Manifest file name inside the config directory
pub const MANIFEST_FILE: &str = "packages.json";

/// Get the pockit config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("pockit");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    // Termux sets HOME to /data/data/com.termux/files/home
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("pockit");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path of the TOML settings file
pub fn settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

/// Default path of the package manifest
pub fn default_manifest() -> Result<PathBuf> {
    Ok(config_dir()?.join(MANIFEST_FILE))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as they are.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Run a closure with an env var set (or removed when `value` is None).
    pub(crate) fn with_env<F, R>(key: &str, value: Option<&str>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let original = env::var(key).ok();
        // SAFETY: env-mutating tests hold ENV_LOCK
        unsafe {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        let result = f();
        // SAFETY: env-mutating tests hold ENV_LOCK
        unsafe {
            match original {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env(ENV_CONFIG_DIR, Some("/custom/config/path"), || {
            let result = config_dir().unwrap();
            assert_eq!(result, PathBuf::from("/custom/config/path"));
            assert_eq!(
                settings_file().unwrap(),
                PathBuf::from("/custom/config/path/config.toml")
            );
            assert_eq!(
                default_manifest().unwrap(),
                PathBuf::from("/custom/config/path/packages.json")
            );
        });
    }

    #[test]
    fn test_config_dir_env_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        let expected = home.join("dotfiles").join("pockit-tilde-test");
        with_env(ENV_CONFIG_DIR, Some("~/dotfiles/pockit-tilde-test"), || {
            assert_eq!(config_dir().unwrap(), expected);
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
