//! Termux system packages through `pkg`, `dpkg-query` and `apt-cache`.

use crate::backend::runner::SystemRunner;
use crate::backend::{
    Capabilities, CommandOutput, CommandRunner, Executor, MetadataSource, VersionOracle,
};
use crate::error::{Error, ExecutorError, Result};
use crate::types::VersionConstraint;
use std::collections::BTreeSet;
use std::time::Duration;

/// Backend for the Termux `pkg` wrapper around apt.
///
/// dpkg holds a global lock, so this backend reports itself as not safe to
/// run concurrently.
pub struct PkgBackend<R = SystemRunner> {
    runner: R,
    timeout: Duration,
}

impl PkgBackend {
    /// Create a pkg backend using the system runner.
    pub fn new(timeout: Duration) -> Self {
        Self::with_runner(SystemRunner, timeout)
    }
}

impl<R: CommandRunner> PkgBackend<R> {
    /// Create a pkg backend on top of a custom runner.
    pub fn with_runner(runner: R, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    fn run(&self, argv: &[&str]) -> std::result::Result<CommandOutput, ExecutorError> {
        self.runner.run_command(argv, self.timeout)
    }

    /// Refresh the package lists.
    pub fn update_index(&self) -> std::result::Result<(), ExecutorError> {
        self.run(&["pkg", "update", "-y"])?.check()?;
        Ok(())
    }
}

impl<R: CommandRunner> Executor for PkgBackend<R> {
    fn name(&self) -> &str {
        "pkg"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            concurrent_safe: false,
        }
    }

    /// apt can only pin an exact version; other constraints install the
    /// candidate and leave the check to the next oracle pass.
    fn install(
        &self,
        name: &str,
        constraint: &VersionConstraint,
    ) -> std::result::Result<(), ExecutorError> {
        let target = match constraint {
            VersionConstraint::Exact(v) => format!("{name}={v}"),
            _ => name.to_string(),
        };
        self.run(&["pkg", "install", "-y", &target])?.check()?;
        Ok(())
    }

    fn uninstall(&self, name: &str) -> std::result::Result<(), ExecutorError> {
        self.run(&["pkg", "uninstall", "-y", name])?.check()?;
        Ok(())
    }

    fn auto_clean(&self) -> std::result::Result<(), ExecutorError> {
        self.run(&["apt-get", "autoremove", "-y"])?.check()?;
        self.run(&["pkg", "clean"])?.check()?;
        Ok(())
    }
}

impl<R: CommandRunner> VersionOracle for PkgBackend<R> {
    fn installed_version(&self, name: &str) -> Option<String> {
        let output = match self.run(&["dpkg-query", "-W", "-f=${db:Status-Status}|${Version}", name]) {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Could not query installed version of {name}: {e}");
                return None;
            }
        };
        if !output.success() {
            return None;
        }
        parse_dpkg_status(&output.stdout)
    }
}

impl<R: CommandRunner> MetadataSource for PkgBackend<R> {
    fn dependencies_of(&self, name: &str) -> Result<BTreeSet<String>> {
        let lookup_error = |message: String| Error::DependencyLookup {
            name: name.to_string(),
            message,
        };

        let output = self
            .run(&["apt-cache", "depends", name])
            .map_err(|e| lookup_error(e.to_string()))?;
        if !output.success() {
            let err = ExecutorError::from_output(&output.stderr, output.exit_code);
            return Err(lookup_error(err.to_string()));
        }
        Ok(parse_depends(&output.stdout))
    }
}

/// Version from `status|version`, only for fully installed packages.
fn parse_dpkg_status(stdout: &str) -> Option<String> {
    let line = stdout.lines().next()?.trim();
    let (status, version) = line.split_once('|')?;
    if status != "installed" || version.is_empty() {
        return None;
    }
    Some(version.to_string())
}

/// Names from `Depends:` lines of `apt-cache depends`.
///
/// Alternatives (`|Depends:`) are kept; virtual packages lose their angle
/// brackets and multiarch qualifiers are stripped.
fn parse_depends(stdout: &str) -> BTreeSet<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches('|');
            line.strip_prefix("Depends:")
        })
        .map(|dep| {
            let dep = dep.trim().trim_start_matches('<').trim_end_matches('>');
            dep.split(':').next().unwrap_or(dep).to_string()
        })
        .filter(|dep| !dep.is_empty())
        .collect()
}
