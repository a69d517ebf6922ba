//! Backend abstraction for package tools.
//!
//! The engine talks to the outside world through four small capabilities:
//! - [`CommandRunner`] runs a program with a hard timeout
//! - [`Executor`] installs and removes packages
//! - [`VersionOracle`] reports installed versions
//! - [`MetadataSource`] lists declared dependencies
//!
//! [`pip::PipBackend`] and [`pkg::PkgBackend`] implement the last three on
//! top of a [`CommandRunner`]; tests substitute in-memory doubles.

pub mod pip;
pub mod pkg;
pub mod runner;

use crate::error::{ExecutorError, Result};
use crate::types::VersionConstraint;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub exit_code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a nonzero exit into a classified executor error.
    pub fn check(self) -> std::result::Result<Self, ExecutorError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExecutorError::from_output(&self.stderr, self.exit_code))
        }
    }
}

/// Runs external programs with a hard timeout.
pub trait CommandRunner: Send + Sync {
    /// Run `argv[0]` with the remaining arguments.
    ///
    /// A nonzero exit is not an error here; callers classify it. Exceeding
    /// `timeout` yields [`ExecutorError::Timeout`], failing to start yields
    /// [`ExecutorError::Spawn`].
    fn run_command(
        &self,
        argv: &[&str],
        timeout: Duration,
    ) -> std::result::Result<CommandOutput, ExecutorError>;
}

/// What a backend can safely do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Simultaneous invocations of the tool are safe.
    ///
    /// When false the orchestrator clamps its worker pool to one.
    pub concurrent_safe: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            concurrent_safe: true,
        }
    }
}

/// Installs and removes packages through an external tool.
pub trait Executor: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Backend capability flags.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Install a package, honoring the constraint where the tool can.
    fn install(
        &self,
        name: &str,
        constraint: &VersionConstraint,
    ) -> std::result::Result<(), ExecutorError>;

    /// Uninstall a package.
    fn uninstall(&self, name: &str) -> std::result::Result<(), ExecutorError>;

    /// Remove orphaned dependencies and caches after a removal.
    fn auto_clean(&self) -> std::result::Result<(), ExecutorError> {
        Ok(())
    }
}

/// Reports installed versions.
pub trait VersionOracle: Send + Sync {
    /// Installed version of a package, `None` when not installed.
    ///
    /// Absence is a normal answer, never an error.
    fn installed_version(&self, name: &str) -> Option<String>;
}

/// Lists the declared dependencies of a package.
pub trait MetadataSource: Send + Sync {
    /// Direct dependencies by name.
    fn dependencies_of(&self, name: &str) -> Result<BTreeSet<String>>;
}

impl<T: Executor + ?Sized> Executor for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn install(
        &self,
        name: &str,
        constraint: &VersionConstraint,
    ) -> std::result::Result<(), ExecutorError> {
        (**self).install(name, constraint)
    }

    fn uninstall(&self, name: &str) -> std::result::Result<(), ExecutorError> {
        (**self).uninstall(name)
    }

    fn auto_clean(&self) -> std::result::Result<(), ExecutorError> {
        (**self).auto_clean()
    }
}

impl<T: Executor + ?Sized> Executor for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn install(
        &self,
        name: &str,
        constraint: &VersionConstraint,
    ) -> std::result::Result<(), ExecutorError> {
        (**self).install(name, constraint)
    }

    fn uninstall(&self, name: &str) -> std::result::Result<(), ExecutorError> {
        (**self).uninstall(name)
    }

    fn auto_clean(&self) -> std::result::Result<(), ExecutorError> {
        (**self).auto_clean()
    }
}

impl<T: VersionOracle + ?Sized> VersionOracle for &T {
    fn installed_version(&self, name: &str) -> Option<String> {
        (**self).installed_version(name)
    }
}

impl<T: VersionOracle + ?Sized> VersionOracle for Arc<T> {
    fn installed_version(&self, name: &str) -> Option<String> {
        (**self).installed_version(name)
    }
}

impl<T: MetadataSource + ?Sized> MetadataSource for &T {
    fn dependencies_of(&self, name: &str) -> Result<BTreeSet<String>> {
        (**self).dependencies_of(name)
    }
}

impl<T: MetadataSource + ?Sized> MetadataSource for Arc<T> {
    fn dependencies_of(&self, name: &str) -> Result<BTreeSet<String>> {
        (**self).dependencies_of(name)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run_command(
        &self,
        argv: &[&str],
        timeout: Duration,
    ) -> std::result::Result<CommandOutput, ExecutorError> {
        (**self).run_command(argv, timeout)
    }
}

impl<T: CommandRunner + ?Sized> CommandRunner for Arc<T> {
    fn run_command(
        &self,
        argv: &[&str],
        timeout: Duration,
    ) -> std::result::Result<CommandOutput, ExecutorError> {
        (**self).run_command(argv, timeout)
    }
}
