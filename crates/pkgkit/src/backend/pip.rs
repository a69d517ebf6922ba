//! Python packages through `python3 -m pip`.

use crate::backend::runner::SystemRunner;
use crate::backend::{CommandOutput, CommandRunner, Executor, MetadataSource, VersionOracle};
use crate::error::{Error, ExecutorError, Result};
use crate::types::VersionConstraint;
use std::collections::BTreeSet;
use std::time::Duration;

/// Backend that executes `pip` through the Python interpreter.
pub struct PipBackend<R = SystemRunner> {
    runner: R,
    /// Interpreter used as `<python> -m pip`
    python: String,
    /// Hard ceiling per pip invocation, also passed as pip's socket timeout
    timeout: Duration,
    /// Install into the user site (`--user`)
    user: bool,
}

impl PipBackend {
    /// Create a pip backend using the system runner.
    pub fn new(timeout: Duration) -> Self {
        Self::with_runner(SystemRunner, timeout)
    }
}

impl<R: CommandRunner> PipBackend<R> {
    /// Create a pip backend on top of a custom runner.
    pub fn with_runner(runner: R, timeout: Duration) -> Self {
        Self {
            runner,
            python: "python3".to_string(),
            timeout,
            user: true,
        }
    }

    /// Use a different interpreter.
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    /// Install into the interpreter's site-packages instead of the user site.
    pub fn system_site(mut self) -> Self {
        self.user = false;
        self
    }

    fn pip(&self, args: &[&str]) -> std::result::Result<CommandOutput, ExecutorError> {
        let mut argv = vec![self.python.as_str(), "-m", "pip"];
        argv.extend_from_slice(args);
        self.runner.run_command(&argv, self.timeout)
    }

    /// `pip show` fields for an installed package, `None` if not installed.
    fn show(&self, name: &str) -> std::result::Result<Option<ShowInfo>, ExecutorError> {
        let output = self.pip(&["show", name])?;
        if !output.success() {
            return Ok(None);
        }
        Ok(Some(ShowInfo::parse(&output.stdout)))
    }

    /// Upgrade pip itself.
    pub fn upgrade_tool(&self) -> std::result::Result<(), ExecutorError> {
        self.pip(&["install", "--upgrade", "pip"])?.check()?;
        Ok(())
    }
}

impl<R: CommandRunner> Executor for PipBackend<R> {
    fn name(&self) -> &str {
        "pip"
    }

    fn install(
        &self,
        name: &str,
        constraint: &VersionConstraint,
    ) -> std::result::Result<(), ExecutorError> {
        let requirement = format!("{name}{constraint}");
        let timeout_secs = self.timeout.as_secs().max(1).to_string();

        let mut args = vec!["install"];
        if self.user {
            args.push("--user");
        }
        args.extend([requirement.as_str(), "--timeout", timeout_secs.as_str()]);

        self.pip(&args)?.check()?;
        Ok(())
    }

    fn uninstall(&self, name: &str) -> std::result::Result<(), ExecutorError> {
        self.pip(&["uninstall", "-y", name])?.check()?;
        Ok(())
    }
}

impl<R: CommandRunner> VersionOracle for PipBackend<R> {
    fn installed_version(&self, name: &str) -> Option<String> {
        match self.show(name) {
            Ok(info) => info.and_then(|i| i.version),
            Err(e) => {
                log::warn!("Could not query installed version of {name}: {e}");
                None
            }
        }
    }
}

impl<R: CommandRunner> MetadataSource for PipBackend<R> {
    /// Dependencies from `pip show`'s `Requires:` line.
    ///
    /// pip only reports metadata for installed distributions, so a package
    /// that is not installed yet has no known dependencies here; pip
    /// resolves those itself during install.
    fn dependencies_of(&self, name: &str) -> Result<BTreeSet<String>> {
        let info = self.show(name).map_err(|e| Error::DependencyLookup {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        Ok(info.map(|i| i.requires).unwrap_or_default())
    }
}

/// Fields of interest from `pip show` output.
#[derive(Debug, Default, PartialEq, Eq)]
struct ShowInfo {
    version: Option<String>,
    requires: BTreeSet<String>,
}

impl ShowInfo {
    fn parse(stdout: &str) -> Self {
        let mut info = ShowInfo::default();
        for line in stdout.lines() {
            if let Some(v) = line.strip_prefix("Version:") {
                let v = v.trim();
                if !v.is_empty() {
                    info.version = Some(v.to_string());
                }
            } else if let Some(reqs) = line.strip_prefix("Requires:") {
                info.requires = reqs
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeRunner;
    use crate::error::ErrorCategory;

    const SHOW_FLASK: &str = "Name: Flask\nVersion: 2.3.2\nSummary: A simple framework\nRequires: blinker, click, itsdangerous, Jinja2, Werkzeug\nRequired-by: \n";

    fn backend(runner: FakeRunner) -> PipBackend<FakeRunner> {
        PipBackend::with_runner(runner, Duration::from_secs(30))
    }

    #[test]
    fn test_parse_show_output() {
        let info = ShowInfo::parse(SHOW_FLASK);
        assert_eq!(info.version.as_deref(), Some("2.3.2"));
        assert_eq!(info.requires.len(), 5);
        assert!(info.requires.contains("Jinja2"));
    }

    #[test]
    fn test_parse_show_without_requires() {
        let info = ShowInfo::parse("Name: six\nVersion: 1.16.0\nRequires: \n");
        assert!(info.requires.is_empty());
    }

    #[test]
    fn test_installed_version() {
        let pip = backend(
            FakeRunner::default()
                .reply("python3 -m pip show flask", 0, SHOW_FLASK, "")
                .reply("python3 -m pip show nosuch", 1, "", "WARNING: Package(s) not found: nosuch"),
        );
        assert_eq!(pip.installed_version("flask").as_deref(), Some("2.3.2"));
        assert_eq!(pip.installed_version("nosuch"), None);
    }

    #[test]
    fn test_install_builds_requirement() {
        let runner = FakeRunner::default().reply(
            "python3 -m pip install --user requests>=2.28.0 --timeout 30",
            0,
            "Successfully installed requests-2.31.0",
            "",
        );
        let pip = backend(runner);
        pip.install("requests", &VersionConstraint::AtLeast("2.28.0".to_string()))
            .unwrap();
    }

    #[test]
    fn test_install_failure_is_classified() {
        let pip = backend(FakeRunner::default().reply(
            "python3 -m pip install --user nosuch --timeout 30",
            1,
            "",
            "ERROR: Could not find a version that satisfies the requirement nosuch\nERROR: No matching distribution found for nosuch\n",
        ));
        let err = pip.install("nosuch", &VersionConstraint::Any).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_dependencies_of_uninstalled_is_empty() {
        let pip = backend(FakeRunner::default());
        assert!(pip.dependencies_of("flask").unwrap().is_empty());
    }

    #[test]
    fn test_dependencies_lookup_timeout_is_error() {
        let pip = backend(FakeRunner::default().fail(
            "python3 -m pip show flask",
            ExecutorError::Timeout {
                program: "python3".to_string(),
                timeout: Duration::from_secs(30),
            },
        ));
        let err = pip.dependencies_of("flask").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::DependencyLookup);
    }

    #[test]
    fn test_system_site_and_custom_python() {
        let runner = FakeRunner::default().reply("python -m pip install six --timeout 30", 0, "", "");
        let pip = backend(runner).with_python("python").system_site();
        pip.install("six", &VersionConstraint::Any).unwrap();
    }
}
