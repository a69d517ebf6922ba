//! Core types for package installation.

use crate::error::ErrorCategory;
use std::fmt;
use std::time::Duration;

/// A version requirement attached to a package request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum VersionConstraint {
    /// Any installed version is acceptable
    #[default]
    Any,
    /// `>=`: at least this version
    AtLeast(String),
    /// `==`: exactly this version
    Exact(String),
    /// `~=`: compatible release (same prefix, at least this version)
    Compatible(String),
}

impl VersionConstraint {
    /// The comparator symbol, or `None` for [`VersionConstraint::Any`].
    pub fn operator(&self) -> Option<&'static str> {
        match self {
            Self::Any => None,
            Self::AtLeast(_) => Some(">="),
            Self::Exact(_) => Some("=="),
            Self::Compatible(_) => Some("~="),
        }
    }

    /// The version string the constraint compares against.
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Any => None,
            Self::AtLeast(v) | Self::Exact(v) | Self::Compatible(v) => Some(v),
        }
    }

    /// Whether any version is acceptable.
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Rank used when the same package is requested with several constraints.
    ///
    /// Higher wins: exact pins beat compatible releases, which beat lower
    /// bounds, which beat no constraint at all.
    pub fn specificity(&self) -> u8 {
        match self {
            Self::Any => 0,
            Self::AtLeast(_) => 1,
            Self::Compatible(_) => 2,
            Self::Exact(_) => 3,
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.operator(), self.version()) {
            (Some(op), Some(v)) => write!(f, "{op}{v}"),
            _ => Ok(()),
        }
    }
}

/// A package name plus an optional version constraint.
///
/// Identity is the name (case-sensitive). Build one with
/// [`PackageRequest::parse`] or the constructors below; it cannot be
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRequest {
    name: String,
    constraint: VersionConstraint,
}

impl PackageRequest {
    /// Create an unconstrained request.
    ///
    /// The name is not validated here; the orchestrator rejects names
    /// outside the allowed charset before doing any work.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: VersionConstraint::Any,
        }
    }

    /// Create a request with a constraint.
    pub fn with_constraint(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version constraint.
    pub fn constraint(&self) -> &VersionConstraint {
        &self.constraint
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.constraint)
    }
}

/// Terminal state of one package in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallStatus {
    /// Installed version already satisfied the constraint; nothing was run
    AlreadySatisfied,
    /// The executor installed the package
    Installed,
    /// The executor removed the package (removal batches only)
    Removed,
    /// Validation, lookup or execution failed
    Failed,
}

impl InstallStatus {
    /// Whether this status counts as success for the batch tally.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed)
    }

    /// Short label for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AlreadySatisfied => "already satisfied",
            Self::Installed => "installed",
            Self::Removed => "removed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The recorded result for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// The request this outcome belongs to
    pub package: PackageRequest,
    /// Terminal state
    pub status: InstallStatus,
    /// Human-readable detail (failure reason, installed version, ...)
    pub detail: String,
    /// Executor attempts made, at least 1
    pub attempts: u32,
    /// Failure category, set only for failed outcomes
    pub category: Option<ErrorCategory>,
}

impl InstallOutcome {
    /// Outcome for a package that needed no work.
    pub fn satisfied(package: PackageRequest, installed: &str) -> Self {
        Self {
            package,
            status: InstallStatus::AlreadySatisfied,
            detail: format!("{installed} already installed"),
            attempts: 1,
            category: None,
        }
    }

    /// Outcome for a failure.
    pub fn failed(
        package: PackageRequest,
        detail: impl Into<String>,
        attempts: u32,
        category: ErrorCategory,
    ) -> Self {
        Self {
            package,
            status: InstallStatus::Failed,
            detail: detail.into(),
            attempts: attempts.max(1),
            category: Some(category),
        }
    }

    /// Whether the package ended in a success-equivalent state.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Terminal artifact of one batch.
#[derive(Debug, Clone, Default)]
pub struct InstallBatchResult {
    /// Packages that ended installed, removed or already satisfied (unique by name)
    pub succeeded: Vec<PackageRequest>,
    /// Failed outcomes in completion order
    pub failed: Vec<InstallOutcome>,
    /// Every outcome in completion order
    pub outcomes: Vec<InstallOutcome>,
    /// Requests never dispatched because the batch was cancelled
    pub cancelled: Vec<PackageRequest>,
    /// Wall-clock duration of the batch
    pub elapsed: Duration,
}

impl InstallBatchResult {
    /// Check if every accounted package succeeded and nothing was cancelled.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }

    /// Number of packages with a recorded outcome.
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of outcomes with the given status.
    pub fn count(&self, status: InstallStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Whether the batch stopped early.
    pub fn was_cancelled(&self) -> bool {
        !self.cancelled.is_empty()
    }

    /// Find the outcome for a package name.
    pub fn outcome(&self, name: &str) -> Option<&InstallOutcome> {
        self.outcomes.iter().find(|o| o.package.name() == name)
    }
}

/// How the retry delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `base * n` after the n-th failed attempt
    Linear,
    /// `base * factor^(n-1)` after the n-th failed attempt
    Exponential {
        /// Multiplier per attempt, at least 1.0
        factor: f64,
    },
}

/// Configuration for retry logic.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Growth of the delay
    pub backoff: Backoff,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            backoff: Backoff::Linear,
            max_delay: Duration::from_secs(300), // 5 minutes max
        }
    }
}

impl RetryPolicy {
    /// Create a new linear retry policy.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// Switch to exponential growth.
    pub fn exponential(mut self, factor: f64) -> Self {
        self.backoff = Backoff::Exponential {
            factor: factor.max(1.0),
        };
        self
    }

    /// Calculate the delay after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt).min(self.max_delay),
            Backoff::Exponential { factor } => {
                let secs = self.base_delay.as_secs_f64() * factor.powi(attempt as i32 - 1);
                if secs >= self.max_delay.as_secs_f64() {
                    self.max_delay
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }

    /// Create a policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Engine configuration, passed to the orchestrator at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker pool size
    pub concurrency: usize,
    /// Attempts per package, including the first
    pub max_attempts: u32,
    /// Base retry delay
    pub base_delay: Duration,
    /// Retry delay growth
    pub backoff: Backoff,
    /// Hard ceiling for every external tool invocation
    pub per_call_timeout: Duration,
    /// Send a side-channel notification every N completions (0 disables)
    pub notify_every: usize,
    /// Dependency expansion levels (1 = direct dependencies only)
    pub expand_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            backoff: Backoff::Linear,
            per_call_timeout: Duration::from_secs(30),
            notify_every: 5,
            expand_depth: 1,
        }
    }
}

impl EngineConfig {
    /// Retry policy derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: self.base_delay,
            backoff: self.backoff,
            ..Default::default()
        }
    }
}
