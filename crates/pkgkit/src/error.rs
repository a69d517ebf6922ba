//! Error types for package operations.
//!
//! Executor failures are categorized so the retry controller can tell a
//! flaky mirror from a package that will never install. The category also
//! drives the advice shown next to a failed package.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Categories of package errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The external tool did not finish within its time budget
    Timeout,
    /// Network-related errors (transient, retryable)
    Network,
    /// Package or version not found in any index
    NotFound,
    /// Permission denied
    Permission,
    /// Version or dependency conflict
    Conflict,
    /// Malformed package specifier
    InvalidSpec,
    /// Declared dependencies could not be queried
    DependencyLookup,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "Operation timed out",
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Package not found",
            Self::Permission => "Permission denied",
            Self::Conflict => "Package conflict",
            Self::InvalidSpec => "Invalid package name",
            Self::DependencyLookup => "Dependency lookup failed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Timeout => "Retry on a faster connection or raise the per-call timeout",
            Self::Network => "Check your internet connection or switch mirrors with termux-change-repo",
            Self::NotFound => "Verify the package name and version constraint",
            Self::Permission => "Do not run as root; check storage permissions",
            Self::Conflict => "Relax the version constraint or remove the conflicting package",
            Self::InvalidSpec => "Use letters, digits, '.', '_', '+' or '-' in package names",
            Self::DependencyLookup => "Check that the package exists in the configured repositories",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Stderr fragments that indicate a transient network or lock problem.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection aborted",
    "connection timed out",
    "read timed out",
    "network is unreachable",
    "could not resolve",
    "temporary failure in name resolution",
    "temporary failure resolving",
    "name or service not known",
    "failed to establish a new connection",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "internal server error",
    "could not get lock",
    "unable to acquire the dpkg frontend lock",
];

/// Errors produced by an executor adapter for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// The subprocess exceeded its hard timeout and was terminated
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout {
        /// Program that was running
        program: String,
        /// Ceiling that was exceeded
        timeout: Duration,
    },

    /// Nonzero exit whose stderr matched a transient signature
    #[error("transient failure: {detail}")]
    Transient {
        /// Last line of standard error
        detail: String,
    },

    /// Nonzero exit that retrying cannot fix
    #[error("{detail}")]
    Terminal {
        /// Last line of standard error
        detail: String,
        /// Finer classification for user feedback
        category: ErrorCategory,
    },

    /// The program could not be started at all
    #[error("failed to launch {program}: {message}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// OS error text
        message: String,
    },
}

impl ExecutorError {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Transient { .. } => ErrorCategory::Network,
            Self::Terminal { category, .. } => *category,
            Self::Spawn { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Build an error from a failed command's standard error.
    ///
    /// The last non-empty stderr line becomes the detail. Only stderr that
    /// matches a known transient signature (connection refused, DNS failure,
    /// HTTP 5xx, package database lock) is classified retryable.
    pub fn from_output(stderr: &str, exit_code: Option<i32>) -> Self {
        let detail = last_line(stderr)
            .map(str::to_string)
            .unwrap_or_else(|| match exit_code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            });

        let lower = stderr.to_lowercase();

        if TRANSIENT_SIGNATURES.iter().any(|sig| lower.contains(sig)) || mentions_http_5xx(&lower)
        {
            return Self::Transient { detail };
        }

        Self::Terminal {
            category: classify_terminal(&lower),
            detail,
        }
    }
}

/// Pick a category for a non-retryable failure.
fn classify_terminal(stderr_lower: &str) -> ErrorCategory {
    if stderr_lower.contains("no matching distribution")
        || stderr_lower.contains("could not find a version")
        || stderr_lower.contains("unable to locate package")
        || stderr_lower.contains("has no installation candidate")
        || stderr_lower.contains("is not installed")
    {
        return ErrorCategory::NotFound;
    }

    if stderr_lower.contains("permission denied")
        || stderr_lower.contains("operation not permitted")
        || stderr_lower.contains("are you root")
    {
        return ErrorCategory::Permission;
    }

    if stderr_lower.contains("conflict")
        || stderr_lower.contains("resolutionimpossible")
        || stderr_lower.contains("unmet dependencies")
        || stderr_lower.contains("broken packages")
    {
        return ErrorCategory::Conflict;
    }

    ErrorCategory::Other
}

/// Words that open an HTTP 5xx reason phrase (`503 Service Unavailable`).
const REASON_STARTS: &[&str] = &[
    "internal",
    "not",
    "bad",
    "service",
    "gateway",
    "http",
    "variant",
    "insufficient",
    "loop",
    "network",
];

/// Whether the text reports an HTTP status in the 500 range.
///
/// The number must stand alone and either follow `http`, `error`, `status`
/// or `code`, or be followed by a reason phrase. Digits inside file names
/// and versions never count.
fn mentions_http_5xx(stderr_lower: &str) -> bool {
    if !stderr_lower.contains("http") && !stderr_lower.contains("failed to fetch") {
        return false;
    }

    let words: Vec<&str> = stderr_lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .collect();

    words.iter().enumerate().any(|(i, word)| {
        let is_5xx = word.len() == 3 && word.starts_with('5') && word.parse::<u16>().is_ok();
        if !is_5xx {
            return false;
        }
        let after_label = i
            .checked_sub(1)
            .and_then(|p| words.get(p))
            .is_some_and(|prev| {
                prev.starts_with("http") || matches!(*prev, "error" | "status" | "code")
            });
        let before_reason = words
            .get(i + 1)
            .is_some_and(|next| REASON_STARTS.contains(next));
        after_label || before_reason
    })
}

/// Last non-empty line of a block of output.
pub(crate) fn last_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).rev().find(|l| !l.is_empty())
}

/// Errors that can occur during package operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed package specifier
    #[error("invalid package spec '{spec}': {reason}")]
    InvalidSpec {
        /// The raw token that failed to parse
        spec: String,
        /// Why it was rejected
        reason: String,
    },

    /// Executor adapter failure
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Declared dependencies of a package could not be queried
    #[error("dependency lookup failed for {name}: {message}")]
    DependencyLookup {
        /// Package whose metadata was requested
        name: String,
        /// Underlying failure
        message: String,
    },

    /// Manifest file not found at the specified path
    #[error("manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an `InvalidSpec` error.
    pub fn invalid_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidSpec { .. } => ErrorCategory::InvalidSpec,
            Error::Executor(e) => e.category(),
            Error::DependencyLookup { .. } => ErrorCategory::DependencyLookup,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for package operations.
pub type Result<T> = std::result::Result<T, Error>;
