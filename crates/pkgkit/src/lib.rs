//! # pkgkit
//!
//! Concurrent package installation engine for Termux and pip.
//!
//! This crate provides functionality for:
//! - Parsing package specifiers (`requests>=2.28.0`, `numpy==1.26.4`)
//! - Comparing installed versions against constraints
//! - Expanding requests with their declared dependencies
//! - Installing through a bounded worker pool with retry on transient errors
//! - Persisting the list of wanted packages as a JSON manifest
//!
//! ## Example
//!
//! ```no_run
//! use pkgkit::backend::pip::PipBackend;
//! use pkgkit::{EngineConfig, Orchestrator, PackageRequest};
//!
//! let config = EngineConfig::default();
//! let pip = PipBackend::new(config.per_call_timeout);
//! let orchestrator = Orchestrator::new(&pip, &pip, &pip, config);
//!
//! let requests = vec![
//!     PackageRequest::parse("requests>=2.28.0").unwrap(),
//!     PackageRequest::parse("flask").unwrap(),
//! ];
//! let result = orchestrator.run(requests);
//! println!("{}/{} succeeded", result.succeeded.len(), result.total());
//! ```
//!
//! ## Retry Logic
//!
//! Timeouts and network errors are retried with a growing delay (linear by
//! default). Package-not-found, permission and conflict errors fail on the
//! first attempt. Configure retry behavior through [`EngineConfig`] or use
//! [`retry::with_retry`] directly with a [`RetryPolicy`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod expand;
pub mod manifest;
pub mod notify;
pub mod orchestrator;
pub mod retry;
pub mod spec;
pub mod types;
pub mod version;

pub use error::{Error, ErrorCategory, ExecutorError, Result};
pub use manifest::Manifest;
pub use orchestrator::{CancelToken, InstallPlan, NoReporter, Orchestrator, Reporter};
pub use types::{
    Backoff, EngineConfig, InstallBatchResult, InstallOutcome, InstallStatus, PackageRequest,
    RetryPolicy, VersionConstraint,
};
pub use version::{compare_versions, satisfies};
