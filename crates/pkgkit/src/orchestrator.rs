//! Batch installation: validation, expansion, gating and the worker pool.
//!
//! A batch runs in two phases. Planning validates names, expands
//! dependencies and asks the version oracle which packages already satisfy
//! their constraint; none of that touches the executor. Execution then
//! drains the remaining jobs through a fixed-size rayon pool, each job
//! retried on transient failures until it reaches a terminal state.

use crate::backend::{Executor, MetadataSource, VersionOracle};
use crate::error::ErrorCategory;
use crate::expand::{dedup, expand};
use crate::notify::{NoNotifier, Notifier};
use crate::retry::{RetryCallback, with_retry};
use crate::spec::is_valid_name;
use crate::types::{
    EngineConfig, InstallBatchResult, InstallOutcome, InstallStatus, PackageRequest,
};
use crate::version::satisfies;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Observes batch progress (progress bars, status lines).
///
/// Calls arrive from worker threads, one at a time per outcome.
pub trait Reporter: Send + Sync {
    /// The batch is about to start processing `total` packages.
    fn on_batch_start(&self, _total: usize, _concurrency: usize) {}

    /// A transient failure is about to be retried.
    fn on_retry(
        &self,
        _package: &PackageRequest,
        _attempt: u32,
        _max_attempts: u32,
        _error: &str,
        _delay: Duration,
    ) {
    }

    /// A package reached its terminal state; `completed` counts outcomes so far.
    fn on_outcome(&self, outcome: &InstallOutcome, completed: usize, total: usize);
}

/// Reporter that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReporter;

impl Reporter for NoReporter {
    fn on_outcome(&self, _outcome: &InstallOutcome, _completed: usize, _total: usize) {}
}

/// Shared flag for cooperative cancellation.
///
/// Once set, workers stop picking up new jobs; jobs already running finish
/// or time out.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a batch would do, computed without running the executor.
#[derive(Debug, Default)]
pub struct InstallPlan {
    /// Requests rejected for their name
    pub invalid: Vec<InstallOutcome>,
    /// Packages whose dependency lookup failed
    pub lookup_failures: Vec<InstallOutcome>,
    /// Packages whose installed version already satisfies the constraint
    pub satisfied: Vec<InstallOutcome>,
    /// Packages that need the executor
    pub pending: Vec<PackageRequest>,
}

impl InstallPlan {
    /// Number of packages the batch accounts for.
    pub fn total(&self) -> usize {
        self.invalid.len() + self.lookup_failures.len() + self.satisfied.len() + self.pending.len()
    }

    /// Whether nothing needs installing.
    pub fn is_noop(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Kind of batch, for notification titles.
#[derive(Debug, Clone, Copy)]
enum BatchKind {
    Install,
    Remove,
}

impl BatchKind {
    fn progress_title(self) -> &'static str {
        match self {
            Self::Install => "Installation Progress",
            Self::Remove => "Removal Progress",
        }
    }
}

/// Outcomes collected from the workers.
#[derive(Default)]
struct BatchState {
    result: InstallBatchResult,
    completed: usize,
}

/// Fixed-size pool, or inline execution if the pool cannot be built.
enum Workers {
    Pool(rayon::ThreadPool),
    Inline,
}

impl Workers {
    fn new(threads: usize) -> Self {
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Self::Pool(pool),
            Err(e) => {
                log::warn!("Failed to create worker pool, running sequentially: {e}");
                Self::Inline
            }
        }
    }

    fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match self {
            Self::Pool(pool) => pool.install(|| items.par_iter().map(&f).collect()),
            Self::Inline => items.iter().map(f).collect(),
        }
    }

    fn for_each<T, F>(&self, items: Vec<T>, f: F)
    where
        T: Send,
        F: Fn(T) + Sync + Send,
    {
        match self {
            Self::Pool(pool) => pool.install(|| items.into_par_iter().for_each(&f)),
            Self::Inline => items.into_iter().for_each(f),
        }
    }
}

/// Forwards retry notices to the log and the reporter.
struct RetryReport<'a> {
    package: &'a PackageRequest,
    reporter: &'a dyn Reporter,
}

impl RetryCallback for RetryReport<'_> {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &dyn fmt::Display, delay: Duration) {
        let error = error.to_string();
        log::warn!(
            "{}: attempt {attempt}/{max_attempts} failed: {error}. Retrying in {}s...",
            self.package.name(),
            delay.as_secs()
        );
        self.reporter
            .on_retry(self.package, attempt, max_attempts, &error, delay);
    }
}

/// Drives a batch of package requests to completion.
pub struct Orchestrator<E, O, M> {
    executor: E,
    oracle: O,
    metadata: M,
    config: EngineConfig,
    reporter: Box<dyn Reporter>,
    notifier: Box<dyn Notifier>,
    cancel: CancelToken,
}

impl<E, O, M> Orchestrator<E, O, M>
where
    E: Executor,
    O: VersionOracle,
    M: MetadataSource,
{
    /// Create an orchestrator over the given capabilities.
    pub fn new(executor: E, oracle: O, metadata: M, config: EngineConfig) -> Self {
        Self {
            executor,
            oracle,
            metadata,
            config,
            reporter: Box::new(NoReporter),
            notifier: Box::new(NoNotifier),
            cancel: CancelToken::new(),
        }
    }

    /// Attach a progress reporter.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Attach a side-channel notifier.
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels batches run by this orchestrator.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Engine configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Worker count after applying backend capabilities.
    pub fn effective_concurrency(&self) -> usize {
        if self.executor.capabilities().concurrent_safe {
            self.config.concurrency.max(1)
        } else {
            1
        }
    }

    /// Validate, expand and gate requests without running the executor.
    pub fn plan(&self, requests: impl IntoIterator<Item = PackageRequest>) -> InstallPlan {
        let workers = Workers::new(self.effective_concurrency());
        self.plan_with(&workers, requests)
    }

    fn plan_with(
        &self,
        workers: &Workers,
        requests: impl IntoIterator<Item = PackageRequest>,
    ) -> InstallPlan {
        let mut plan = InstallPlan::default();

        let (valid, invalid): (Vec<_>, Vec<_>) =
            dedup(requests).into_iter().partition(|r| is_valid_name(r.name()));
        plan.invalid = invalid
            .into_iter()
            .map(|r| InstallOutcome::failed(r, "InvalidName", 1, ErrorCategory::InvalidSpec))
            .collect();

        let expansion = expand(valid, &self.metadata, self.config.expand_depth);
        plan.lookup_failures = expansion
            .lookup_failures
            .into_iter()
            .map(|f| InstallOutcome::failed(f.package, f.error.to_string(), 1, f.error.category()))
            .collect();

        let installed = workers.map(&expansion.packages, |p| self.oracle.installed_version(p.name()));
        for (package, installed) in expansion.packages.into_iter().zip(installed) {
            match installed {
                Some(version) if satisfies(Some(&version), package.constraint()) => {
                    log::debug!("{package} already satisfied by {version}");
                    plan.satisfied.push(InstallOutcome::satisfied(package, &version));
                }
                _ => plan.pending.push(package),
            }
        }

        plan
    }

    /// Install a batch of requests and their dependencies.
    ///
    /// Never fails as a whole: every package ends up in the result as
    /// satisfied, installed, failed or (after cancellation) never
    /// dispatched.
    pub fn run(&self, requests: impl IntoIterator<Item = PackageRequest>) -> InstallBatchResult {
        let start = Instant::now();
        let concurrency = self.effective_concurrency();
        let workers = Workers::new(concurrency);

        let plan = self.plan_with(&workers, requests);
        let total = plan.total();
        log::info!(
            "Processing {total} package(s): {} to install, {} already satisfied",
            plan.pending.len(),
            plan.satisfied.len()
        );
        self.reporter.on_batch_start(total, concurrency);

        let state = Mutex::new(BatchState::default());
        thread::scope(|scope| {
            let (notices, inbox) = mpsc::channel();
            scope.spawn(move || self.deliver(BatchKind::Install, inbox));

            let settled = plan
                .invalid
                .into_iter()
                .chain(plan.lookup_failures)
                .chain(plan.satisfied);
            for outcome in settled {
                self.record(&state, outcome, total, &notices);
            }

            workers.for_each(plan.pending, |package| {
                if self.cancel.is_cancelled() {
                    lock(&state).result.cancelled.push(package);
                    return;
                }
                let outcome = self.install_one(package);
                self.record(&state, outcome, total, &notices);
            });
        });

        finish(state, start)
    }

    /// Uninstall packages by name.
    ///
    /// No expansion and no version gating; successes are reported as
    /// [`InstallStatus::Removed`].
    pub fn remove(&self, names: impl IntoIterator<Item = String>) -> InstallBatchResult {
        let start = Instant::now();
        let concurrency = self.effective_concurrency();
        let workers = Workers::new(concurrency);

        let (valid, invalid): (Vec<_>, Vec<_>) = dedup(names.into_iter().map(PackageRequest::new))
            .into_iter()
            .partition(|r| is_valid_name(r.name()));
        let total = valid.len() + invalid.len();
        self.reporter.on_batch_start(total, concurrency);

        let state = Mutex::new(BatchState::default());
        thread::scope(|scope| {
            let (notices, inbox) = mpsc::channel();
            scope.spawn(move || self.deliver(BatchKind::Remove, inbox));

            for request in invalid {
                let outcome =
                    InstallOutcome::failed(request, "InvalidName", 1, ErrorCategory::InvalidSpec);
                self.record(&state, outcome, total, &notices);
            }

            workers.for_each(valid, |package| {
                if self.cancel.is_cancelled() {
                    lock(&state).result.cancelled.push(package);
                    return;
                }
                let outcome = self.remove_one(package);
                self.record(&state, outcome, total, &notices);
            });
        });

        finish(state, start)
    }

    /// Remove orphaned dependencies and caches; failure is only logged.
    pub fn auto_clean(&self) -> bool {
        match self.executor.auto_clean() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Auto-clean with {} failed: {e}", self.executor.name());
                false
            }
        }
    }

    fn install_one(&self, package: PackageRequest) -> InstallOutcome {
        let policy = self.config.retry_policy();
        let callback = RetryReport {
            package: &package,
            reporter: self.reporter.as_ref(),
        };

        let result = with_retry(&policy, Some(&callback), || {
            log::debug!("Installing {package} with {}", self.executor.name());
            self.executor.install(package.name(), package.constraint())
        });

        match result {
            Ok(done) => {
                log::info!("Installed {package}");
                InstallOutcome {
                    package,
                    status: InstallStatus::Installed,
                    detail: attempts_detail("installed", done.attempts),
                    attempts: done.attempts,
                    category: None,
                }
            }
            Err(failure) => {
                log::info!("Failed to install {package}: {}", failure.value);
                InstallOutcome::failed(
                    package,
                    failure.value.to_string(),
                    failure.attempts,
                    failure.value.category(),
                )
            }
        }
    }

    fn remove_one(&self, package: PackageRequest) -> InstallOutcome {
        let policy = self.config.retry_policy();
        let callback = RetryReport {
            package: &package,
            reporter: self.reporter.as_ref(),
        };

        let result = with_retry(&policy, Some(&callback), || {
            log::debug!("Removing {} with {}", package.name(), self.executor.name());
            self.executor.uninstall(package.name())
        });

        match result {
            Ok(done) => {
                log::info!("Removed {}", package.name());
                InstallOutcome {
                    package,
                    status: InstallStatus::Removed,
                    detail: attempts_detail("removed", done.attempts),
                    attempts: done.attempts,
                    category: None,
                }
            }
            Err(failure) => {
                log::info!("Failed to remove {}: {}", package.name(), failure.value);
                InstallOutcome::failed(
                    package,
                    failure.value.to_string(),
                    failure.attempts,
                    failure.value.category(),
                )
            }
        }
    }

    /// Store an outcome, tell the reporter and maybe queue a notification.
    ///
    /// The reporter is called outside the lock.
    fn record(
        &self,
        state: &Mutex<BatchState>,
        outcome: InstallOutcome,
        total: usize,
        notices: &Sender<String>,
    ) {
        let completed = {
            let mut state = lock(state);
            if outcome.is_success() {
                state.result.succeeded.push(outcome.package.clone());
            } else {
                state.result.failed.push(outcome.clone());
            }
            state.result.outcomes.push(outcome.clone());
            state.completed += 1;
            state.completed
        };

        self.reporter.on_outcome(&outcome, completed, total);

        let every = self.config.notify_every;
        if every > 0 && completed % every == 0 {
            // The delivery thread outlives every sender.
            let _ = notices.send(format!("{completed}/{total} packages processed"));
        }
    }

    /// Post queued progress notifications until every sender is gone.
    ///
    /// Runs on its own thread so a slow notifier never holds a worker.
    fn deliver(&self, kind: BatchKind, inbox: Receiver<String>) {
        for message in inbox {
            if let Err(e) = self.notifier.notify(kind.progress_title(), &message) {
                log::warn!("Notification failed: {e}");
            }
        }
    }
}

fn attempts_detail(verb: &str, attempts: u32) -> String {
    if attempts > 1 {
        format!("{verb} after {attempts} attempts")
    } else {
        verb.to_string()
    }
}

/// Lock the batch state, recovering from a poisoned mutex.
fn lock(state: &Mutex<BatchState>) -> std::sync::MutexGuard<'_, BatchState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn finish(state: Mutex<BatchState>, start: Instant) -> InstallBatchResult {
    let mut result = state
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .result;
    result.elapsed = start.elapsed();
    if result.was_cancelled() {
        log::warn!("Batch cancelled, {} package(s) not processed", result.cancelled.len());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ExecutorError, Result};
    use crate::types::VersionConstraint;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::AtomicUsize;

    /// Scripted failure for one package.
    #[derive(Clone)]
    enum Script {
        /// Fail with a transient error this many times, then succeed
        FlakyTimes(u32),
        /// Always time out
        AlwaysTimeout,
        /// Fail terminally
        Terminal,
    }

    /// In-memory package manager implementing every capability.
    #[derive(Default)]
    struct MockBackend {
        installed: Mutex<HashMap<String, String>>,
        deps: HashMap<String, Vec<String>>,
        broken_metadata: Vec<String>,
        scripts: HashMap<String, Script>,
        calls: Mutex<Vec<String>>,
        call_times: Mutex<Vec<Instant>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        work: Duration,
        serial_only: bool,
        cancel_on_first_call: Option<CancelToken>,
        version_to_install: String,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                version_to_install: "1.0.0".to_string(),
                ..Default::default()
            }
        }

        fn installed(self, name: &str, version: &str) -> Self {
            self.installed
                .lock()
                .unwrap()
                .insert(name.to_string(), version.to_string());
            self
        }

        fn depends(mut self, name: &str, deps: &[&str]) -> Self {
            self.deps
                .insert(name.to_string(), deps.iter().map(|d| d.to_string()).collect());
            self
        }

        fn script(mut self, name: &str, script: Script) -> Self {
            self.scripts.insert(name.to_string(), script);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn calls_for(&self, name: &str) -> usize {
            self.calls().iter().filter(|c| *c == name).count()
        }
    }

    impl Executor for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        fn capabilities(&self) -> crate::backend::Capabilities {
            crate::backend::Capabilities {
                concurrent_safe: !self.serial_only,
            }
        }

        fn install(
            &self,
            name: &str,
            _constraint: &VersionConstraint,
        ) -> std::result::Result<(), ExecutorError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(name.to_string());
            self.call_times.lock().unwrap().push(Instant::now());
            if let Some(token) = &self.cancel_on_first_call {
                token.cancel();
            }
            if !self.work.is_zero() {
                std::thread::sleep(self.work);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let previous_calls = self.calls_for(name) as u32 - 1;
            match self.scripts.get(name) {
                Some(Script::FlakyTimes(n)) if previous_calls < *n => {
                    return Err(ExecutorError::Transient {
                        detail: "Connection reset by peer".to_string(),
                    });
                }
                Some(Script::AlwaysTimeout) => {
                    return Err(ExecutorError::Timeout {
                        program: "mock".to_string(),
                        timeout: Duration::from_secs(30),
                    });
                }
                Some(Script::Terminal) => {
                    return Err(ExecutorError::Terminal {
                        detail: format!("No matching distribution found for {name}"),
                        category: ErrorCategory::NotFound,
                    });
                }
                _ => {}
            }

            self.installed
                .lock()
                .unwrap()
                .insert(name.to_string(), self.version_to_install.clone());
            Ok(())
        }

        fn uninstall(&self, name: &str) -> std::result::Result<(), ExecutorError> {
            self.calls.lock().unwrap().push(format!("-{name}"));
            match self.installed.lock().unwrap().remove(name) {
                Some(_) => Ok(()),
                None => Err(ExecutorError::Terminal {
                    detail: format!("WARNING: Skipping {name} as it is not installed."),
                    category: ErrorCategory::NotFound,
                }),
            }
        }
    }

    impl VersionOracle for MockBackend {
        fn installed_version(&self, name: &str) -> Option<String> {
            self.installed.lock().unwrap().get(name).cloned()
        }
    }

    impl MetadataSource for MockBackend {
        fn dependencies_of(&self, name: &str) -> Result<BTreeSet<String>> {
            if self.broken_metadata.iter().any(|n| n == name) {
                return Err(Error::DependencyLookup {
                    name: name.to_string(),
                    message: "index unavailable".to_string(),
                });
            }
            Ok(self
                .deps
                .get(name)
                .map(|d| d.iter().cloned().collect())
                .unwrap_or_default())
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            base_delay: Duration::from_millis(10),
            ..EngineConfig::default()
        }
    }

    fn orchestrator(mock: &MockBackend, config: EngineConfig) -> Orchestrator<&MockBackend, &MockBackend, &MockBackend> {
        Orchestrator::new(mock, mock, mock, config)
    }

    fn req(spec: &str) -> PackageRequest {
        PackageRequest::parse(spec).unwrap()
    }

    #[derive(Clone, Default)]
    struct Recorder {
        outcomes: Arc<Mutex<Vec<(String, usize, usize)>>>,
        retries: Arc<Mutex<Vec<(String, u32, Duration)>>>,
    }

    impl Reporter for Recorder {
        fn on_retry(&self, package: &PackageRequest, attempt: u32, _: u32, _: &str, delay: Duration) {
            self.retries
                .lock()
                .unwrap()
                .push((package.name().to_string(), attempt, delay));
        }

        fn on_outcome(&self, outcome: &InstallOutcome, completed: usize, total: usize) {
            self.outcomes
                .lock()
                .unwrap()
                .push((outcome.package.name().to_string(), completed, total));
        }
    }

    #[derive(Clone, Default)]
    struct CountingNotifier {
        messages: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Notifier for CountingNotifier {
        fn notify(&self, title: &str, message: &str) -> Result<()> {
            self.messages.lock().unwrap().push(format!("{title}: {message}"));
            if self.fail {
                return Err(Error::Other("termux-notification not found".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_alpha_beta_gamma() {
        let mock = MockBackend::new()
            .installed("alpha", "0.9")
            .depends("alpha", &["gamma"])
            .script("beta", Script::Terminal);
        let orch = orchestrator(&mock, fast_config());

        let result = orch.run([req("alpha>=1.0"), req("beta")]);

        let mut calls = mock.calls();
        calls.sort();
        assert_eq!(calls, vec!["alpha", "beta", "gamma"]);

        let mut succeeded: Vec<_> = result.succeeded.iter().map(PackageRequest::name).collect();
        succeeded.sort_unstable();
        assert_eq!(succeeded, vec!["alpha", "gamma"]);

        assert_eq!(result.failed.len(), 1);
        let beta = &result.failed[0];
        assert_eq!(beta.package.name(), "beta");
        assert_eq!(beta.attempts, 1);
        assert_eq!(beta.category, Some(ErrorCategory::NotFound));
        assert_eq!(result.outcome("alpha").unwrap().status, InstallStatus::Installed);
    }

    #[test]
    fn test_satisfied_root_still_expands_shared_dependency() {
        let mock = MockBackend::new()
            .installed("alpha", "2.0")
            .depends("alpha", &["gamma"])
            .depends("beta", &["gamma"]);
        let orch = orchestrator(&mock, fast_config());

        let result = orch.run([req("alpha>=1.0"), req("beta")]);

        let mut calls = mock.calls();
        calls.sort();
        assert_eq!(calls, vec!["beta", "gamma"]);
        assert_eq!(result.total(), 3);
        assert_eq!(result.succeeded.len(), 3);
        assert!(result.failed.is_empty());
        assert_eq!(
            result.outcome("alpha").unwrap().status,
            InstallStatus::AlreadySatisfied
        );
        assert_eq!(result.outcome("beta").unwrap().status, InstallStatus::Installed);
        assert_eq!(result.outcome("gamma").unwrap().status, InstallStatus::Installed);
    }

    #[test]
    fn test_every_package_accounted_once() {
        let mut mock = MockBackend::new()
            .installed("numpy", "1.26.4")
            .depends("flask", &["jinja2", "click"])
            .depends("django", &["asgiref"])
            .script("django", Script::Terminal);
        mock.broken_metadata.push("broken".to_string());
        let orch = orchestrator(&mock, fast_config());

        let result = orch.run([
            req("flask"),
            req("numpy>=1.22"),
            req("django"),
            req("flask==2.3.2"),
            req("broken"),
            PackageRequest::new("bad name!"),
        ]);

        // flask, numpy, django, broken, bad name!, jinja2, click, asgiref
        assert_eq!(result.total(), 8);
        assert_eq!(result.succeeded.len() + result.failed.len(), 8);
        let names: BTreeSet<_> = result.outcomes.iter().map(|o| o.package.name()).collect();
        assert_eq!(names.len(), 8);

        let invalid = result.outcome("bad name!").unwrap();
        assert_eq!(invalid.detail, "InvalidName");
        assert_eq!(invalid.category, Some(ErrorCategory::InvalidSpec));
        assert_eq!(
            result.outcome("broken").unwrap().category,
            Some(ErrorCategory::DependencyLookup)
        );
        assert_eq!(
            result.outcome("flask").unwrap().package.constraint(),
            &VersionConstraint::Exact("2.3.2".to_string())
        );
        assert_eq!(mock.calls_for("broken"), 0);
        assert_eq!(mock.calls_for("bad name!"), 0);
    }

    #[test]
    fn test_satisfied_packages_never_executed() {
        let mock = MockBackend::new()
            .installed("requests", "2.31.0")
            .installed("colorama", "0.4.6");
        let orch = orchestrator(&mock, fast_config());

        let result = orch.run([req("requests>=2.28.0"), req("colorama")]);

        assert!(mock.calls().is_empty());
        assert_eq!(result.count(InstallStatus::AlreadySatisfied), 2);
        assert!(result.outcomes.iter().all(|o| o.attempts == 1));
    }

    #[test]
    fn test_outdated_package_is_installed() {
        let mock = MockBackend::new().installed("numpy", "1.21.0");
        let orch = orchestrator(&mock, fast_config());

        let result = orch.run([req("numpy>=1.22.0")]);
        assert_eq!(mock.calls(), vec!["numpy"]);
        assert!(result.is_success());
    }

    #[test]
    fn test_transient_errors_use_all_attempts_with_growing_delays() {
        let mock = MockBackend::new().script("scapy", Script::AlwaysTimeout);
        let recorder = Recorder::default();
        let orch = orchestrator(&mock, fast_config()).with_reporter(recorder.clone());

        let result = orch.run([req("scapy")]);

        assert_eq!(mock.calls_for("scapy"), 3);
        let failure = &result.failed[0];
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.category, Some(ErrorCategory::Timeout));

        let retries = recorder.retries.lock().unwrap().clone();
        assert_eq!(
            retries,
            vec![
                ("scapy".to_string(), 1, Duration::from_millis(10)),
                ("scapy".to_string(), 2, Duration::from_millis(20)),
            ]
        );

        let times = mock.call_times.lock().unwrap().clone();
        assert!(times[1] - times[0] >= Duration::from_millis(10));
        assert!(times[2] - times[1] >= Duration::from_millis(20));
    }

    #[test]
    fn test_flaky_package_recovers() {
        let mock = MockBackend::new().script("pandas", Script::FlakyTimes(1));
        let orch = orchestrator(&mock, fast_config());

        let result = orch.run([req("pandas")]);

        assert!(result.is_success());
        let outcome = result.outcome("pandas").unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.detail, "installed after 2 attempts");
    }

    #[test]
    fn test_terminal_error_single_call() {
        let mock = MockBackend::new().script("nosuchpkg", Script::Terminal);
        let orch = orchestrator(&mock, fast_config());

        let result = orch.run([req("nosuchpkg")]);

        assert_eq!(mock.calls_for("nosuchpkg"), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].attempts, 1);
        assert_eq!(result.failed[0].category, Some(ErrorCategory::NotFound));
    }

    #[test]
    fn test_concurrency_bound() {
        let mut mock = MockBackend::new();
        mock.work = Duration::from_millis(20);
        let config = EngineConfig {
            concurrency: 3,
            ..fast_config()
        };
        let orch = orchestrator(&mock, config);

        let requests: Vec<_> = (0..12).map(|i| PackageRequest::new(format!("pkg{i}"))).collect();
        let result = orch.run(requests);

        assert_eq!(result.succeeded.len(), 12);
        let peak = mock.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeded 3");
        assert!(peak >= 2, "jobs never overlapped");
    }

    #[test]
    fn test_serial_backend_clamps_concurrency() {
        let mut mock = MockBackend::new();
        mock.work = Duration::from_millis(5);
        mock.serial_only = true;
        let config = EngineConfig {
            concurrency: 4,
            ..fast_config()
        };
        let orch = orchestrator(&mock, config);
        assert_eq!(orch.effective_concurrency(), 1);

        let requests: Vec<_> = (0..6).map(|i| PackageRequest::new(format!("pkg{i}"))).collect();
        orch.run(requests);

        assert_eq!(mock.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let mock = MockBackend::new().depends("flask", &["werkzeug"]);
        let orch = orchestrator(&mock, fast_config());

        let first = orch.run([req("flask>=1.0"), req("six")]);
        assert_eq!(first.count(InstallStatus::Installed), 3);
        let calls_after_first = mock.calls().len();

        let second = orch.run([req("flask>=1.0"), req("six")]);
        assert_eq!(mock.calls().len(), calls_after_first);
        assert_eq!(second.count(InstallStatus::AlreadySatisfied), 3);
    }

    #[test]
    fn test_reporter_sees_every_outcome() {
        let mock = MockBackend::new().installed("six", "1.16.0");
        let recorder = Recorder::default();
        let orch = orchestrator(&mock, fast_config()).with_reporter(recorder.clone());

        orch.run([req("six"), req("rich"), req("attrs")]);

        let seen = recorder.outcomes.lock().unwrap().clone();
        assert_eq!(seen.len(), 3);
        let mut counts: Vec<usize> = seen.iter().map(|(_, done, _)| *done).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2, 3]);
        assert!(seen.iter().all(|(_, _, total)| *total == 3));
    }

    #[test]
    fn test_notifications_every_n() {
        let mock = MockBackend::new();
        let notifier = CountingNotifier::default();
        let config = EngineConfig {
            notify_every: 2,
            ..fast_config()
        };
        let orch = orchestrator(&mock, config).with_notifier(notifier.clone());

        let requests: Vec<_> = (0..5).map(|i| PackageRequest::new(format!("pkg{i}"))).collect();
        orch.run(requests);

        let mut messages = notifier.messages.lock().unwrap().clone();
        messages.sort();
        assert_eq!(
            messages,
            vec![
                "Installation Progress: 2/5 packages processed",
                "Installation Progress: 4/5 packages processed",
            ]
        );
    }

    #[test]
    fn test_notifier_failure_does_not_affect_batch() {
        let mock = MockBackend::new();
        let notifier = CountingNotifier {
            fail: true,
            ..Default::default()
        };
        let config = EngineConfig {
            notify_every: 1,
            ..fast_config()
        };
        let orch = orchestrator(&mock, config).with_notifier(notifier.clone());

        let result = orch.run([req("a"), req("b")]);

        assert!(result.is_success());
        assert_eq!(notifier.messages.lock().unwrap().len(), 2);
    }

    #[derive(Clone, Default)]
    struct SlowNotifier {
        delivered: Arc<AtomicUsize>,
    }

    impl Notifier for SlowNotifier {
        fn notify(&self, _title: &str, _message: &str) -> Result<()> {
            std::thread::sleep(Duration::from_millis(300));
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_slow_notifier_does_not_hold_workers() {
        let mock = MockBackend::new();
        let notifier = SlowNotifier::default();
        let config = EngineConfig {
            concurrency: 1,
            notify_every: 1,
            ..fast_config()
        };
        let orch = orchestrator(&mock, config).with_notifier(notifier.clone());

        let requests: Vec<_> = (0..4).map(|i| PackageRequest::new(format!("pkg{i}"))).collect();
        let result = orch.run(requests);

        assert!(result.is_success());
        let times = mock.call_times.lock().unwrap().clone();
        assert_eq!(times.len(), 4);
        let spread = times[3].duration_since(times[0]);
        assert!(spread < Duration::from_millis(250), "installs waited on notifier: {spread:?}");
        // Pending notifications are flushed before the batch returns
        assert_eq!(notifier.delivered.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_cancel_before_run() {
        let mock = MockBackend::new().installed("six", "1.16.0");
        let orch = orchestrator(&mock, fast_config());
        orch.cancel_token().cancel();

        let result = orch.run([req("six"), req("rich"), req("attrs")]);

        assert!(mock.calls().is_empty());
        assert_eq!(result.count(InstallStatus::AlreadySatisfied), 1);
        assert_eq!(result.cancelled.len(), 2);
        assert!(result.was_cancelled());
        assert!(!result.is_success());
    }

    #[test]
    fn test_cancel_mid_batch() {
        let token = CancelToken::new();
        let mut mock = MockBackend::new();
        mock.cancel_on_first_call = Some(token.clone());
        let config = EngineConfig {
            concurrency: 1,
            ..fast_config()
        };
        let orch = orchestrator(&mock, config).with_cancel_token(token);

        let requests: Vec<_> = (0..4).map(|i| PackageRequest::new(format!("pkg{i}"))).collect();
        let result = orch.run(requests);

        assert_eq!(mock.calls().len(), 1);
        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.cancelled.len(), 3);
    }

    #[test]
    fn test_plan_does_not_execute() {
        let mock = MockBackend::new()
            .installed("alpha", "2.0")
            .depends("beta", &["gamma"]);
        let orch = orchestrator(&mock, fast_config());

        let plan = orch.plan([req("alpha"), req("beta"), PackageRequest::new("")]);

        assert!(mock.calls().is_empty());
        assert_eq!(plan.total(), 4);
        assert_eq!(plan.satisfied.len(), 1);
        assert_eq!(plan.invalid.len(), 1);
        let pending: Vec<_> = plan.pending.iter().map(PackageRequest::name).collect();
        assert_eq!(pending, vec!["beta", "gamma"]);
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_remove_batch() {
        let mock = MockBackend::new().installed("nmap", "7.94").installed("git", "2.42.0");
        let orch = orchestrator(&mock, fast_config());

        let result = orch.remove(["nmap".to_string(), "git".to_string(), "nosuch".to_string()]);

        assert_eq!(result.count(InstallStatus::Removed), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].package.name(), "nosuch");
        assert_eq!(result.failed[0].attempts, 1);
        assert!(mock.installed_version("nmap").is_none());
        assert!(orch.auto_clean());
    }
}
