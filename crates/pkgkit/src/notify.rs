//! Side-channel notifications (Android notification shade on Termux).

use crate::backend::CommandRunner;
use crate::backend::runner::SystemRunner;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Receives short progress messages outside the terminal.
pub trait Notifier: Send + Sync {
    /// Deliver one notification. Callers treat failure as non-fatal.
    fn notify(&self, title: &str, message: &str) -> Result<()>;
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        (**self).notify(title, message)
    }
}

impl<T: Notifier + ?Sized> Notifier for Box<T> {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        (**self).notify(title, message)
    }
}

/// Notifier that drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotifier;

impl Notifier for NoNotifier {
    fn notify(&self, _title: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Posts notifications with `termux-notification` from Termux:API.
///
/// All messages share one notification id so progress updates replace
/// each other instead of piling up.
pub struct TermuxNotifier<R = SystemRunner> {
    runner: R,
    id: String,
    timeout: Duration,
}

impl TermuxNotifier {
    /// Create a notifier using the system runner.
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for TermuxNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> TermuxNotifier<R> {
    /// Create a notifier on top of a custom runner.
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            id: "pockit".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Use a different notification id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl<R: CommandRunner> Notifier for TermuxNotifier<R> {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        let argv = [
            "termux-notification",
            "-t",
            title,
            "-c",
            message,
            "--id",
            self.id.as_str(),
        ];
        self.runner.run_command(&argv, self.timeout)?.check()?;
        Ok(())
    }
}
