//! Real subprocess runner with a hard timeout.

use crate::backend::{CommandOutput, CommandRunner};
use crate::error::ExecutorError;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Runs commands on the host system.
///
/// Output pipes are drained on helper threads so a chatty tool cannot
/// block on a full pipe while we wait for it. When the timeout expires the
/// child is killed and reaped. On Unix each child starts in its own
/// process group, so terminal interrupts are not delivered to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run_command(
        &self,
        argv: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, ExecutorError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(ExecutorError::Spawn {
                program: String::new(),
                message: "empty command line".to_string(),
            });
        };

        log::debug!("Running `{}` (timeout {}s)", argv.join(" "), timeout.as_secs());

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group: a terminal Ctrl-C reaches pockit only, and
        // running installs end on their own or by timeout.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ExecutorError::Spawn {
                program: program.to_string(),
                message: e.to_string(),
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("`{}` timed out after {}s", argv.join(" "), timeout.as_secs());
                // Reader threads are left to finish on their own; a grandchild
                // may still hold the pipes open.
                return Err(ExecutorError::Timeout {
                    program: program.to_string(),
                    timeout,
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecutorError::Spawn {
                    program: program.to_string(),
                    message: e.to_string(),
                });
            }
        };

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output_and_exit_code() {
        let output = SystemRunner
            .run_command(&["sh", "-c", "echo out; echo err >&2; exit 3"], Duration::from_secs(10))
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    fn test_timeout_kills_child() {
        let err = SystemRunner
            .run_command(&["sleep", "5"], Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Timeout { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_interrupt_to_parent_group_spares_child() {
        extern "C" fn ignore(_: libc::c_int) {}
        let handler: extern "C" fn(libc::c_int) = ignore;

        // SAFETY: setpgid and signal act on this process only; the handler
        // is async-signal-safe.
        unsafe {
            // Leave the test runner's group so the interrupt stays local.
            libc::setpgid(0, 0);
            libc::signal(libc::SIGINT, handler as libc::sighandler_t);
        }

        let running = thread::spawn(|| {
            SystemRunner.run_command(&["sh", "-c", "sleep 1; echo finished"], Duration::from_secs(10))
        });
        thread::sleep(Duration::from_millis(300));
        // SAFETY: plain syscall, signals our own process group.
        unsafe {
            libc::kill(0, libc::SIGINT);
        }

        let output = running.join().unwrap().unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "finished");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = SystemRunner
            .run_command(&["definitely-not-a-real-program-xyz"], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Spawn { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_argv() {
        assert!(SystemRunner.run_command(&[], Duration::from_secs(1)).is_err());
    }
}
