//! External process execution behind a swappable runner.
//!
//! Every collaborator (git, scp, ssh) is reached through [`CommandRunner`].
//! [`SystemRunner`] spawns real processes and enforces the invocation's
//! timeout; tests substitute a recording fake.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use wait_timeout::ChildExt;

use crate::error::{Error, Result};
use crate::utils::shell;

/// One external command: program, arguments, environment, working directory, stdin and time budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            stdin: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Time budget in seconds; `0` means no limit.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Command line for logs and error details.
    pub fn display(&self) -> String {
        shell::command_line(&self.program, &self.args)
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            exit_code: 0,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
            exit_code,
        }
    }

    /// Prefers stderr, falls back to stdout if stderr is empty.
    pub fn error_text(&self) -> String {
        if !self.stderr.trim().is_empty() {
            self.stderr.trim().to_string()
        } else {
            self.stdout.trim().to_string()
        }
    }

    /// Both streams, trimmed, for operator-facing reports.
    pub fn combined(&self) -> String {
        [self.stdout.trim(), self.stderr.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Seam for every external tool the release pipeline calls.
///
/// `Ok` carries the process outcome whatever its exit status. `Err` is
/// reserved for failures to run at all: spawn errors and timeouts.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs invocations as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let display = invocation.display();
        log::debug!("exec: {}", display);

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        for (key, value) in &invocation.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            Error::internal_io(
                format!("Failed to run {}: {}", invocation.program, e),
                Some(display.clone()),
            )
        })?;

        // Pipes are drained on helper threads so a chatty child cannot block on a full buffer.
        let writer = match (child.stdin.take(), invocation.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(thread::spawn(move || {
                if let Err(e) = pipe.write_all(input.as_bytes()) {
                    log::debug!("stdin closed early: {}", e);
                }
            })),
            _ => None,
        };
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match invocation.timeout {
            Some(limit) => match child.wait_timeout(limit) {
                Ok(Some(status)) => status,
                Ok(None) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    log::warn!("killed after {}s: {}", limit.as_secs(), display);
                    return Err(Error::command_timeout(display, limit.as_secs()));
                }
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::internal_io(e.to_string(), Some(display)));
                }
            },
            None => child
                .wait()
                .map_err(|e| Error::internal_io(e.to_string(), Some(display.clone())))?,
        };

        if let Some(handle) = writer {
            let _ = handle.join();
        }

        let output = CommandOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
            success: status.success(),
            exit_code: status.code().unwrap_or(-1),
        };

        log::debug!(
            "exit {} after {:.1}s: {}",
            output.exit_code,
            started.elapsed().as_secs_f64(),
            display
        );
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_status() {
        let out = SystemRunner
            .run(&Invocation::new("sh").args(["-c", "echo hello; echo oops >&2; exit 3"]))
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success);
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn feeds_stdin() {
        let out = SystemRunner
            .run(&Invocation::new("cat").stdin("line one\nline two\n"))
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "line one\nline two\n");
    }

    #[test]
    fn env_overrides_inherited_variables() {
        let out = SystemRunner
            .run(
                &Invocation::new("sh")
                    .args(["-c", "printf '%s|%s' \"$LC_ALL\" \"$LAUNCHPAD_EXTRA_VAR\""])
                    .env("LC_ALL", "C")
                    .env("LAUNCHPAD_EXTRA_VAR", "set"),
            )
            .unwrap();
        assert_eq!(out.stdout, "C|set");
    }

    #[test]
    fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = SystemRunner
            .run(&Invocation::new("pwd").current_dir(dir.path()))
            .unwrap();
        let reported = std::fs::canonicalize(out.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn kills_on_timeout() {
        let started = Instant::now();
        let err = SystemRunner
            .run(&Invocation::new("sleep").arg("5").timeout_secs(1))
            .unwrap_err();
        assert_eq!(err.code.as_str(), "command.timeout");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_io_error() {
        let err = SystemRunner
            .run(&Invocation::new("nonexistent_command_xyz"))
            .unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn error_text_prefers_stderr() {
        let out = CommandOutput {
            stdout: "stdout content".to_string(),
            stderr: "stderr content".to_string(),
            success: false,
            exit_code: 1,
        };
        assert_eq!(out.error_text(), "stderr content");

        let out = CommandOutput::failed(1, "");
        assert_eq!(out.error_text(), "");
        assert_eq!(CommandOutput::ok("only out").error_text(), "only out");
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        assert_eq!(Invocation::new("true").timeout_secs(0).timeout, None);
        assert_eq!(
            Invocation::new("true").timeout_secs(7).timeout,
            Some(Duration::from_secs(7))
        );
    }
}
