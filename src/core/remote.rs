//! Remote operation lists, rendered into one shell program per session.
//!
//! Each operation is bracketed by marker lines on stdout:
//!
//! ```text
//! ::launchpad-step 1
//! Already up to date.
//! ::launchpad-done 1 0
//! ```
//!
//! [`RemoteScript::parse_report`] reads the markers back so every operation
//! gets its own exit code and output even though the host sees one program.

use std::fmt::Write as _;

use serde::Serialize;

use crate::config::{ReleaseConfig, RemoteFailurePolicy};
use crate::utils::shell;

const STEP_MARKER: &str = "::launchpad-step";
const DONE_MARKER: &str = "::launchpad-done";
const MARKER_PREFIX: &str = "::launchpad-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Failure stops the script when the policy is `abort`.
    Fatal,
    /// Failure is reported and the script continues.
    Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteOp {
    pub label: String,
    pub command: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteScript {
    pub ops: Vec<RemoteOp>,
}

/// What the session's stdout says about one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpReport {
    /// A step marker was seen.
    pub reached: bool,
    /// `None` when the operation started but never reported completion.
    pub exit_code: Option<i32>,
    pub output: String,
}

impl OpReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// One entry per operation, in script order.
    pub ops: Vec<OpReport>,
    /// Session stdout with marker lines removed.
    pub output: String,
}

impl ScriptReport {
    pub fn any_reached(&self) -> bool {
        self.ops.iter().any(|op| op.reached)
    }
}

enum Marker {
    Step(usize),
    Done(usize, i32),
}

impl RemoteScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fatal(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.ops.push(RemoteOp {
            label: label.into(),
            command: command.into(),
            severity: Severity::Fatal,
        });
        self
    }

    pub fn advisory(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        self.ops.push(RemoteOp {
            label: label.into(),
            command: command.into(),
            severity: Severity::Advisory,
        });
        self
    }

    /// Pull strategy: update the checkout in place, then restart.
    pub fn for_pull(config: &ReleaseConfig) -> Self {
        let mut pull = String::from("git pull");
        if let Some(remote) = &config.git_remote {
            pull.push(' ');
            pull.push_str(&shell::quote(remote));
            if let Some(branch) = &config.git_branch {
                pull.push(' ');
                pull.push_str(&shell::quote(branch));
            }
        }

        let service = shell::quote(&config.service);
        Self::new()
            .fatal("enter deployment path", format!("cd {}", shell::quote(&config.remote_path)))
            .fatal("pull", pull)
            .fatal("restart service", format!("systemctl restart {}", service))
            .with_status_query(config)
    }

    /// Push strategy: stop, unpack the uploaded archive, clean up, start.
    pub fn for_push(config: &ReleaseConfig, remote_archive: &str) -> Self {
        let service = shell::quote(&config.service);
        let path = shell::quote(&config.remote_path);
        let archive = shell::quote(remote_archive);

        Self::new()
            .fatal("stop service", format!("systemctl stop {}", service))
            .fatal("create deployment path", format!("mkdir -p {}", path))
            .fatal("extract archive", format!("tar -xzf {} -C {}", archive, path))
            .advisory("remove archive", format!("rm -f {}", archive))
            .fatal("start service", format!("systemctl start {}", service))
            .with_status_query(config)
    }

    fn with_status_query(self, config: &ReleaseConfig) -> Self {
        if !config.service_status {
            return self;
        }
        let command = format!("systemctl status {} --no-pager", shell::quote(&config.service));
        self.advisory("service status", command)
    }

    /// Whether a failure of `op` ends the session under `policy`.
    pub fn stops_on_failure(op: &RemoteOp, policy: RemoteFailurePolicy) -> bool {
        op.severity == Severity::Fatal && policy == RemoteFailurePolicy::Abort
    }

    /// Render the operations as one POSIX shell program.
    ///
    /// Each operation runs in the current shell (so `cd` carries over), with
    /// stdin closed so it cannot consume the rest of a piped script, and
    /// stderr folded into stdout so its output stays between its markers.
    pub fn render(&self, policy: RemoteFailurePolicy) -> String {
        let mut script = String::new();
        for (index, op) in self.ops.iter().enumerate() {
            let _ = writeln!(script, "echo '{} {}'", STEP_MARKER, index);
            let _ = writeln!(script, "{{ {}\n}} </dev/null 2>&1", op.command);
            let _ = writeln!(script, "rc=$?");
            let _ = writeln!(script, "echo \"{} {} $rc\"", DONE_MARKER, index);
            if Self::stops_on_failure(op, policy) {
                let _ = writeln!(script, "[ \"$rc\" -eq 0 ] || exit \"$rc\"");
            }
        }
        script
    }

    /// Plain command list without markers, for display.
    pub fn commands(&self) -> Vec<String> {
        self.ops.iter().map(|op| op.command.clone()).collect()
    }

    pub fn parse_report(&self, stdout: &str) -> ScriptReport {
        let mut ops = vec![OpReport::default(); self.ops.len()];
        let mut clean = String::new();
        let mut current: Option<usize> = None;

        let mut keep = |text: &str, current: Option<usize>, ops: &mut Vec<OpReport>| {
            clean.push_str(text);
            clean.push('\n');
            if let Some(op) = current.and_then(|i| ops.get_mut(i)) {
                op.output.push_str(text);
                op.output.push('\n');
            }
        };

        for line in stdout.lines() {
            // Output without a trailing newline can share a line with the next marker.
            let (text, marker) = match line.find(MARKER_PREFIX) {
                Some(pos) => match parse_marker(&line[pos..]) {
                    Some(marker) => (&line[..pos], Some(marker)),
                    None => (line, None),
                },
                None => (line, None),
            };

            if !text.is_empty() || marker.is_none() {
                keep(text, current, &mut ops);
            }

            match marker {
                Some(Marker::Step(index)) => {
                    if let Some(op) = ops.get_mut(index) {
                        op.reached = true;
                    }
                    current = Some(index);
                }
                Some(Marker::Done(index, code)) => {
                    if let Some(op) = ops.get_mut(index) {
                        op.reached = true;
                        op.exit_code = Some(code);
                    }
                    current = None;
                }
                None => {}
            }
        }

        for op in &mut ops {
            let trimmed = op.output.trim_end().to_string();
            op.output = trimmed;
        }

        ScriptReport {
            ops,
            output: clean.trim_end().to_string(),
        }
    }
}

fn parse_marker(text: &str) -> Option<Marker> {
    let mut parts = text.split_whitespace();
    let tag = parts.next()?;
    let index = parts.next()?.parse().ok()?;
    let marker = match tag {
        STEP_MARKER => Marker::Step(index),
        DONE_MARKER => Marker::Done(index, parts.next()?.parse().ok()?),
        _ => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(marker)
}
