use std::path::{Path, PathBuf};

use crate::archive::{self, Exclusions};
use crate::config::ReleaseConfig;
use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::git::{self, CommitOutcome};
use crate::pipeline::{Stage, StepResult};
use crate::remote::{RemoteOp, RemoteScript, Severity};
use crate::ssh::SshClient;
use crate::utils::command::CommandRunner;

use super::pipeline::{archive_file_name, labels};

/// Runs the stages in order, recording a [`StepResult`] for each.
///
/// Every fatal stage returns `Err` and stops the run. Advisory conditions are
/// recorded on the step and execution continues.
pub(crate) struct ReleaseExecutor<'a> {
    config: &'a ReleaseConfig,
    runner: &'a dyn CommandRunner,
    client: &'a SshClient,
    steps: Vec<StepResult>,
}

impl<'a> ReleaseExecutor<'a> {
    pub(crate) fn new(
        config: &'a ReleaseConfig,
        runner: &'a dyn CommandRunner,
        client: &'a SshClient,
    ) -> Self {
        Self {
            config,
            runner,
            client,
            steps: Vec::new(),
        }
    }

    pub(crate) fn into_steps(self) -> Vec<StepResult> {
        self.steps
    }

    pub(crate) fn execute(&mut self, script: &RemoteScript, remote_archive: Option<&str>) -> Result<()> {
        self.inspect();
        self.commit()?;
        self.publish()?;

        // Holds the local archive until the run ends.
        let _workspace = match remote_archive {
            Some(remote) => {
                let workspace = tempfile::Builder::new()
                    .prefix("launchpad-")
                    .tempdir()
                    .map_err(|e| {
                        Error::archive_failed(e.to_string(), Some("create temp directory".to_string()))
                    })?;
                let local = self.package(workspace.path())?;
                self.transfer(&local, remote)?;
                Some(workspace)
            }
            None => None,
        };

        self.remote(script)
    }

    fn record<T>(
        &mut self,
        stage: Stage,
        label: &str,
        result: Result<T>,
        describe: impl FnOnce(&T) -> String,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                self.steps
                    .push(StepResult::success(stage, label, describe(&value)));
                Ok(value)
            }
            Err(err) => {
                self.steps.push(StepResult::failed(
                    stage,
                    label,
                    reported_exit_code(&err),
                    failure_output(&err),
                ));
                Err(err)
            }
        }
    }

    fn inspect(&mut self) {
        let root = &self.config.project_root;
        log_status!("status", "Local changes in {}", root.display());

        let step = match git::status(self.runner, root, self.config.timeouts.local_secs) {
            Ok(output) if output.success => {
                let changes = output.stdout.trim_end();
                if changes.is_empty() {
                    log_status!("status", "Working tree clean");
                }
                for line in changes.lines() {
                    log_status!("status", "{}", line);
                }
                StepResult::success(Stage::Inspect, labels::INSPECT, changes)
            }
            Ok(output) => {
                StepResult::failed(Stage::Inspect, labels::INSPECT, Some(output.exit_code), output.error_text())
                    .with_warning("could not inspect local changes; continuing")
            }
            Err(err) => StepResult::failed(Stage::Inspect, labels::INSPECT, None, err.message.clone())
                .with_warning("could not inspect local changes; continuing"),
        };

        if !step.warnings.is_empty() {
            log_status!("status", "Warning: git status failed, continuing");
        }
        self.steps.push(step);
    }

    fn commit(&mut self) -> Result<()> {
        let root = self.config.project_root.clone();
        let timeout = self.config.timeouts.local_secs;

        let staged = git::stage_all(self.runner, &root, timeout);
        self.record(Stage::Commit, labels::STAGE, staged, |o| o.combined())?;

        log_status!("commit", "Committing: {}", self.config.commit_message);
        match git::commit(self.runner, &root, &self.config.commit_message, timeout) {
            Ok(CommitOutcome::Committed(output)) => {
                self.steps
                    .push(StepResult::success(Stage::Commit, labels::COMMIT, output.combined()));
                Ok(())
            }
            Ok(CommitOutcome::NothingToCommit(_)) => {
                log_status!("commit", "Nothing to commit, pushing existing history");
                self.steps.push(StepResult::skipped(
                    Stage::Commit,
                    labels::COMMIT,
                    "nothing to commit; existing history is pushed",
                ));
                Ok(())
            }
            Err(err) => self.record(Stage::Commit, labels::COMMIT, Err(err), |_: &()| String::new()),
        }
    }

    fn publish(&mut self) -> Result<()> {
        log_status!("push", "Pushing to the shared remote");
        let pushed = git::push(
            self.runner,
            &self.config.project_root,
            self.config.git_remote.as_deref(),
            self.config.git_branch.as_deref(),
            self.config.timeouts.local_secs,
        );
        self.record(Stage::Publish, labels::PUSH, pushed, |o| o.combined())?;
        Ok(())
    }

    fn package(&mut self, workspace: &Path) -> Result<PathBuf> {
        let dest = workspace.join(archive_file_name(self.config));
        log_status!("package", "Archiving {}", self.config.project_root.display());

        let exclusions = Exclusions::new(&self.config.excludes);
        let built = archive::build_archive(&self.config.project_root, &dest, &exclusions);
        let summary = self.record(Stage::Package, labels::PACKAGE, built, |s| {
            format!("{} entries, {} bytes", s.entries, s.bytes)
        })?;
        Ok(summary.path)
    }

    fn transfer(&mut self, local: &Path, remote: &str) -> Result<()> {
        log_status!("transfer", "Uploading to {}:{}", self.client.destination(), remote);
        let uploaded = self
            .client
            .upload(self.runner, local, remote, self.config.timeouts.transfer_secs);
        self.record(Stage::Transfer, labels::UPLOAD, uploaded, |o| o.combined())?;
        Ok(())
    }

    fn remote(&mut self, script: &RemoteScript) -> Result<()> {
        let policy = self.config.on_remote_failure;
        let host = self.client.destination();
        log_status!("remote", "Running {} step(s) on {}", script.ops.len(), host);

        let session = self.client.run_script(
            self.runner,
            &script.render(policy),
            self.config.timeouts.remote_secs,
        );
        let output = match session {
            Ok(output) => output,
            Err(err) => {
                self.steps.push(StepResult::failed(
                    Stage::Remote,
                    labels::CONNECT,
                    None,
                    err.message.clone(),
                ));
                return Err(err);
            }
        };
        if !output.stderr.trim().is_empty() {
            log::debug!("remote stderr: {}", output.stderr.trim());
        }

        let report = script.parse_report(&output.stdout);

        // No marker at all: the shell never started, so nothing on the host changed.
        if !report.any_reached() && !output.success {
            self.steps.push(StepResult::failed(
                Stage::Remote,
                labels::CONNECT,
                Some(output.exit_code),
                output.error_text(),
            ));
            return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                host,
                step: labels::CONNECT.to_string(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            })
            .with_hint("Check that the host is reachable and key-based ssh login works"));
        }

        let mut fatal: Option<Error> = None;
        for (op, result) in script.ops.iter().zip(&report.ops) {
            if !result.reached {
                self.steps.push(StepResult::skipped(
                    Stage::Remote,
                    &op.label,
                    "not reached",
                ));
                continue;
            }
            if result.succeeded() {
                self.steps
                    .push(StepResult::success(Stage::Remote, &op.label, &result.output));
                continue;
            }

            let step = StepResult::failed(Stage::Remote, &op.label, result.exit_code, &result.output);
            if fatal.is_none() && RemoteScript::stops_on_failure(op, policy) {
                log_status!("remote", "{} failed (exit {})", op.label, display_code(result.exit_code));
                fatal = Some(Error::remote_command_failed(RemoteCommandFailedDetails {
                    host: host.clone(),
                    step: op.label.clone(),
                    exit_code: result.exit_code.unwrap_or(-1),
                    stdout: result.output.clone(),
                    stderr: output.stderr.clone(),
                }));
                self.steps.push(step);
            } else {
                log_status!(
                    "remote",
                    "Warning: {} failed (exit {}), continuing",
                    op.label,
                    display_code(result.exit_code)
                );
                self.steps.push(step.with_warning(downgrade_reason(op)));
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn downgrade_reason(op: &RemoteOp) -> &'static str {
    match op.severity {
        Severity::Advisory => "advisory step failed",
        Severity::Fatal => "failure downgraded by on_remote_failure=warn",
    }
}

fn display_code(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn reported_exit_code(err: &Error) -> Option<i32> {
    err.details
        .get("exitCode")
        .and_then(|v| v.as_i64())
        .map(|c| c as i32)
}

/// Captured tool output when the error carries it, else the message.
fn failure_output(err: &Error) -> String {
    let field = |key: &str| {
        err.details
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    };
    let captured: Vec<String> = [field("stdout"), field("stderr")]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    if captured.is_empty() {
        match err.details.get("error").and_then(|v| v.as_str()) {
            Some(detail) => format!("{}: {}", err.message, detail),
            None => err.message.clone(),
        }
    } else {
        captured.join("\n")
    }
}
