//! Local git operations for the release pipeline: status, stage, commit, push.

use std::path::Path;

use crate::error::{CommandFailedDetails, Error, Result};
use crate::utils::command::{CommandOutput, CommandRunner, Invocation};

/// Phrases git prints when a commit has nothing to record. Matched against
/// untranslated output; see [`git`].
const NOTHING_TO_COMMIT: [&str; 3] = [
    "nothing to commit",
    "no changes added to commit",
    "nothing added to commit",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(CommandOutput),
    /// Working tree had no changes; not an error.
    NothingToCommit(CommandOutput),
}

/// Every git call runs with untranslated messages so output can be classified.
fn git(root: &Path, timeout_secs: u64) -> Invocation {
    Invocation::new("git")
        .env("LC_ALL", "C")
        .env("LANGUAGE", "")
        .current_dir(root)
        .timeout_secs(timeout_secs)
}

fn details(invocation: &Invocation, output: &CommandOutput) -> CommandFailedDetails {
    CommandFailedDetails {
        command: invocation.display(),
        exit_code: output.exit_code,
        stdout: output.stdout.clone(),
        stderr: output.stderr.clone(),
    }
}

/// Short working-tree status. A non-zero exit is returned, not raised; callers treat it as advisory.
pub fn status(runner: &dyn CommandRunner, root: &Path, timeout_secs: u64) -> Result<CommandOutput> {
    runner.run(&git(root, timeout_secs).args(["status", "--short"]))
}

/// Stage every change, including deletions and untracked files.
pub fn stage_all(runner: &dyn CommandRunner, root: &Path, timeout_secs: u64) -> Result<CommandOutput> {
    let invocation = git(root, timeout_secs).args(["add", "-A"]);
    let output = runner.run(&invocation)?;
    if !output.success {
        return Err(Error::git_command_failed(details(&invocation, &output)));
    }
    Ok(output)
}

pub fn commit(
    runner: &dyn CommandRunner,
    root: &Path,
    message: &str,
    timeout_secs: u64,
) -> Result<CommitOutcome> {
    let invocation = git(root, timeout_secs).args(["commit", "-m", message]);
    let output = runner.run(&invocation)?;

    if output.success {
        return Ok(CommitOutcome::Committed(output));
    }
    if is_nothing_to_commit(&output) {
        return Ok(CommitOutcome::NothingToCommit(output));
    }
    Err(Error::git_command_failed(details(&invocation, &output)))
}

/// Push to the shared remote. Any failure is a push failure; the caller aborts the run.
pub fn push(
    runner: &dyn CommandRunner,
    root: &Path,
    remote: Option<&str>,
    branch: Option<&str>,
    timeout_secs: u64,
) -> Result<CommandOutput> {
    let invocation = git(root, timeout_secs).args(push_args(remote, branch));
    let output = runner.run(&invocation)?;
    if !output.success {
        return Err(Error::git_push_failed(details(&invocation, &output)));
    }
    Ok(output)
}

/// Arguments for `git push`; a branch without a remote goes to `origin`.
pub fn push_args(remote: Option<&str>, branch: Option<&str>) -> Vec<String> {
    let mut args = vec!["push".to_string()];
    match (remote, branch) {
        (Some(remote), Some(branch)) => args.extend([remote.to_string(), branch.to_string()]),
        (Some(remote), None) => args.push(remote.to_string()),
        (None, Some(branch)) => args.extend(["origin".to_string(), branch.to_string()]),
        (None, None) => {}
    }
    args
}

fn is_nothing_to_commit(output: &CommandOutput) -> bool {
    let text = format!("{}\n{}", output.stdout, output.stderr).to_lowercase();
    NOTHING_TO_COMMIT.iter().any(|p| text.contains(p))
}
