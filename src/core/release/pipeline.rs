use std::path::Path;

use crate::config::{ReleaseConfig, Strategy};
use crate::error::Error;
use crate::git;
use crate::pipeline::{self, Stage, StepResult};
use crate::remote::RemoteScript;
use crate::ssh::SshClient;
use crate::utils::command::CommandRunner;
use crate::utils::shell;

use super::executor::ReleaseExecutor;
use super::types::{ReleaseFailure, ReleasePlan, ReleasePlanStep, ReleaseRun};

pub(crate) mod labels {
    pub const INSPECT: &str = "git status";
    pub const STAGE: &str = "stage changes";
    pub const COMMIT: &str = "commit";
    pub const PUSH: &str = "push";
    pub const PACKAGE: &str = "build archive";
    pub const UPLOAD: &str = "upload archive";
    pub const CONNECT: &str = "connect";
}

/// Archive file name: `<artifact_prefix><service>.tar.gz`.
pub fn archive_file_name(config: &ReleaseConfig) -> String {
    let service: String = config
        .service
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}.tar.gz", config.artifact_prefix, service)
}

/// Where the archive lands on the host before extraction.
pub fn remote_archive_path(config: &ReleaseConfig) -> String {
    format!(
        "{}/{}",
        config.remote_tmp_dir.trim_end_matches('/'),
        archive_file_name(config)
    )
}

fn remote_script(config: &ReleaseConfig) -> (RemoteScript, Option<String>) {
    match config.strategy {
        Strategy::Pull => (RemoteScript::for_pull(config), None),
        Strategy::Push => {
            let remote = remote_archive_path(config);
            (RemoteScript::for_push(config, &remote), Some(remote))
        }
    }
}

/// Plan a release without running anything.
///
/// Steps, in order:
/// 1. `git status --short` (advisory)
/// 2. `git add -A`, `git commit -m <message>`
/// 3. `git push`
/// 4. push strategy only: build the archive, upload it with scp
/// 5. the remote operations, sent as one script
pub fn plan(config: &ReleaseConfig) -> ReleasePlan {
    build_plan(config, &SshClient::from_config(config))
}

fn build_plan(config: &ReleaseConfig, client: &SshClient) -> ReleasePlan {
    let (script, remote_archive) = remote_script(config);
    let push = git::push_args(config.git_remote.as_deref(), config.git_branch.as_deref());

    let mut steps = vec![
        ReleasePlanStep::local(
            Stage::Inspect,
            labels::INSPECT,
            Some("git status --short".to_string()),
        ),
        ReleasePlanStep::local(Stage::Commit, labels::STAGE, Some("git add -A".to_string())),
        ReleasePlanStep::local(
            Stage::Commit,
            labels::COMMIT,
            Some(shell::command_line(
                "git",
                &["commit", "-m", config.commit_message.as_str()],
            )),
        ),
        ReleasePlanStep::local(
            Stage::Publish,
            labels::PUSH,
            Some(shell::command_line("git", &push[..])),
        ),
    ];

    if let Some(remote) = &remote_archive {
        steps.push(ReleasePlanStep::local(Stage::Package, labels::PACKAGE, None));
        let upload = client.upload_invocation(
            Path::new(&archive_file_name(config)),
            remote,
            config.timeouts.transfer_secs,
        );
        steps.push(ReleasePlanStep::local(
            Stage::Transfer,
            labels::UPLOAD,
            Some(upload.display()),
        ));
    }

    steps.extend(script.ops.iter().map(|op| ReleasePlanStep {
        stage: Stage::Remote,
        label: op.label.clone(),
        command: Some(op.command.clone()),
        severity: Some(op.severity),
    }));

    ReleasePlan {
        strategy: config.strategy,
        destination: client.destination(),
        service: config.service.clone(),
        commit_message: config.commit_message.clone(),
        on_remote_failure: config.on_remote_failure,
        steps,
        remote_archive,
        remote_script: script.render(config.on_remote_failure),
    }
}

/// Run the release. What [`plan`] shows is what runs.
///
/// Never returns early with `Err`: a fatal step ends the run and is reported
/// in [`ReleaseRun::failure`], with the steps it prevented marked skipped.
pub fn run(config: &ReleaseConfig, runner: &dyn CommandRunner) -> ReleaseRun {
    let client = SshClient::from_config(config);
    let release_plan = build_plan(config, &client);
    let (script, remote_archive) = remote_script(config);

    let mut executor = ReleaseExecutor::new(config, runner, &client);
    let outcome = executor.execute(&script, remote_archive.as_deref());
    let steps = executor.into_steps();

    finish(config, &release_plan, steps, outcome.err())
}

fn finish(
    config: &ReleaseConfig,
    release_plan: &ReleasePlan,
    mut steps: Vec<StepResult>,
    failure: Option<Error>,
) -> ReleaseRun {
    if failure.is_some() {
        for planned in &release_plan.steps {
            let ran = steps
                .iter()
                .any(|s| s.stage == planned.stage && s.label == planned.label);
            if !ran {
                steps.push(StepResult::skipped(
                    planned.stage,
                    planned.label.clone(),
                    "not run: an earlier step failed",
                ));
            }
        }
    }

    let status = pipeline::derive_overall_status(&steps, failure.is_some());
    let summary = pipeline::build_summary(&steps, &status);

    match &failure {
        Some(err) => {
            log_status!("release", "Failed: {}", err.message);
            if let Some(step) = steps.iter().rev().find(|s| s.status == pipeline::StepStatus::Failed) {
                for line in step.output.lines() {
                    log_status!("release", "  {}", line);
                }
            }
        }
        None => log_status!(
            "release",
            "Released '{}' to {} ({})",
            config.service,
            config.destination(),
            match status {
                pipeline::RunStatus::PartialSuccess => "with warnings",
                _ => "ok",
            }
        ),
    }

    ReleaseRun {
        strategy: config.strategy,
        destination: config.destination(),
        service: config.service.clone(),
        commit_message: config.commit_message.clone(),
        status,
        steps,
        summary,
        failure: failure.as_ref().map(ReleaseFailure::from),
    }
}
