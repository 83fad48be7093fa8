use clap::Args;
use serde::Serialize;

use launchpad::config::{MessageSource, ReleaseConfig};
use launchpad::defaults;
use launchpad::lock::RunLock;
use launchpad::paths;
use launchpad::release::{self, ReleaseRun};
use launchpad::utils::command::SystemRunner;

use super::{process_env, CmdResult, ReleaseArgs};
use crate::tty;

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub release: ReleaseArgs,

    /// Never ask for a commit message; generate one when none is given
    #[arg(long)]
    pub no_prompt: bool,

    /// Skip the per-service run lock
    #[arg(long)]
    pub no_lock: bool,
}

#[derive(Serialize)]
pub struct DeployOutput {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_path: Option<String>,
    #[serde(flatten)]
    pub run: ReleaseRun,
}

pub fn run(args: DeployArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<DeployOutput> {
    let messages = if !args.no_prompt && tty::is_stdin_tty() {
        MessageSource::Prompt(&tty::prompt)
    } else {
        MessageSource::Generated
    };

    let config = ReleaseConfig::resolve(
        &args.release.overrides(),
        &defaults::load_defaults(),
        &process_env,
        messages,
        chrono::Local::now().naive_local(),
    )?;

    // Held until the run finishes.
    let lock = if args.no_lock {
        None
    } else {
        let path = paths::lock(&config.service)?;
        Some(RunLock::acquire(&path, &config.service)?)
    };

    let run = release::run(&config, &SystemRunner);
    let exit_code = run.exit_code();

    Ok((
        DeployOutput {
            command: "deploy.run".to_string(),
            lock_path: lock.as_ref().map(|l| l.path().display().to_string()),
            run,
        },
        exit_code,
    ))
}
