use clap::Args;
use serde::Serialize;

use launchpad::config::{MessageSource, ReleaseConfig};
use launchpad::defaults;
use launchpad::release::{self, ReleasePlan};

use super::{process_env, CmdResult, ReleaseArgs};

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub release: ReleaseArgs,
}

#[derive(Serialize)]
pub struct PlanOutput {
    pub command: String,
    #[serde(flatten)]
    pub plan: ReleasePlan,
}

/// Resolve configuration exactly like `deploy`, then describe the run without executing it.
pub fn run(args: PlanArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<PlanOutput> {
    let config = ReleaseConfig::resolve(
        &args.release.overrides(),
        &defaults::load_defaults(),
        &process_env,
        MessageSource::Generated,
        chrono::Local::now().naive_local(),
    )?;

    Ok((
        PlanOutput {
            command: "plan".to_string(),
            plan: release::plan(&config),
        },
        0,
    ))
}
