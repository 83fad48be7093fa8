use clap::Args;

use launchpad::config::{ReleaseOverrides, RemoteFailurePolicy, SshMode, Strategy};

pub type CmdResult<T> = launchpad::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Release parameters shared by `deploy` and `plan`.
///
/// Each flag beats its `LAUNCHPAD_*` environment variable, which beats
/// launchpad.json, which beats the built-in default.
#[derive(Args, Debug, Default)]
pub struct ReleaseArgs {
    /// Commit message (prompted for when omitted and stdin is a terminal)
    #[arg(short, long)]
    pub message: Option<String>,

    /// Remote host
    #[arg(long)]
    pub host: Option<String>,

    /// Remote user
    #[arg(long)]
    pub user: Option<String>,

    /// SSH port
    #[arg(long)]
    pub port: Option<u16>,

    /// Private key passed to ssh and scp with -i
    #[arg(long)]
    pub identity_file: Option<String>,

    /// Deployment directory on the remote host
    #[arg(long)]
    pub remote_path: Option<String>,

    /// systemd unit to restart
    #[arg(long)]
    pub service: Option<String>,

    /// Local project root (defaults to the current directory)
    #[arg(long)]
    pub project_root: Option<String>,

    /// Glob left out of the push archive (repeatable; replaces the configured set)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,

    /// Delivery strategy
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// What a failed remote step does
    #[arg(long, value_enum, value_name = "POLICY")]
    pub on_remote_failure: Option<RemoteFailurePolicy>,

    /// How the remote script reaches ssh
    #[arg(long, value_enum, value_name = "MODE")]
    pub ssh_mode: Option<SshMode>,
}

impl ReleaseArgs {
    pub fn overrides(&self) -> ReleaseOverrides {
        ReleaseOverrides {
            message: self.message.clone(),
            host: self.host.clone(),
            user: self.user.clone(),
            port: self.port,
            identity_file: self.identity_file.clone(),
            remote_path: self.remote_path.clone(),
            service: self.service.clone(),
            project_root: self.project_root.clone(),
            excludes: self.excludes.clone(),
            strategy: self.strategy,
            on_remote_failure: self.on_remote_failure,
            ssh_mode: self.ssh_mode,
        }
    }
}

/// Process environment lookup handed to configuration resolution.
pub(crate) fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

pub mod config;
pub mod deploy;
pub mod plan;

macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (launchpad::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Deploy(args) => dispatch!(args, global, deploy),
        crate::Commands::Plan(args) => dispatch!(args, global, plan),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}
