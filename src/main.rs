use clap::{Parser, Subcommand};

mod commands;
mod output;
mod tty;

use commands::{config, deploy, plan, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "launchpad")]
#[command(version = VERSION)]
#[command(about = "Commit, push and release a service to a remote host")]
#[command(
    after_help = "A failed remote step aborts the run with exit status 1 unless \
                  --on-remote-failure warn is given, which reports it and exits 0."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Commit and push local changes, deliver them to the host and restart the service
    Deploy(deploy::DeployArgs),
    /// Show the steps and remote script a deploy would run, without running anything
    Plan(plan::PlanArgs),
    /// Inspect launchpad configuration
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    env_logger::init();

    // Usage errors exit 1 like every other failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                std::process::ExitCode::FAILURE
            } else {
                std::process::ExitCode::SUCCESS
            };
        }
    };

    let global = GlobalArgs {};
    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if let Err(err) = output::print_json_result(json_result) {
        eprintln!("{}", err);
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad::config::{RemoteFailurePolicy, Strategy};

    #[test]
    fn deploy_flags_parse_into_overrides() {
        let cli = Cli::try_parse_from([
            "launchpad",
            "deploy",
            "-m",
            "fix typo",
            "--strategy",
            "push",
            "--exclude",
            ".git",
            "--exclude",
            "data/logs",
            "--on-remote-failure",
            "warn",
            "--port",
            "2222",
            "--no-lock",
        ])
        .unwrap();

        let Commands::Deploy(args) = cli.command else {
            panic!("expected deploy");
        };
        assert!(args.no_lock);
        assert!(!args.no_prompt);

        let overrides = args.release.overrides();
        assert_eq!(overrides.message.as_deref(), Some("fix typo"));
        assert_eq!(overrides.strategy, Some(Strategy::Push));
        assert_eq!(overrides.on_remote_failure, Some(RemoteFailurePolicy::Warn));
        assert_eq!(overrides.port, Some(2222));
        assert_eq!(overrides.excludes, vec![".git", "data/logs"]);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["launchpad", "plan", "--strategy", "rsync"]).is_err());
    }

    #[test]
    fn config_subcommands_parse() {
        assert!(Cli::try_parse_from(["launchpad", "config", "show", "--builtin"]).is_ok());
        assert!(Cli::try_parse_from(["launchpad", "config", "path"]).is_ok());
    }

    #[test]
    fn exit_codes_collapse_to_zero_or_one() {
        assert_eq!(exit_code_to_u8(0), 0);
        assert_eq!(exit_code_to_u8(1), 1);
        assert_eq!(exit_code_to_u8(20), 1);
    }
}
