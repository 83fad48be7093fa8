//! Release configuration: resolved once per run, immutable afterwards.
//!
//! Precedence is CLI override > environment > launchpad.json > built-in default.
//! Environment lookup and the interactive prompt are injected so resolution
//! can be exercised without a terminal or a real process environment.

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::defaults::{Defaults, TimeoutsConfig};
use crate::error::{Error, Result};

/// How the payload reaches the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Remote host runs `git pull` in the deployment path.
    #[default]
    Pull,
    /// Local tree is archived, copied with scp and extracted remotely.
    Push,
}

/// What a failed fatal remote operation does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFailurePolicy {
    /// Abort the run, exit status 1.
    #[default]
    Abort,
    /// Downgrade to a warning; the run ends as partial success.
    Warn,
}

/// How the remote script is handed to ssh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SshMode {
    /// `ssh host 'bash -s'` with the script on stdin.
    #[default]
    Stdin,
    /// Script passed as the final ssh argument.
    Argument,
}

/// Caller-supplied values. `None` falls through to environment, file, then default.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOverrides {
    pub message: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<String>,
    pub remote_path: Option<String>,
    pub service: Option<String>,
    pub project_root: Option<String>,
    /// Replaces the configured exclusion set when non-empty.
    pub excludes: Vec<String>,
    pub strategy: Option<Strategy>,
    pub on_remote_failure: Option<RemoteFailurePolicy>,
    pub ssh_mode: Option<SshMode>,
}

/// Source of the commit message when none was supplied.
pub enum MessageSource<'a> {
    /// Ask the operator; an empty answer falls back to the generated message.
    Prompt(&'a dyn Fn(&str) -> Result<String>),
    /// Never ask; always generate.
    Generated,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseConfig {
    pub commit_message: String,
    pub host: String,
    pub user: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
    pub remote_path: String,
    pub service: String,
    pub project_root: PathBuf,
    pub excludes: Vec<String>,
    pub strategy: Strategy,
    pub on_remote_failure: RemoteFailurePolicy,
    pub ssh_mode: SshMode,
    pub timeouts: TimeoutsConfig,
    pub scp_flags: Vec<String>,
    pub artifact_prefix: String,
    pub remote_tmp_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    pub service_status: bool,
}

impl ReleaseConfig {
    /// Resolve the full configuration. `env` looks up environment variables
    /// (pass `|k| std::env::var(k).ok()` in production).
    pub fn resolve(
        overrides: &ReleaseOverrides,
        defaults: &Defaults,
        env: &dyn Fn(&str) -> Option<String>,
        messages: MessageSource<'_>,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let pick = |over: &Option<String>, key: &str, fallback: &str| -> String {
            over.clone()
                .or_else(|| env(key))
                .unwrap_or_else(|| fallback.to_string())
        };

        let port = match overrides.port {
            Some(p) => p,
            None => match env("LAUNCHPAD_PORT") {
                Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                    Error::config_invalid_value("port", Some(raw.clone()), "not a valid port number")
                })?,
                None => defaults.port,
            },
        };

        let strategy = match overrides.strategy {
            Some(s) => s,
            None => match env("LAUNCHPAD_STRATEGY") {
                Some(raw) => Strategy::from_str(raw.trim(), true).map_err(|_| {
                    Error::config_invalid_value("strategy", Some(raw.clone()), "expected one of: pull, push")
                })?,
                None => defaults.strategy,
            },
        };

        let identity_file = overrides
            .identity_file
            .clone()
            .or_else(|| env("LAUNCHPAD_IDENTITY_FILE"))
            .or_else(|| defaults.identity_file.clone())
            .filter(|p| !p.is_empty())
            .map(|p| shellexpand::tilde(&p).to_string());

        let project_root = match overrides
            .project_root
            .clone()
            .or_else(|| env("LAUNCHPAD_PROJECT_ROOT"))
            .or_else(|| defaults.project_root.clone())
        {
            Some(p) => PathBuf::from(shellexpand::tilde(&p).to_string()),
            None => std::env::current_dir().map_err(|e| {
                Error::internal_io(e.to_string(), Some("resolve current directory".to_string()))
            })?,
        };

        // Globs match paths relative to the project root.
        if let Some(bad) = overrides
            .excludes
            .iter()
            .find(|g| g.trim().is_empty() || g.starts_with('/'))
        {
            return Err(Error::validation_invalid_argument(
                "exclude",
                format!("'{}' must be a non-empty glob relative to the project root", bad),
            ));
        }

        let excludes = if overrides.excludes.is_empty() {
            defaults.excludes.clone()
        } else {
            overrides.excludes.clone()
        };

        let provided = overrides.message.clone().or_else(|| env("LAUNCHPAD_MESSAGE"));
        let commit_message = resolve_commit_message(provided.as_deref(), messages, now)?;

        let config = Self {
            commit_message,
            host: pick(&overrides.host, "LAUNCHPAD_HOST", &defaults.host),
            user: pick(&overrides.user, "LAUNCHPAD_USER", &defaults.user),
            port,
            identity_file,
            remote_path: pick(
                &overrides.remote_path,
                "LAUNCHPAD_REMOTE_PATH",
                &defaults.remote_path,
            ),
            service: pick(&overrides.service, "LAUNCHPAD_SERVICE", &defaults.service),
            project_root,
            excludes,
            strategy,
            on_remote_failure: overrides
                .on_remote_failure
                .unwrap_or(defaults.on_remote_failure),
            ssh_mode: overrides.ssh_mode.unwrap_or(defaults.ssh_mode),
            timeouts: defaults.timeouts,
            scp_flags: defaults.scp_flags.clone(),
            artifact_prefix: defaults.artifact_prefix.clone(),
            remote_tmp_dir: defaults.remote_tmp_dir.clone(),
            git_remote: defaults.git_remote.clone(),
            git_branch: defaults.git_branch.clone(),
            service_status: defaults.service_status,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("host", &self.host),
            ("user", &self.user),
            ("service", &self.service),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config_invalid_value(key, None, "must not be empty"));
            }
        }

        if self.host.starts_with('-') || self.user.starts_with('-') {
            return Err(Error::config_invalid_value(
                "host",
                Some(format!("{}@{}", self.user, self.host)),
                "must not start with '-'",
            ));
        }

        let remote = self.remote_path.trim_end_matches('/');
        if !self.remote_path.starts_with('/') || remote.is_empty() {
            return Err(Error::config_invalid_value(
                "remote_path",
                Some(self.remote_path.clone()),
                "must be an absolute path below /",
            ));
        }

        if !self.project_root.is_dir() {
            return Err(Error::config_invalid_value(
                "project_root",
                Some(self.project_root.display().to_string()),
                "is not a directory",
            ));
        }

        if let Some(identity) = &self.identity_file {
            if !Path::new(identity).exists() {
                return Err(Error::config_invalid_value(
                    "identity_file",
                    Some(identity.clone()),
                    "file not found",
                ));
            }
        }

        Ok(())
    }

    /// `user@host` destination used by ssh and scp.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// The commit message used when none is supplied or the prompt is left empty.
pub fn auto_message(now: NaiveDateTime) -> String {
    format!("auto deploy {}", now.format("%Y-%m-%d %H:%M:%S"))
}

pub fn resolve_commit_message(
    provided: Option<&str>,
    messages: MessageSource<'_>,
    now: NaiveDateTime,
) -> Result<String> {
    if let Some(message) = provided.map(str::trim).filter(|m| !m.is_empty()) {
        return Ok(message.to_string());
    }

    let answer = match messages {
        MessageSource::Prompt(ask) => ask("Commit message (empty for auto): ")?,
        MessageSource::Generated => String::new(),
    };

    let answer = answer.trim();
    if answer.is_empty() {
        Ok(auto_message(now))
    } else {
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::fs;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(9, 26, 53)
            .unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn overrides_for(root: &Path) -> ReleaseOverrides {
        ReleaseOverrides {
            project_root: Some(root.display().to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn generated_message_has_timestamp() {
        let msg = resolve_commit_message(None, MessageSource::Generated, fixed_now()).unwrap();
        assert_eq!(msg, "auto deploy 2026-03-14 09:26:53");

        let stamp = msg.strip_prefix("auto deploy ").unwrap();
        assert!(NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[test]
    fn provided_message_skips_prompt() {
        let ask = |_: &str| -> Result<String> { panic!("prompt should not run") };
        let msg =
            resolve_commit_message(Some("fix typo"), MessageSource::Prompt(&ask), fixed_now())
                .unwrap();
        assert_eq!(msg, "fix typo");
    }

    #[test]
    fn prompt_answer_is_used_and_empty_answer_generates() {
        let ask = |_: &str| -> Result<String> { Ok("  tune greeting  \n".to_string()) };
        let msg = resolve_commit_message(None, MessageSource::Prompt(&ask), fixed_now()).unwrap();
        assert_eq!(msg, "tune greeting");

        let blank = |_: &str| -> Result<String> { Ok(String::new()) };
        let msg = resolve_commit_message(None, MessageSource::Prompt(&blank), fixed_now()).unwrap();
        assert!(msg.starts_with("auto deploy "));
    }

    #[test]
    fn whitespace_message_counts_as_absent() {
        let msg = resolve_commit_message(Some("   "), MessageSource::Generated, fixed_now()).unwrap();
        assert!(msg.starts_with("auto deploy "));
    }

    #[test]
    fn resolve_applies_builtin_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReleaseConfig::resolve(
            &overrides_for(dir.path()),
            &Defaults::default(),
            &no_env,
            MessageSource::Generated,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(config.user, "root");
        assert_eq!(config.remote_path, "/opt/yume");
        assert_eq!(config.service, "yume.service");
        assert_eq!(config.strategy, Strategy::Pull);
        assert_eq!(config.on_remote_failure, RemoteFailurePolicy::Abort);
        assert_eq!(config.destination(), "root@203.0.113.10");
    }

    #[test]
    fn override_beats_env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let vars: HashMap<&str, &str> = [
            ("LAUNCHPAD_HOST", "env-host"),
            ("LAUNCHPAD_SERVICE", "env.service"),
            ("LAUNCHPAD_STRATEGY", "push"),
        ]
        .into_iter()
        .collect();
        let env = |k: &str| vars.get(k).map(|v| v.to_string());

        let defaults = Defaults {
            host: "file-host".to_string(),
            user: "deploy".to_string(),
            ..Defaults::default()
        };
        let overrides = ReleaseOverrides {
            host: Some("cli-host".to_string()),
            ..overrides_for(dir.path())
        };

        let config = ReleaseConfig::resolve(
            &overrides,
            &defaults,
            &env,
            MessageSource::Generated,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(config.host, "cli-host");
        assert_eq!(config.service, "env.service");
        assert_eq!(config.user, "deploy");
        assert_eq!(config.strategy, Strategy::Push);
    }

    #[test]
    fn exclude_override_replaces_set() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = ReleaseOverrides {
            excludes: vec!["dist".to_string()],
            ..overrides_for(dir.path())
        };
        let config = ReleaseConfig::resolve(
            &overrides,
            &Defaults::default(),
            &no_env,
            MessageSource::Generated,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(config.excludes, vec!["dist".to_string()]);
    }

    #[test]
    fn exclude_override_must_be_relative_glob() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["", "/srv/data"] {
            let overrides = ReleaseOverrides {
                excludes: vec![".git".to_string(), bad.to_string()],
                ..overrides_for(dir.path())
            };
            let err = ReleaseConfig::resolve(
                &overrides,
                &Defaults::default(),
                &no_env,
                MessageSource::Generated,
                fixed_now(),
            )
            .unwrap_err();
            assert_eq!(err.code.as_str(), "validation.invalid_argument");
            assert_eq!(err.details["field"], "exclude");
        }
    }

    #[test]
    fn rejects_relative_or_root_remote_path() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["opt/yume", "/", "///"] {
            let overrides = ReleaseOverrides {
                remote_path: Some(bad.to_string()),
                ..overrides_for(dir.path())
            };
            let err = ReleaseConfig::resolve(
                &overrides,
                &Defaults::default(),
                &no_env,
                MessageSource::Generated,
                fixed_now(),
            )
            .unwrap_err();
            assert_eq!(err.code.as_str(), "config.invalid_value", "{}", bad);
        }
    }

    #[test]
    fn rejects_missing_project_root_and_bad_port() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = ReleaseConfig::resolve(
            &overrides_for(&missing),
            &Defaults::default(),
            &no_env,
            MessageSource::Generated,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err.details["key"], "project_root");

        let env = |k: &str| (k == "LAUNCHPAD_PORT").then(|| "ssh".to_string());
        let err = ReleaseConfig::resolve(
            &overrides_for(dir.path()),
            &Defaults::default(),
            &env,
            MessageSource::Generated,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err.details["key"], "port");
    }

    #[test]
    fn identity_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("id_ed25519");
        fs::write(&key, "key").unwrap();

        let ok = ReleaseOverrides {
            identity_file: Some(key.display().to_string()),
            ..overrides_for(dir.path())
        };
        assert!(ReleaseConfig::resolve(
            &ok,
            &Defaults::default(),
            &no_env,
            MessageSource::Generated,
            fixed_now()
        )
        .is_ok());

        let missing = ReleaseOverrides {
            identity_file: Some(dir.path().join("absent").display().to_string()),
            ..overrides_for(dir.path())
        };
        let err = ReleaseConfig::resolve(
            &missing,
            &Defaults::default(),
            &no_env,
            MessageSource::Generated,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err.details["key"], "identity_file");
    }

    #[test]
    fn env_strategy_is_case_insensitive_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let resolve = |raw: &'static str| {
            let env = move |k: &str| (k == "LAUNCHPAD_STRATEGY").then(|| raw.to_string());
            ReleaseConfig::resolve(
                &overrides_for(dir.path()),
                &Defaults::default(),
                &env,
                MessageSource::Generated,
                fixed_now(),
            )
        };

        assert_eq!(resolve(" PUSH ").unwrap().strategy, Strategy::Push);
        let err = resolve("rsync").unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn keyword_enums_expose_cli_names() {
        let names: Vec<_> = Strategy::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["pull", "push"]);
        assert_eq!(
            RemoteFailurePolicy::from_str("warn", true),
            Ok(RemoteFailurePolicy::Warn)
        );
        assert_eq!(SshMode::from_str("argument", true), Ok(SshMode::Argument));
    }
}
