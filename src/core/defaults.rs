use serde::{Deserialize, Serialize};
use std::fs;

use crate::config::{RemoteFailurePolicy, SshMode, Strategy};
use crate::paths;

/// Root configuration structure for launchpad.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LaunchpadConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via launchpad.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,

    #[serde(default = "default_remote_path")]
    pub remote_path: String,

    #[serde(default = "default_service")]
    pub service: String,

    /// Local source tree; the current directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<String>,

    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default)]
    pub on_remote_failure: RemoteFailurePolicy,

    #[serde(default)]
    pub ssh_mode: SshMode,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub scp_flags: Vec<String>,

    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,

    #[serde(default = "default_remote_tmp_dir")]
    pub remote_tmp_dir: String,

    /// Remote and branch for `git push` / remote `git pull`; tracking branch when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,

    #[serde(default = "default_service_status")]
    pub service_status: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            host: default_host(),
            user: default_user(),
            port: default_ssh_port(),
            identity_file: None,
            remote_path: default_remote_path(),
            service: default_service(),
            project_root: None,
            excludes: default_excludes(),
            strategy: Strategy::default(),
            on_remote_failure: RemoteFailurePolicy::default(),
            ssh_mode: SshMode::default(),
            timeouts: TimeoutsConfig::default(),
            scp_flags: Vec::new(),
            artifact_prefix: default_artifact_prefix(),
            remote_tmp_dir: default_remote_tmp_dir(),
            git_remote: None,
            git_branch: None,
            service_status: default_service_status(),
        }
    }
}

/// Per-invocation time budgets in seconds. `0` disables the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_local_timeout")]
    pub local_secs: u64,

    #[serde(default = "default_transfer_timeout")]
    pub transfer_secs: u64,

    #[serde(default = "default_remote_timeout")]
    pub remote_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            local_secs: default_local_timeout(),
            transfer_secs: default_transfer_timeout(),
            remote_secs: default_remote_timeout(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_host() -> String {
    "203.0.113.10".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_remote_path() -> String {
    "/opt/yume".to_string()
}

fn default_service() -> String {
    "yume.service".to_string()
}

fn default_excludes() -> Vec<String> {
    [
        ".git",
        "venv",
        ".venv",
        ".idea",
        ".vscode",
        "__pycache__",
        "node_modules",
        ".mypy_cache",
        ".pytest_cache",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_artifact_prefix() -> String {
    ".launchpad-".to_string()
}

fn default_remote_tmp_dir() -> String {
    "/tmp".to_string()
}

fn default_service_status() -> bool {
    true
}

fn default_local_timeout() -> u64 {
    120
}

fn default_transfer_timeout() -> u64 {
    600
}

fn default_remote_timeout() -> u64 {
    300
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load defaults, merging file config with built-in defaults.
/// If launchpad.json is missing or invalid, returns built-in defaults.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full launchpad.json config, falling back to defaults on any error.
pub fn load_config() -> LaunchpadConfig {
    config_or_builtin(load_config_from_file())
}

fn config_or_builtin(loaded: crate::Result<Option<LaunchpadConfig>>) -> LaunchpadConfig {
    match loaded {
        Ok(Some(config)) => config,
        Ok(None) => LaunchpadConfig::default(),
        Err(err) => {
            log_status!(
                "config",
                "Warning: ignoring launchpad.json ({}), using built-in defaults",
                err.message
            );
            log::warn!("ignoring launchpad.json: {} ({})", err.message, err.details);
            LaunchpadConfig::default()
        }
    }
}

/// Attempt to load config from launchpad.json. `Ok(None)` when the file does not exist.
pub fn load_config_from_file() -> crate::Result<Option<LaunchpadConfig>> {
    let path = paths::launchpad_json()?;

    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    parse_config(&content, &path.display().to_string()).map(Some)
}

pub(crate) fn parse_config(content: &str, origin: &str) -> crate::Result<LaunchpadConfig> {
    serde_json::from_str(content).map_err(|e| crate::Error::config_invalid_json(origin, e))
}

/// Get the path to launchpad.json (for display purposes)
pub fn config_path() -> crate::Result<String> {
    Ok(paths::launchpad_json()?.display().to_string())
}

/// Check if launchpad.json file exists
pub fn config_exists() -> bool {
    paths::launchpad_json()
        .map(|p| p.exists())
        .unwrap_or(false)
}
