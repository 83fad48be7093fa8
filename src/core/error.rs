use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    GitCommandFailed,
    GitPushFailed,

    ArchiveFailed,
    TransferFailed,

    RemoteCommandFailed,
    CommandTimeout,

    ReleaseLocked,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::GitCommandFailed => "git.command_failed",
            ErrorCode::GitPushFailed => "git.push_failed",

            ErrorCode::ArchiveFailed => "archive.failed",
            ErrorCode::TransferFailed => "transfer.failed",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",
            ErrorCode::CommandTimeout => "command.timeout",

            ErrorCode::ReleaseLocked => "release.locked",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Captured failure of an external tool, attached to git, transfer and remote errors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub host: String,
    pub step: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandTimeoutDetails {
    pub command: String,
    pub timeout_secs: u64,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
        });
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let details = to_details(ConfigInvalidJsonDetails {
            path: path.into(),
            error: err.to_string(),
        });
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let details = to_details(ConfigInvalidValueDetails {
            key: key.into(),
            value,
            problem: problem.into(),
        });
        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn git_command_failed(details: CommandFailedDetails) -> Self {
        let message = format!("{} failed with exit code {}", details.command, details.exit_code);
        Self::new(ErrorCode::GitCommandFailed, message, to_details(details))
    }

    pub fn git_push_failed(details: CommandFailedDetails) -> Self {
        Self::new(
            ErrorCode::GitPushFailed,
            "Push to the shared remote was rejected or could not connect",
            to_details(details),
        )
        .with_hint("Pull and rebase, or check network access to the git remote, then re-run")
    }

    pub fn archive_failed(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalErrorDetails {
            error: error.into(),
            context,
        });
        Self::new(ErrorCode::ArchiveFailed, "Failed to package project", details)
    }

    pub fn transfer_failed(details: CommandFailedDetails) -> Self {
        Self::new(
            ErrorCode::TransferFailed,
            "Failed to copy archive to remote host",
            to_details(details),
        )
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        let message = format!("Remote step '{}' failed on {}", details.step, details.host);
        Self::new(ErrorCode::RemoteCommandFailed, message, to_details(details))
    }

    pub fn command_timeout(command: impl Into<String>, timeout_secs: u64) -> Self {
        let command = command.into();
        let message = format!("'{}' did not finish within {}s", command, timeout_secs);
        Self::new(
            ErrorCode::CommandTimeout,
            message,
            to_details(CommandTimeoutDetails {
                command,
                timeout_secs,
            }),
        )
        .with_hint("Raise the limit under defaults.timeouts in launchpad.json (0 disables it)")
    }

    pub fn release_locked(service: impl Into<String>, lock_path: impl Into<String>) -> Self {
        let service = service.into();
        Self::new(
            ErrorCode::ReleaseLocked,
            format!("Another release of '{}' is already running", service),
            serde_json::json!({ "service": service, "lockPath": lock_path.into() }),
        )
        .with_hint("Wait for the other run to finish, or pass --no-lock if it is stale")
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalErrorDetails {
            error: error.into(),
            context,
        });
        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalErrorDetails {
            error: error.into(),
            context,
        });
        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
