use serde::Serialize;

use crate::config::{RemoteFailurePolicy, Strategy};
use crate::error::{Error, Hint};
use crate::pipeline::{RunStatus, RunSummary, Stage, StepResult};
use crate::remote::Severity;

#[derive(Debug, Clone, Serialize)]
pub struct ReleasePlan {
    pub strategy: Strategy,
    pub destination: String,
    pub service: String,
    pub commit_message: String,
    pub on_remote_failure: RemoteFailurePolicy,
    pub steps: Vec<ReleasePlanStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_archive: Option<String>,
    /// The program sent to the host in one session.
    pub remote_script: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleasePlanStep {
    pub stage: Stage,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl ReleasePlanStep {
    pub(crate) fn local(stage: Stage, label: &str, command: Option<String>) -> Self {
        Self {
            stage,
            label: label.to_string(),
            command,
            severity: None,
        }
    }
}

/// Serializable copy of the error that stopped a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseFailure {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
}

impl From<&Error> for ReleaseFailure {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
            hints: err.hints.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseRun {
    pub strategy: Strategy,
    pub destination: String,
    pub service: String,
    pub commit_message: String,
    pub status: RunStatus,
    pub steps: Vec<StepResult>,
    pub summary: RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ReleaseFailure>,
}

impl ReleaseRun {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn step(&self, stage: Stage, label: &str) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|s| s.stage == stage && s.label == label)
    }
}
