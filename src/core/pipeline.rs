//! Step and run result types shared by the release stages.

use serde::{Deserialize, Serialize};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Inspect,
    Commit,
    Publish,
    Package,
    Transfer,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub stage: Stage,
    pub label: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StepResult {
    pub fn success(stage: Stage, label: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            stage,
            label: label.into(),
            status: StepStatus::Success,
            exit_code: Some(0),
            output: output.into(),
            warnings: Vec::new(),
        }
    }

    pub fn failed(
        stage: Stage,
        label: impl Into<String>,
        exit_code: Option<i32>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            label: label.into(),
            status: StepStatus::Failed,
            exit_code,
            output: output.into(),
            warnings: Vec::new(),
        }
    }

    pub fn skipped(stage: Stage, label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage,
            label: label.into(),
            status: StepStatus::Skipped,
            exit_code: None,
            output: String::new(),
            warnings: vec![reason.into()],
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl RunStatus {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success | RunStatus::PartialSuccess => 0,
            RunStatus::Failed => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

/// Overall status: `Failed` when the run aborted, `PartialSuccess` when it
/// finished with failed advisory steps, otherwise `Success`.
pub fn derive_overall_status(results: &[StepResult], aborted: bool) -> RunStatus {
    if aborted {
        return RunStatus::Failed;
    }
    if results.iter().any(|r| r.status == StepStatus::Failed) {
        return RunStatus::PartialSuccess;
    }
    RunStatus::Success
}

pub fn build_summary(results: &[StepResult], status: &RunStatus) -> RunSummary {
    let count = |wanted: StepStatus| results.iter().filter(|r| r.status == wanted).count();

    let next_actions = match status {
        RunStatus::Failed => vec![
            "Fix the failing step and re-run (committed and pushed work is not repeated)"
                .to_string(),
        ],
        RunStatus::PartialSuccess => vec![
            "Check the service on the remote host; some remote steps reported failures"
                .to_string(),
        ],
        RunStatus::Success => Vec::new(),
    };

    RunSummary {
        total_steps: results.len(),
        succeeded: count(StepStatus::Success),
        failed: count(StepStatus::Failed),
        skipped: count(StepStatus::Skipped),
        next_actions,
    }
}
