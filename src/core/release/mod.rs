mod executor;
mod pipeline;
mod types;

pub use pipeline::{archive_file_name, plan, remote_archive_path, run};
pub use types::{ReleaseFailure, ReleasePlan, ReleasePlanStep, ReleaseRun};
