// Public modules
pub mod archive;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod lock;
pub mod paths;
pub mod pipeline;
pub mod release;
pub mod remote;
pub mod ssh;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
