//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - External process execution behind a swappable runner
//! - `shell` - Shell quoting

pub mod command;
pub mod shell;
