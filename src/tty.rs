//! Terminal I/O for the CLI: TTY detection and the commit-message prompt.

use std::io::{self, BufRead, IsTerminal, Write};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

/// Ask on stderr, read one line from stdin. EOF yields an empty answer.
pub fn prompt(message: &str) -> launchpad::Result<String> {
    eprint!("{}", message);
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| launchpad::Error::internal_io(e.to_string(), Some("read prompt answer".to_string())))?;

    Ok(line.trim().to_string())
}
