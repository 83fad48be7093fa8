use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base launchpad config directory (~/.config/launchpad/ on unix, %APPDATA%\launchpad on Windows).
///
/// `LAUNCHPAD_CONFIG_DIR` overrides the location.
pub fn launchpad() -> Result<PathBuf> {
    if let Ok(dir) = env::var("LAUNCHPAD_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&dir).to_string()));
        }
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected("APPDATA environment variable not set on Windows")
        })?;
        Ok(PathBuf::from(appdata).join("launchpad"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected("HOME environment variable not set on Unix-like system")
        })?;
        Ok(PathBuf::from(home).join(".config").join("launchpad"))
    }
}

/// Global launchpad.json config file path
pub fn launchpad_json() -> Result<PathBuf> {
    Ok(launchpad()?.join("launchpad.json"))
}

/// Run lock directory
pub fn locks() -> Result<PathBuf> {
    Ok(launchpad()?.join("locks"))
}

/// Run lock file for a service
pub fn lock(service: &str) -> Result<PathBuf> {
    let safe: String = service
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    Ok(locks()?.join(format!("{}.lock", safe)))
}
