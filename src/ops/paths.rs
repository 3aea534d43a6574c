//! Filesystem locations for the runner script, its log, and the autostart
//! entry.

use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

/// Name of the generated runner script.
pub const RUNNER_NAME: &str = "termgate-runner.sh";

/// Name of the login autostart entry.
pub const DESKTOP_ENTRY_NAME: &str = "termgate.desktop";

/// Runner output log, kept next to the runner script.
pub const RUNNER_LOG_NAME: &str = "termgate-runner.log";

/// Directory holding the runner script and its log.
///
/// `TERMGATE_STATE_DIR` overrides the default so tests can isolate state.
pub fn state_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("TERMGATE_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("termgate"))
        .ok_or_else(|| anyhow!("could not resolve a local data directory"))
}

pub fn runner_path() -> Result<PathBuf> {
    Ok(state_dir()?.join(RUNNER_NAME))
}

pub fn runner_log_path() -> Result<PathBuf> {
    Ok(state_dir()?.join(RUNNER_LOG_NAME))
}

/// XDG autostart directory; `TERMGATE_AUTOSTART_DIR` overrides it.
pub fn autostart_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("TERMGATE_AUTOSTART_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|dir| dir.join("autostart"))
        .ok_or_else(|| anyhow!("could not resolve the user config directory"))
}

pub fn desktop_entry_path() -> Result<PathBuf> {
    Ok(autostart_dir()?.join(DESKTOP_ENTRY_NAME))
}
