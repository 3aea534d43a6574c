//! Command-line parsing and validation helpers.

mod defaults;
#[cfg(test)]
mod tests;
mod validation;

use clap::Parser;
use std::path::PathBuf;

use defaults::DEFAULT_SERVER_CMD;

/// CLI options for the termgate auto-start manager. Validated values keep
/// downstream subprocesses safe.
#[derive(Debug, Parser, Clone)]
#[command(
    about = "Auto-start manager for a local web terminal and its tunnel",
    author,
    version
)]
pub struct AppConfig {
    /// Install the runner script and login autostart entry
    #[arg(long, default_value_t = false)]
    pub install: bool,

    /// Remove the runner script, its logs, and the autostart entry
    #[arg(long, default_value_t = false)]
    pub remove: bool,

    /// Verify the installed configuration end to end
    #[arg(long, default_value_t = false)]
    pub verify: bool,

    /// Reinstall even when the configuration already exists
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Answer yes to confirmation prompts (non-interactive removal)
    #[arg(long = "yes", default_value_t = false)]
    pub assume_yes: bool,

    /// Also terminate the process bound to the configured port during removal
    #[arg(long = "kill-port", default_value_t = false)]
    pub kill_port: bool,

    /// Directory containing the web terminal application
    #[arg(long = "app-dir", default_value = ".")]
    pub app_dir: PathBuf,

    /// Settings file with PORT/TUNNEL/DOMAIN/HTTPS_PORT entries
    #[arg(long = "config", value_name = "PATH")]
    pub settings_file: Option<PathBuf>,

    /// Command that starts the web terminal server
    #[arg(long = "server-cmd", default_value = DEFAULT_SERVER_CMD)]
    pub server_cmd: String,

    /// Path to the Node.js runtime binary
    #[arg(long = "node-cmd", default_value = "node")]
    pub node_cmd: String,

    /// Path to the npm binary
    #[arg(long = "npm-cmd", default_value = "npm")]
    pub npm_cmd: String,

    /// Path to the tailscale binary
    #[arg(long = "tailscale-cmd", default_value = "tailscale")]
    pub tailscale_cmd: String,

    /// Path to the ngrok binary
    #[arg(long = "ngrok-cmd", default_value = "ngrok")]
    pub ngrok_cmd: String,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "TERMGATE_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "TERMGATE_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging captured command output and log tails
    #[arg(
        long = "log-content",
        env = "TERMGATE_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}

/// The operation selected by the mutually exclusive mode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpsMode {
    Install,
    Remove,
    Verify,
}

impl OpsMode {
    pub fn label(self) -> &'static str {
        match self {
            OpsMode::Install => "install",
            OpsMode::Remove => "remove",
            OpsMode::Verify => "verify",
        }
    }
}
