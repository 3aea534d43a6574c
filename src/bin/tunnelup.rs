//! Tunnel launcher entrypoint: opens one public tunnel to the local web
//! terminal and stays resident until SIGINT/SIGTERM, then closes it once
//! and exits. No retries: a dead tunnel client ends the process.

use anyhow::{bail, Result};
use clap::Parser;
use std::panic;
use std::thread;
use std::time::Duration;
use termgate::logging::LogSettings;
use termgate::tunnel::{self, signal, TunnelConfig, TunnelSession};
use termgate::{init_logging, log_debug, log_debug_content, log_panic};

/// How often the resident loop wakes to drain client logs and poll for
/// shutdown.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(
    about = "Expose the local web terminal through an ngrok tunnel",
    author,
    version
)]
struct LauncherConfig {
    /// Local port to expose
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// ngrok authtoken; checked before any subprocess is spawned
    #[arg(long, env = "NGROK_AUTHTOKEN", default_value = "", hide_env_values = true)]
    authtoken: String,

    /// Reserved public domain to bind instead of a random hostname
    #[arg(long)]
    domain: Option<String>,

    /// Tunnel client binary (name or path)
    #[arg(long = "client-cmd", default_value = "ngrok")]
    client_cmd: String,

    /// Enable debug logging to the log file
    #[arg(long = "logs", env = "TERMGATE_LOGS", default_value_t = false)]
    logs: bool,

    /// Disable all file logging
    #[arg(long = "no-logs", env = "TERMGATE_NO_LOGS", default_value_t = false)]
    no_logs: bool,

    /// Log tunnel client output verbatim (may include request metadata)
    #[arg(long = "log-content", env = "TERMGATE_LOG_CONTENT", default_value_t = false)]
    log_content: bool,

    /// Enable verbose timing logs
    #[arg(long = "log-timings", default_value_t = false)]
    log_timings: bool,
}

impl LauncherConfig {
    fn log_settings(&self) -> LogSettings {
        LogSettings {
            logs: self.logs,
            no_logs: self.no_logs,
            log_content: self.log_content,
            log_timings: self.log_timings,
        }
    }
}

fn main() -> Result<()> {
    let config = LauncherConfig::parse();
    init_logging(&config.log_settings());
    panic::set_hook(Box::new(|info| log_panic(info)));
    log_debug("=== Termgate tunnel launcher started ===");

    // Credential gate: a missing or placeholder token fails here, before
    // any network activity or subprocess.
    let authtoken = tunnel::validate_authtoken(&config.authtoken)?;

    signal::install_shutdown_handler()?;

    let tunnel_config = TunnelConfig {
        client_cmd: config.client_cmd.clone(),
        port: config.port,
        authtoken,
        domain: config.domain.clone(),
    };
    let mut session = TunnelSession::open(&tunnel_config)?;
    println!("{}", session.public_url);
    eprintln!("Press Ctrl-C to close the tunnel and exit.");

    loop {
        for line in session.drain_lines() {
            log_debug_content(&format!("ngrok: {line}"));
        }
        if let Some(status) = session.poll_exit() {
            bail!("tunnel client exited unexpectedly ({status})");
        }
        if signal::shutdown_requested() {
            break;
        }
        thread::sleep(TICK_INTERVAL);
    }

    log_debug("shutdown signal received; closing tunnel");
    session.close();
    log_debug("=== Termgate tunnel launcher exiting ===");
    Ok(())
}
