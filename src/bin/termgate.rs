//! Auto-start manager entrypoint: installs, removes, or verifies the
//! login-time startup of the local web terminal and its tunnel.

use anyhow::Result;
use termgate::config::AppConfig;
use termgate::{init_logging, log_debug, ops};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config.log_settings());
    log_debug("=== Termgate started ===");
    log_debug(&format!("mode: {}", config.mode()?.label()));

    let result = ops::run(&config);
    if let Err(err) = &result {
        log_debug(&format!("mode failed: {err:#}"));
    }
    log_debug("=== Termgate exiting ===");
    result
}
