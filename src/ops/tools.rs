//! Preflight checks for the external tools the runner depends on.

use crate::config::AppConfig;
use crate::ops::settings::TunnelKind;
use crate::process;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Slice of `tailscale status --json`; just enough to see the login state.
#[derive(Debug, Deserialize)]
struct TailscaleStatus {
    #[serde(rename = "BackendState", default)]
    backend_state: String,
}

/// True when `binary` resolves on PATH, or is an explicit path that exists.
pub fn binary_available(binary: &str) -> bool {
    if binary.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(binary).exists();
    }
    which::which(binary).is_ok()
}

/// Fail unless the Node.js toolchain is available.
pub fn check_node_toolchain(config: &AppConfig) -> Result<()> {
    if !binary_available(&config.node_cmd) {
        bail!(
            "`{}` was not found; install Node.js from https://nodejs.org or your package manager",
            config.node_cmd
        );
    }
    if !binary_available(&config.npm_cmd) {
        bail!(
            "`{}` was not found; it normally ships with Node.js",
            config.npm_cmd
        );
    }
    Ok(())
}

/// Fail unless the selected tunnel tool is installed and logged in.
pub fn check_tunnel_tool(config: &AppConfig, tunnel: TunnelKind) -> Result<()> {
    match tunnel {
        TunnelKind::Funnel => check_tailscale(&config.tailscale_cmd),
        TunnelKind::Ngrok => check_ngrok(&config.ngrok_cmd),
    }
}

/// Report the tailscale backend state (`Running`, `NeedsLogin`, ...).
pub fn tailscale_backend_state(tailscale_cmd: &str) -> Result<String> {
    let output = process::run_captured(tailscale_cmd, &["status", "--json"], None)?;
    if !output.status.success() {
        bail!(
            "`{tailscale_cmd} status` failed ({}): {}",
            process::describe_status(output.status),
            process::stderr_tail(&output, 3)
        );
    }
    let status: TailscaleStatus = serde_json::from_slice(&output.stdout)
        .context("could not parse `tailscale status --json` output")?;
    Ok(status.backend_state)
}

fn check_tailscale(tailscale_cmd: &str) -> Result<()> {
    if !binary_available(tailscale_cmd) {
        bail!("`{tailscale_cmd}` was not found; install it from https://tailscale.com/download");
    }
    let state = tailscale_backend_state(tailscale_cmd)?;
    if state != "Running" {
        bail!("tailscale backend is '{state}'; run `{tailscale_cmd} up` to log in");
    }
    Ok(())
}

/// Fail unless ngrok is installed and has an authtoken configured.
pub fn check_ngrok(ngrok_cmd: &str) -> Result<()> {
    if !binary_available(ngrok_cmd) {
        bail!("`{ngrok_cmd}` was not found; install it from https://ngrok.com/download");
    }
    let output = process::run_captured(ngrok_cmd, &["config", "check"], None)?;
    if !output.status.success() {
        bail!(
            "`{ngrok_cmd} config check` failed; run `{ngrok_cmd} config add-authtoken <token>`: {}",
            process::stderr_tail(&output, 3)
        );
    }
    Ok(())
}
