//! Removes the runner script, autostart entry, and running pieces.

use crate::config::AppConfig;
use crate::log_debug;
use crate::ops::settings::{Settings, TunnelKind};
use crate::ops::{paths, tunnelctl};
use crate::process::{self, KILL_GRACE};
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub fn run(config: &AppConfig) -> Result<()> {
    let settings = Settings::load(&config.settings_path())?;

    let artifacts = installed_artifacts()?;
    let tunnel_live = tunnel_is_live(config, &settings);
    let port_holders = if config.kill_port {
        process::port_pids(settings.port).unwrap_or_else(|err| {
            log_debug(&format!(
                "remove: could not list port {}: {err:#}",
                settings.port
            ));
            Vec::new()
        })
    } else {
        Vec::new()
    };

    if artifacts.is_empty() && !tunnel_live && port_holders.is_empty() {
        println!("nothing to remove; termgate was not installed");
        return Ok(());
    }

    if !config.assume_yes && !confirm_removal(&artifacts, tunnel_live, &port_holders, &settings)? {
        bail!("removal cancelled");
    }

    for (label, path) in &artifacts {
        remove_file_if_present(label, path)?;
    }

    if tunnel_live {
        stop_tunnel(config, &settings);
    }

    if !port_holders.is_empty() {
        let mut stopped = 0;
        for pid in &port_holders {
            if process::terminate_pid(*pid, KILL_GRACE) {
                stopped += 1;
            }
        }
        println!("stopped {stopped} process(es) on port {}", settings.port);
    }

    println!("remove complete");
    Ok(())
}

/// The install artifacts that are actually on disk right now.
fn installed_artifacts() -> Result<Vec<(&'static str, PathBuf)>> {
    let candidates = [
        ("autostart entry", paths::desktop_entry_path()?),
        ("runner script", paths::runner_path()?),
        ("runner log", paths::runner_log_path()?),
    ];
    Ok(candidates
        .into_iter()
        .filter(|(_, path)| path.exists())
        .collect())
}

fn tunnel_is_live(config: &AppConfig, settings: &Settings) -> bool {
    match settings.tunnel {
        TunnelKind::Funnel => tunnelctl::funnel_active(&config.tailscale_cmd, settings.port)
            .unwrap_or_else(|err| {
                log_debug(&format!("remove: funnel status failed: {err:#}"));
                false
            }),
        TunnelKind::Ngrok => !tunnelctl::ngrok_pids().is_empty(),
    }
}

/// List what is about to go, then ask on stdin; only `y`/`yes` proceeds.
fn confirm_removal(
    artifacts: &[(&str, PathBuf)],
    tunnel_live: bool,
    port_holders: &[u32],
    settings: &Settings,
) -> Result<bool> {
    println!("this will remove:");
    for (label, path) in artifacts {
        println!("  {label} {}", path.display());
    }
    if tunnel_live {
        println!(
            "  the active {} exposure for port {}",
            settings.tunnel, settings.port
        );
    }
    if !port_holders.is_empty() {
        let listed = port_holders
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!("  process(es) {listed} on port {}", settings.port);
    }
    print!("proceed? [y/N] ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn remove_file_if_present(label: &str, path: &Path) -> Result<bool> {
    if !path.exists() {
        log_debug(&format!("remove: {label} absent at {}", path.display()));
        return Ok(false);
    }
    fs::remove_file(path)
        .with_context(|| format!("failed to remove {label} '{}'", path.display()))?;
    println!("removed {label} {}", path.display());
    Ok(true)
}

/// Best-effort tunnel teardown; failures are logged, not fatal.
fn stop_tunnel(config: &AppConfig, settings: &Settings) {
    match settings.tunnel {
        TunnelKind::Funnel => {
            match tunnelctl::funnel_off(&config.tailscale_cmd, settings.https_port, settings.port) {
                Ok(true) => println!("turned the tailscale funnel off"),
                Ok(false) => {}
                Err(err) => {
                    log_debug(&format!("remove: funnel off failed: {err:#}"));
                    println!("could not turn the funnel off; details are in the debug log");
                }
            }
        }
        TunnelKind::Ngrok => {
            let stopped = tunnelctl::stop_ngrok();
            if stopped > 0 {
                println!("stopped {stopped} ngrok process(es)");
            }
        }
    }
}
