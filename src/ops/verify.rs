//! End-to-end verification of an installed configuration.

use crate::config::AppConfig;
use crate::ops::health::{self, HealthStatus};
use crate::ops::report::{Severity, VerifyReport};
use crate::ops::settings::{Settings, TunnelKind};
use crate::ops::{paths, tools, tunnelctl};
use crate::process;
use anyhow::{bail, Result};
use std::fs;
use std::path::Path;

/// Runner log lines shown at the end of the report.
const LOG_TAIL_LINES: usize = 10;

pub fn run(config: &AppConfig) -> Result<()> {
    let mut report = VerifyReport::new("termgate verify");
    report.push_kv("version", env!("CARGO_PKG_VERSION"));
    report.push_kv("settings", config.settings_path().display());

    let settings = match Settings::load(&config.settings_path()) {
        Ok(settings) => settings,
        Err(err) => {
            report.section("Settings");
            report.check(Severity::Fail, "settings file", format!("{err:#}"));
            report.remedy("fix the settings file or point --config at the right one");
            println!("{}", report.render());
            bail!("verification failed (1 check failed)");
        }
    };
    report.push_kv("port", settings.port);
    report.push_kv("tunnel", settings.tunnel);

    let runner_path = paths::runner_path()?;
    let desktop_path = paths::desktop_entry_path()?;
    let log_path = paths::runner_log_path()?;

    report.section("Tools");
    check_tools(config, &settings, &mut report);

    report.section("Install");
    check_install(&runner_path, &desktop_path, &mut report);

    report.section("Runtime");
    check_runtime(config, &settings, &runner_path, &mut report);

    append_log_tail(&log_path, &mut report);

    println!("{}", report.render());
    if report.failed() {
        bail!("verification failed ({} check(s) failed)", report.fail_count());
    }
    Ok(())
}

fn check_tools(config: &AppConfig, settings: &Settings, report: &mut VerifyReport) {
    for (what, binary, remedy) in [
        (
            "node",
            &config.node_cmd,
            "install Node.js from https://nodejs.org",
        ),
        (
            "npm",
            &config.npm_cmd,
            "npm ships with Node.js; reinstall Node.js",
        ),
    ] {
        if tools::binary_available(binary) {
            report.check(Severity::Ok, what, binary);
        } else {
            report.check(Severity::Fail, what, format!("`{binary}` not found"));
            report.remedy(remedy);
        }
    }

    match settings.tunnel {
        TunnelKind::Funnel => check_tailscale_state(&config.tailscale_cmd, report),
        TunnelKind::Ngrok => check_ngrok_config(&config.ngrok_cmd, report),
    }
}

fn check_tailscale_state(tailscale_cmd: &str, report: &mut VerifyReport) {
    if !tools::binary_available(tailscale_cmd) {
        report.check(
            Severity::Fail,
            "tailscale",
            format!("`{tailscale_cmd}` not found"),
        );
        report.remedy("install it from https://tailscale.com/download");
        return;
    }
    match tools::tailscale_backend_state(tailscale_cmd) {
        Ok(state) if state == "Running" => report.check(Severity::Ok, "tailscale", "backend running"),
        Ok(state) => {
            report.check(Severity::Fail, "tailscale", format!("backend is '{state}'"));
            report.remedy(format!("run `{tailscale_cmd} up` to log in"));
        }
        Err(err) => {
            // The daemon may just be restarting; don't fail the whole run.
            report.check(
                Severity::Warn,
                "tailscale",
                format!("status query failed: {err:#}"),
            );
        }
    }
}

fn check_ngrok_config(ngrok_cmd: &str, report: &mut VerifyReport) {
    if !tools::binary_available(ngrok_cmd) {
        report.check(Severity::Fail, "ngrok", format!("`{ngrok_cmd}` not found"));
        report.remedy("install it from https://ngrok.com/download");
        return;
    }
    match tools::check_ngrok(ngrok_cmd) {
        Ok(()) => report.check(Severity::Ok, "ngrok", "configured"),
        Err(err) => {
            report.check(Severity::Fail, "ngrok", format!("{err:#}"));
            report.remedy(format!("run `{ngrok_cmd} config add-authtoken <token>`"));
        }
    }
}

fn check_install(runner_path: &Path, desktop_path: &Path, report: &mut VerifyReport) {
    if runner_path.is_file() {
        if is_executable(runner_path) {
            report.check(Severity::Ok, "runner script", runner_path.display());
        } else {
            report.check(
                Severity::Fail,
                "runner script",
                format!("{} is not executable", runner_path.display()),
            );
            report.remedy("run `termgate --install --force` to rewrite it");
        }
    } else {
        report.check(
            Severity::Fail,
            "runner script",
            format!("missing at {}", runner_path.display()),
        );
        report.remedy("run `termgate --install`");
    }

    if desktop_path.is_file() {
        report.check(Severity::Ok, "autostart entry", desktop_path.display());
    } else {
        report.check(
            Severity::Fail,
            "autostart entry",
            format!("missing at {}", desktop_path.display()),
        );
        report.remedy("run `termgate --install`");
    }
}

fn check_runtime(
    config: &AppConfig,
    settings: &Settings,
    runner_path: &Path,
    report: &mut VerifyReport,
) {
    // Name matching is a hint; the port listener below is authoritative.
    let server = config.server_program();
    match process::pgrep_pids(&server, true) {
        Ok(pids) if !pids.is_empty() => {
            report.check(
                Severity::Ok,
                "server process",
                format!("`{server}` running as pid(s) {}", join_pids(&pids)),
            );
        }
        Ok(_) => {
            report.check(
                Severity::Warn,
                "server process",
                format!("no `{server}` process found"),
            );
        }
        Err(err) => {
            report.check(
                Severity::Warn,
                "server process",
                format!("could not scan processes: {err:#}"),
            );
        }
    }

    match process::port_pids(settings.port) {
        Ok(pids) if !pids.is_empty() => {
            report.check(
                Severity::Ok,
                "port listener",
                format!("port {} held by pid(s) {}", settings.port, join_pids(&pids)),
            );
        }
        Ok(_) => {
            report.check(
                Severity::Fail,
                "port listener",
                format!("nothing is listening on port {}", settings.port),
            );
            report.remedy(format!(
                "start the server with `sh {}` or log in again",
                runner_path.display()
            ));
        }
        Err(err) => {
            report.check(
                Severity::Warn,
                "port listener",
                format!("could not list listeners: {err:#}"),
            );
        }
    }

    match health::probe_local_server(settings.port) {
        HealthStatus::Responding(status) => report.check(
            Severity::Ok,
            "http health",
            format!("HTTP {status} from 127.0.0.1:{}", settings.port),
        ),
        HealthStatus::Unreachable(detail) => {
            report.check(Severity::Warn, "http health", detail);
            report.remedy("the server may still be starting; retry in a few seconds");
        }
    }

    match settings.tunnel {
        TunnelKind::Funnel => {
            match tunnelctl::funnel_active(&config.tailscale_cmd, settings.port) {
                Ok(true) => report.check(
                    Severity::Ok,
                    "funnel",
                    format!("forwarding to port {}", settings.port),
                ),
                Ok(false) => {
                    report.check(Severity::Warn, "funnel", "no funnel for the configured port");
                    report.remedy(format!(
                        "run `{} funnel --bg --https={} localhost:{}`",
                        config.tailscale_cmd, settings.https_port, settings.port
                    ));
                }
                Err(err) => report.check(
                    Severity::Warn,
                    "funnel",
                    format!("status query failed: {err:#}"),
                ),
            }
        }
        TunnelKind::Ngrok => {
            if tunnelctl::ngrok_pids().is_empty() {
                report.check(Severity::Warn, "ngrok", "no ngrok process is running");
                report.remedy(format!("start it with `sh {}`", runner_path.display()));
            } else {
                match tunnelctl::ngrok_tunnel_urls() {
                    Ok(urls) if !urls.is_empty() => {
                        report.check(Severity::Ok, "ngrok", urls.join(", "))
                    }
                    Ok(_) => report.check(
                        Severity::Warn,
                        "ngrok",
                        "agent is running but reports no tunnels",
                    ),
                    Err(err) => {
                        report.check(Severity::Warn, "ngrok", format!("{err:#}"));
                    }
                }
            }
        }
    }
}

/// Append the last runner log lines, ANSI sequences stripped.
fn append_log_tail(log_path: &Path, report: &mut VerifyReport) {
    report.section("Recent runner log");
    match fs::read(log_path) {
        Ok(bytes) => {
            let clean = strip_ansi_escapes::strip(&bytes);
            let text = String::from_utf8_lossy(&clean);
            let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
            if lines.is_empty() {
                report.push_kv("log", format!("empty at {}", log_path.display()));
                return;
            }
            let start = lines.len().saturating_sub(LOG_TAIL_LINES);
            for line in &lines[start..] {
                report.push_line(format!("  {line}"));
            }
        }
        Err(_) => report.push_kv("log", format!("absent at {}", log_path.display())),
    }
}

fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        return fs::metadata(path)
            .map(|meta| meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn is_executable_tracks_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.sh");
        fs::write(&path, "#!/bin/sh\n").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o644);
        fs::set_permissions(&path, perms.clone()).unwrap();
        assert!(!is_executable(&path));
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        assert!(is_executable(&path));
    }

    #[test]
    fn log_tail_strips_ansi_and_keeps_last_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("runner.log");
        let mut contents = String::new();
        for index in 0..15 {
            contents.push_str(&format!("\x1b[32mline {index}\x1b[0m\n"));
        }
        fs::write(&log_path, contents).unwrap();

        let mut report = VerifyReport::new("unit verify");
        append_log_tail(&log_path, &mut report);
        let rendered = report.render();
        assert!(!rendered.contains('\x1b'));
        assert!(!rendered.contains("line 4"));
        assert!(rendered.contains("line 5"));
        assert!(rendered.contains("line 14"));
    }

    #[test]
    fn log_tail_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = VerifyReport::new("unit verify");
        append_log_tail(&dir.path().join("absent.log"), &mut report);
        assert!(report.render().contains("absent"));
    }
}
