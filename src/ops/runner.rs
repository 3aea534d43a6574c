//! Generates the runner script and the login autostart entry.

use crate::ops::settings::{Settings, TunnelKind};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Everything the runner script needs baked in.
pub struct RunnerSpec<'a> {
    pub app_dir: &'a Path,
    pub server_cmd: &'a str,
    pub settings: &'a Settings,
    pub log_path: &'a Path,
    pub tailscale_cmd: &'a str,
    pub ngrok_cmd: &'a str,
}

/// Render the POSIX runner script.
///
/// Every step is guarded so running the script twice (or at every login)
/// never stacks a second server or tunnel.
pub fn render_runner_script(spec: &RunnerSpec) -> String {
    let app_dir = shell_words::quote(&spec.app_dir.to_string_lossy()).into_owned();
    let log_file = shell_words::quote(&spec.log_path.to_string_lossy()).into_owned();
    let port = spec.settings.port;
    let server_cmd = spec.server_cmd;

    let mut script = format!(
        "#!/bin/sh
# Generated by termgate --install; rerun with --force to regenerate.

APP_DIR={app_dir}
LOG_FILE={log_file}
PORT={port}

cd \"$APP_DIR\" || exit 1

# Leave an already-running server alone.
if ! lsof -ti:\"$PORT\" >/dev/null 2>&1; then
    nohup {server_cmd} >>\"$LOG_FILE\" 2>&1 &
fi

"
    );

    match spec.settings.tunnel {
        TunnelKind::Funnel => {
            let tailscale = shell_words::quote(spec.tailscale_cmd).into_owned();
            let https_port = spec.settings.https_port;
            script.push_str(&format!(
                "# Publish the port through the tailscale funnel unless it already is.
if ! {tailscale} funnel status 2>/dev/null | grep -q \"127.0.0.1:$PORT\\|localhost:$PORT\"; then
    {tailscale} funnel --bg --https={https_port} localhost:\"$PORT\" >>\"$LOG_FILE\" 2>&1
fi
"
            ));
        }
        TunnelKind::Ngrok => {
            let ngrok = shell_words::quote(spec.ngrok_cmd).into_owned();
            let ngrok_name = shell_words::quote(&binary_name(spec.ngrok_cmd)).into_owned();
            let domain_flag = spec
                .settings
                .domain
                .as_deref()
                .map(|domain| format!(" --domain {}", shell_words::quote(domain)))
                .unwrap_or_default();
            script.push_str(&format!(
                "# Start the ngrok agent unless one is already up.
if ! pgrep -x {ngrok_name} >/dev/null 2>&1; then
    nohup {ngrok} http \"$PORT\" --log stdout --log-format json{domain_flag} >>\"$LOG_FILE\" 2>&1 &
fi
"
            ));
        }
    }

    script
}

/// Render the XDG autostart entry pointing at the runner script.
pub fn render_desktop_entry(runner_path: &Path) -> String {
    let runner = shell_words::quote(&runner_path.to_string_lossy()).into_owned();
    format!(
        "[Desktop Entry]
Type=Application
Name=Termgate Web Terminal
Comment=Start the web terminal and its tunnel at login
Exec=/bin/sh {runner}
Terminal=false
X-GNOME-Autostart-enabled=true
"
    )
}

/// Write `contents` to `path` with the executable bit set.
pub fn write_executable(path: &Path, contents: &str) -> Result<()> {
    write_with_parents(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .with_context(|| format!("failed to inspect '{}'", path.display()))?
            .permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)
            .with_context(|| format!("failed to mark '{}' executable", path.display()))?;
    }
    Ok(())
}

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_with_parents(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write '{}'", path.display()))
}

fn binary_name(cmd: &str) -> String {
    Path::new(cmd)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| cmd.to_string())
}
