use super::defaults::{DEFAULT_SETTINGS_FILE, MAX_SERVER_CMD_BYTES};
use super::{AppConfig, OpsMode};
use crate::logging::LogSettings;
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::{
    fs,
    path::{Path, PathBuf},
};

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize paths.
    pub fn validate(&mut self) -> Result<()> {
        self.mode()?;

        if self.force && !self.install {
            bail!("--force only applies to --install");
        }
        if self.assume_yes && !self.remove {
            bail!("--yes only applies to --remove");
        }
        if self.kill_port && !self.remove {
            bail!("--kill-port only applies to --remove");
        }

        let trimmed = self.server_cmd.trim();
        if trimmed.is_empty() {
            bail!("--server-cmd must not be empty");
        }
        // The command is embedded in the generated runner, so keep argv small.
        if trimmed.len() > MAX_SERVER_CMD_BYTES {
            bail!(
                "--server-cmd is too long ({} bytes, max {MAX_SERVER_CMD_BYTES})",
                trimmed.len()
            );
        }
        let words = shell_words::split(trimmed)
            .with_context(|| format!("failed to parse --server-cmd '{trimmed}'"))?;
        if words.is_empty() {
            bail!("--server-cmd must contain a program name");
        }
        self.server_cmd = trimmed.to_string();

        self.node_cmd = sanitize_binary(&self.node_cmd, "--node-cmd", &["node", "nodejs"])?;
        self.npm_cmd = sanitize_binary(&self.npm_cmd, "--npm-cmd", &["npm"])?;
        self.tailscale_cmd =
            sanitize_binary(&self.tailscale_cmd, "--tailscale-cmd", &["tailscale"])?;
        self.ngrok_cmd = sanitize_binary(&self.ngrok_cmd, "--ngrok-cmd", &["ngrok"])?;

        if let Some(settings_file) = &self.settings_file {
            if settings_file.as_os_str().is_empty() {
                bail!("--config must not be empty");
            }
        }

        // Only installation needs the app dir to exist; verify and remove
        // report on whatever is (or is not) there.
        if self.install {
            self.app_dir = canonicalize_app_dir(&self.app_dir)?;
        }

        Ok(())
    }

    /// The single operation selected on the command line.
    pub fn mode(&self) -> Result<OpsMode> {
        let selected = [self.install, self.remove, self.verify]
            .iter()
            .filter(|flag| **flag)
            .count();
        if selected != 1 {
            bail!("select exactly one of --install, --remove, or --verify");
        }
        if self.install {
            Ok(OpsMode::Install)
        } else if self.remove {
            Ok(OpsMode::Remove)
        } else {
            Ok(OpsMode::Verify)
        }
    }

    /// Resolved settings file path. Defaults to `.env` inside the app dir.
    pub fn settings_path(&self) -> PathBuf {
        self.settings_file
            .clone()
            .unwrap_or_else(|| self.app_dir.join(DEFAULT_SETTINGS_FILE))
    }

    /// First word of `--server-cmd`, used when inspecting running processes.
    pub fn server_program(&self) -> String {
        shell_words::split(&self.server_cmd)
            .ok()
            .and_then(|words| words.into_iter().next())
            .unwrap_or_else(|| self.server_cmd.clone())
    }

    /// Snapshot the CLI-controlled logging switches for `init_logging`.
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            logs: self.logs,
            no_logs: self.no_logs,
            log_content: self.log_content,
            log_timings: self.log_timings,
        }
    }
}

/// Canonicalize the app directory and make sure it is a directory.
pub(super) fn canonicalize_app_dir(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to canonicalize --app-dir '{}'", path.display()))?;
    if !canonical.is_dir() {
        bail!("--app-dir '{}' is not a directory", canonical.display());
    }
    Ok(canonical)
}

/// Allow either a known binary name or an explicit path to an executable.
pub(super) fn sanitize_binary(value: &str, flag: &str, allowlist: &[&str]) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    if let Some(allowed) = allowlist
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(trimmed))
    {
        return Ok((*allowed).to_string());
    }

    let path = Path::new(trimmed);
    if path.is_absolute() || trimmed.contains(std::path::MAIN_SEPARATOR) {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("failed to canonicalize {flag} '{trimmed}'"))?;
        let metadata = fs::metadata(&canonical)
            .with_context(|| format!("failed to inspect {flag} '{}'", canonical.display()))?;
        if !metadata.is_file() {
            bail!("{flag} '{}' is not a file", canonical.display());
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                bail!(
                    "{flag} '{}' exists but is not executable (mode {:o})",
                    canonical.display(),
                    mode
                );
            }
        }
        return canonical
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("{flag} must be valid UTF-8"));
    }

    bail!("{flag} must be one of {allowlist:?} or an existing binary path");
}
