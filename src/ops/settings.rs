//! Key=value settings shared with the managed web terminal server.

use anyhow::{bail, Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;

/// Which tunnel technology fronts the local server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelKind {
    Funnel,
    Ngrok,
}

impl TunnelKind {
    pub fn label(self) -> &'static str {
        match self {
            TunnelKind::Funnel => "funnel",
            TunnelKind::Ngrok => "ngrok",
        }
    }
}

impl fmt::Display for TunnelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Settings loaded from the `.env` style file next to the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Local port the web terminal server listens on.
    pub port: u16,
    pub tunnel: TunnelKind,
    /// Reserved ngrok domain, when one is configured.
    pub domain: Option<String>,
    /// Public HTTPS port used by the funnel.
    pub https_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 3000,
            tunnel: TunnelKind::Funnel,
            domain: None,
            https_port: 443,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults;
    /// malformed values in an existing file are hard errors.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid settings file '{}'", path.display()))
    }

    /// Parse `KEY=value` lines. Unknown keys are ignored so the same file
    /// can carry the server's own variables.
    pub fn parse(text: &str) -> Result<Self> {
        let mut settings = Self::default();
        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                bail!("line {}: expected KEY=value, got '{line}'", index + 1);
            };
            let key = key.trim();
            let value = unquote(value.trim());
            match key {
                "PORT" => {
                    settings.port = parse_port(value)
                        .with_context(|| format!("line {}: invalid PORT '{value}'", index + 1))?;
                }
                "TUNNEL" => {
                    settings.tunnel = match value.to_ascii_lowercase().as_str() {
                        "funnel" => TunnelKind::Funnel,
                        "ngrok" => TunnelKind::Ngrok,
                        other => bail!(
                            "line {}: TUNNEL must be 'funnel' or 'ngrok', got '{other}'",
                            index + 1
                        ),
                    };
                }
                "DOMAIN" => {
                    settings.domain = if value.is_empty() {
                        None
                    } else {
                        Some(value.to_string())
                    };
                }
                "HTTPS_PORT" => {
                    settings.https_port = parse_port(value).with_context(|| {
                        format!("line {}: invalid HTTPS_PORT '{value}'", index + 1)
                    })?;
                }
                _ => {}
            }
        }
        Ok(settings)
    }
}

fn parse_port(value: &str) -> Result<u16> {
    let port: u16 = value.parse().context("not a number in 1..=65535")?;
    if port == 0 {
        bail!("port 0 is not usable");
    }
    Ok(port)
}

/// Strip one level of matching quotes around a value.
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return &value[1..value.len() - 1];
        }
    }
    value
}
