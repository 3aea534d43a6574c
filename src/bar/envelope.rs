//! JSON envelope written by the input bar to the terminal transport.
//!
//! Messages are single-line JSON with a `"type"` tag field for type
//! discrimination, matching what the web terminal reads off its socket.

use anyhow::{Context, Result};
use serde::Serialize;

/// Messages the bar sends over the transport.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum BarMessage {
    /// Terminal input: literal control bytes or a recognized transcript.
    #[serde(rename = "input")]
    Input { data: String },
}

impl BarMessage {
    pub fn input(data: impl Into<String>) -> Self {
        BarMessage::Input { data: data.into() }
    }

    /// Wire form written to the transport.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to encode input message")
    }
}
