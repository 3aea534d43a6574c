//! Auto-start installation, removal, and verification for the local
//! web terminal plus its tunnel. Each mode is a one-shot command that
//! prints what it did and exits; nothing here stays resident.

mod health;
mod install;
pub mod paths;
mod remove;
mod report;
mod runner;
pub mod settings;
mod tools;
mod tunnelctl;
mod verify;

use crate::config::{AppConfig, OpsMode};
use anyhow::Result;

/// Dispatch to the selected mode. The config has already been
/// validated, so exactly one mode flag is set.
pub fn run(config: &AppConfig) -> Result<()> {
    match config.mode()? {
        OpsMode::Install => install::run(config),
        OpsMode::Remove => remove::run(config),
        OpsMode::Verify => verify::run(config),
    }
}
