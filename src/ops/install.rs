//! Installs the runner script and the login autostart entry.

use crate::config::AppConfig;
use crate::log_debug;
use crate::ops::runner::{self, RunnerSpec};
use crate::ops::settings::Settings;
use crate::ops::{paths, tools};
use crate::process;
use anyhow::Result;
use std::fs;
use std::path::Path;

pub fn run(config: &AppConfig) -> Result<()> {
    let settings = Settings::load(&config.settings_path())?;
    log_debug(&format!(
        "install: port {} tunnel {} app dir {}",
        settings.port,
        settings.tunnel,
        config.app_dir.display()
    ));

    tools::check_node_toolchain(config)?;
    tools::check_tunnel_tool(config, settings.tunnel)?;

    let runner_path = paths::runner_path()?;
    let desktop_path = paths::desktop_entry_path()?;
    let log_path = paths::runner_log_path()?;

    let script = runner::render_runner_script(&RunnerSpec {
        app_dir: &config.app_dir,
        server_cmd: &config.server_cmd,
        settings: &settings,
        log_path: &log_path,
        tailscale_cmd: &config.tailscale_cmd,
        ngrok_cmd: &config.ngrok_cmd,
    });
    let desktop_entry = runner::render_desktop_entry(&runner_path);

    if !config.force && is_current(&runner_path, &script) && is_current(&desktop_path, &desktop_entry)
    {
        println!("termgate is already installed; nothing to do (use --force to reinstall)");
        println!("  runner : {}", runner_path.display());
        println!("  entry  : {}", desktop_path.display());
        println!("  server : {} (port {})", config.server_cmd, settings.port);
        println!("  tunnel : {}", settings.tunnel);
        return Ok(());
    }

    prepare_app(config)?;

    runner::write_executable(&runner_path, &script)?;
    println!("wrote runner script {}", runner_path.display());
    runner::write_with_parents(&desktop_path, &desktop_entry)?;
    println!("wrote autostart entry {}", desktop_path.display());

    println!();
    println!("install complete:");
    println!("  server : {} (port {})", config.server_cmd, settings.port);
    println!("  tunnel : {}", settings.tunnel);
    println!("  log    : {}", log_path.display());
    println!(
        "the web terminal will come up at your next login; run `sh {}` to start it now",
        runner_path.display()
    );
    Ok(())
}

/// True when `path` already holds exactly `contents`.
fn is_current(path: &Path, contents: &str) -> bool {
    fs::read_to_string(path)
        .map(|existing| existing == contents)
        .unwrap_or(false)
}

/// Run `npm install` and the build once so the runner never has to.
fn prepare_app(config: &AppConfig) -> Result<()> {
    if !config.app_dir.join("package.json").is_file() {
        log_debug("install: no package.json, skipping dependency install");
        return Ok(());
    }
    if config.app_dir.join("node_modules").is_dir() {
        log_debug("install: node_modules present, skipping dependency install");
        return Ok(());
    }
    println!("installing app dependencies with `{} install`", config.npm_cmd);
    process::run_checked(&config.npm_cmd, &["install"], Some(&config.app_dir))?;
    println!("building the app with `{} run build --if-present`", config.npm_cmd);
    process::run_checked(
        &config.npm_cmd,
        &["run", "build", "--if-present"],
        Some(&config.app_dir),
    )?;
    Ok(())
}
