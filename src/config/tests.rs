use super::defaults::MAX_SERVER_CMD_BYTES;
use super::validation::sanitize_binary;
use super::{AppConfig, OpsMode};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use std::{env, fs};

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[test]
fn accepts_valid_defaults_with_verify() {
    let mut cfg = AppConfig::parse_from(["test-app", "--verify"]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.mode().unwrap(), OpsMode::Verify);
}

#[test]
fn rejects_missing_mode_flag() {
    let mut cfg = AppConfig::parse_from(["test-app"]);
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("exactly one"));
}

#[test]
fn rejects_conflicting_mode_flags() {
    let mut cfg = AppConfig::parse_from(["test-app", "--install", "--remove"]);
    assert!(cfg.validate().is_err());
    let mut cfg = AppConfig::parse_from(["test-app", "--install", "--remove", "--verify"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_force_outside_install() {
    let mut cfg = AppConfig::parse_from(["test-app", "--verify", "--force"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_yes_outside_remove() {
    let mut cfg = AppConfig::parse_from(["test-app", "--verify", "--yes"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_kill_port_outside_remove() {
    let mut cfg = AppConfig::parse_from(["test-app", "--install", "--kill-port"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_remove_with_yes_and_kill_port() {
    let mut cfg = AppConfig::parse_from(["test-app", "--remove", "--yes", "--kill-port"]);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.mode().unwrap(), OpsMode::Remove);
}

#[test]
fn rejects_empty_server_cmd() {
    let mut cfg = AppConfig::parse_from(["test-app", "--verify", "--server-cmd", "   "]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_unbalanced_server_cmd_quoting() {
    let mut cfg = AppConfig::parse_from(["test-app", "--verify", "--server-cmd", "npm 'start"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_server_cmd_over_byte_limit() {
    let long_cmd = "a".repeat(MAX_SERVER_CMD_BYTES + 1);
    let mut cfg = AppConfig::parse_from(["test-app", "--verify", "--server-cmd", &long_cmd]);
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_server_cmd_at_byte_limit() {
    let cmd = "a".repeat(MAX_SERVER_CMD_BYTES);
    let mut cfg = AppConfig::parse_from(["test-app", "--verify", "--server-cmd", &cmd]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn server_program_takes_first_word() {
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--verify",
        "--server-cmd",
        "node server.js --port 3000",
    ]);
    cfg.validate().unwrap();
    assert_eq!(cfg.server_program(), "node");
}

#[test]
fn server_program_unquotes_words() {
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--verify",
        "--server-cmd",
        "'/opt/my tools/node' server.js",
    ]);
    cfg.validate().unwrap();
    assert_eq!(cfg.server_program(), "/opt/my tools/node");
}

#[test]
fn settings_path_defaults_to_env_inside_app_dir() {
    let mut cfg = AppConfig::parse_from(["test-app", "--verify", "--app-dir", "/srv/webterm"]);
    cfg.validate().unwrap();
    assert_eq!(cfg.settings_path(), PathBuf::from("/srv/webterm/.env"));
}

#[test]
fn settings_path_prefers_explicit_config() {
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--verify",
        "--app-dir",
        "/srv/webterm",
        "--config",
        "/etc/termgate.env",
    ]);
    cfg.validate().unwrap();
    assert_eq!(cfg.settings_path(), PathBuf::from("/etc/termgate.env"));
}

#[test]
fn rejects_unknown_node_cmd_name() {
    let mut cfg = AppConfig::parse_from(["test-app", "--verify", "--node-cmd", "not-node"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn install_requires_existing_app_dir() {
    let missing = env::temp_dir().join(format!("termgate_missing_{}", unique_suffix()));
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--install",
        "--app-dir",
        missing.to_str().unwrap(),
    ]);
    assert!(cfg.validate().is_err());
}

#[test]
fn install_canonicalizes_app_dir() {
    let app_dir = env::temp_dir().join(format!("termgate_app_{}", unique_suffix()));
    fs::create_dir_all(&app_dir).unwrap();
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--install",
        "--app-dir",
        app_dir.to_str().unwrap(),
    ]);
    cfg.validate().unwrap();
    assert!(cfg.app_dir.is_absolute());
    assert_eq!(cfg.app_dir, app_dir.canonicalize().unwrap());
    let _ = fs::remove_dir(&app_dir);
}

#[test]
fn mode_labels_are_stable() {
    assert_eq!(OpsMode::Install.label(), "install");
    assert_eq!(OpsMode::Remove.label(), "remove");
    assert_eq!(OpsMode::Verify.label(), "verify");
}

#[test]
fn log_settings_mirror_cli_flags() {
    let mut cfg = AppConfig::parse_from(["test-app", "--verify", "--logs", "--log-content"]);
    cfg.validate().unwrap();
    let settings = cfg.log_settings();
    assert!(settings.logs);
    assert!(settings.log_content);
    assert!(!settings.no_logs);
    assert!(settings.enabled());
}

#[test]
fn sanitize_binary_accepts_allowlist_case_insensitive() {
    let sanitized = sanitize_binary("TaIlScAlE", "--tailscale-cmd", &["tailscale"]).unwrap();
    assert_eq!(sanitized, "tailscale");
}

#[test]
fn sanitize_binary_rejects_empty() {
    assert!(sanitize_binary("   ", "--node-cmd", &["node"]).is_err());
}

#[test]
fn sanitize_binary_rejects_missing_relative_path() {
    assert!(sanitize_binary("bin/does-not-exist", "--node-cmd", &["node"]).is_err());
}

#[test]
fn sanitize_binary_rejects_directory_path() {
    let dir_path = env::temp_dir().join(format!("termgate_dir_{}", unique_suffix()));
    fs::create_dir_all(&dir_path).unwrap();
    let result = sanitize_binary(dir_path.to_str().unwrap(), "--node-cmd", &["node"]);
    assert!(result.is_err());
    let _ = fs::remove_dir(&dir_path);
}

#[cfg(unix)]
#[test]
fn node_cmd_path_must_be_executable() {
    use std::os::unix::fs::PermissionsExt;

    let temp_path = env::temp_dir().join(format!("termgate_node_{}", unique_suffix()));
    fs::write(&temp_path, "#!/bin/sh\necho test\n").unwrap();
    let mut perms = fs::metadata(&temp_path).unwrap().permissions();
    perms.set_mode(0o600);
    fs::set_permissions(&temp_path, perms.clone()).unwrap();

    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--verify",
        "--node-cmd",
        temp_path.to_str().unwrap(),
    ]);
    assert!(
        cfg.validate().is_err(),
        "non-executable binary path should be rejected"
    );

    perms.set_mode(0o700);
    fs::set_permissions(&temp_path, perms).unwrap();
    let mut cfg = AppConfig::parse_from([
        "test-app",
        "--verify",
        "--node-cmd",
        temp_path.to_str().unwrap(),
    ]);
    assert!(
        cfg.validate().is_ok(),
        "executable binary path should be accepted"
    );

    let _ = fs::remove_file(&temp_path);
}

#[cfg(unix)]
#[test]
fn sanitize_binary_accepts_executable_path() {
    use std::os::unix::fs::PermissionsExt;

    let temp_path = env::temp_dir().join(format!("termgate_bin_{}", unique_suffix()));
    fs::write(&temp_path, "#!/bin/sh\n").unwrap();
    let mut perms = fs::metadata(&temp_path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&temp_path, perms).unwrap();
    let sanitized = sanitize_binary(temp_path.to_str().unwrap(), "--ngrok-cmd", &["ngrok"]).unwrap();
    assert!(Path::new(&sanitized).is_absolute());
    let _ = fs::remove_file(temp_path);
}
