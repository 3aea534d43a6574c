//! Shared defaults and limits for CLI validation.

/// Command used to start the web terminal server when none is given.
pub(super) const DEFAULT_SERVER_CMD: &str = "npm start";

/// Settings file name resolved relative to the app directory.
pub(super) const DEFAULT_SETTINGS_FILE: &str = ".env";

/// Upper bound on `--server-cmd` length. Anything longer is almost
/// certainly a paste accident and would bloat the generated runner.
pub(super) const MAX_SERVER_CMD_BYTES: usize = 512;
