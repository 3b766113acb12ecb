//! Path utilities for configuration directories.

use std::path::{Path, PathBuf};

/// Get the parley home directory.
///
/// Uses `PARLEY_HOME` if set, otherwise `~/.parley`.
pub fn parley_home() -> PathBuf {
    std::env::var_os("PARLEY_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".parley")
        })
}

/// Configuration file name inside a config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment file name inside a config directory.
pub const ENV_FILE_NAME: &str = ".env";

/// Local config directory name.
pub const LOCAL_CONFIG_DIR: &str = ".parley";

/// Get the local configuration file for a given working directory.
#[must_use]
pub fn local_config_file(workdir: &Path) -> PathBuf {
    workdir.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
}
