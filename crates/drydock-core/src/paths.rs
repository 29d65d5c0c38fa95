//! Centralized path utilities

use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = ".drydock";

/// Get the drydock config directory (~/.drydock)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the plugin database path (~/.drydock/plugins.db)
pub fn plugins_db_path() -> PathBuf {
    config_dir().join("plugins.db")
}
