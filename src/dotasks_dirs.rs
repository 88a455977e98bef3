//! Application directory paths.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data (state, albums, logs) | `~/Library/Application Support/dotasks/` | `~/.local/share/dotasks/` |
//! | Config | `~/Library/Application Support/dotasks/` | `~/.config/dotasks/` |
//!
//! Override with `DOTASKS_DATA_DIR` and `DOTASKS_CONFIG_DIR`.

use std::path::PathBuf;

/// Application data root directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DOTASKS_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("dotasks"))
        .unwrap_or_else(|| PathBuf::from("/tmp/dotasks-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DOTASKS_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("dotasks"))
        .unwrap_or_else(|| PathBuf::from("/tmp/dotasks-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Progress store file (`data_dir()/state.json`).
#[must_use]
pub fn state_file() -> PathBuf {
    data_dir().join("state.json")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Crawled album exports (`data_dir()/albums/`).
#[must_use]
pub fn albums_dir() -> PathBuf {
    data_dir().join("albums")
}
