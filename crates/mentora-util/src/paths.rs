//! Default paths for mentora components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$MENTORA_CONFIG`, `$XDG_CONFIG_HOME/mentora/config.toml` or `~/.config/mentora/config.toml`
//! - Data: `$XDG_DATA_HOME/mentora` or `~/.local/share/mentora`, unless the
//!   config or `mentorad --data-dir` (`$MENTORA_DATA_DIR`) names another

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const MENTORA_CONFIG_ENV: &str = "MENTORA_CONFIG";

/// Application subdirectory name
const APP_DIR: &str = "mentora";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Database filename within the data directory
pub const DATABASE_FILENAME: &str = "mentora.db";

/// Get the default configuration file path.
///
/// Order of precedence:
/// 1. `$MENTORA_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/mentora/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/mentora/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(MENTORA_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$XDG_DATA_HOME/mentora` (if XDG_DATA_HOME is set)
/// 2. `~/.local/share/mentora` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_contains_app_name() {
        let path = default_data_dir();
        assert!(path.to_string_lossy().contains("mentora"));
    }

    #[test]
    fn config_path_is_toml() {
        if std::env::var(MENTORA_CONFIG_ENV).is_ok() {
            return;
        }
        let path = default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
