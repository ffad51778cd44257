//! Configuration parsing and validation for mentora
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Package and service catalog
//! - Join window and live room settings
//! - Instructor seeds with rates and availability

mod schema;
mod settings;
mod validation;

pub use schema::*;
pub use settings::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for mentora_util::MentoraError {
    fn from(e: ConfigError) -> Self {
        mentora_util::MentoraError::config(e.to_string())
    }
}

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "Reading configuration");
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Settings> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(Settings::from_raw(raw))
}

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
        config_version = 1

        [join_window]
        join_minutes_before = 15

        [[packages]]
        id = "individual-4"
        name = "باقة فردية"
        price = 800
        sessions = "4 جلسات فردية"

        [[services]]
        id = "assessment"
        name = "تقييم مستوى"
        price = "150.00"
    "#;

    #[test]
    fn parse_minimal_config() {
        let settings = parse_config(SAMPLE).unwrap();
        assert_eq!(settings.catalog.packages.len(), 1);
        assert_eq!(settings.catalog.packages[0].session_count, 4);
        assert_eq!(settings.join_window.join_minutes_before, 15);
        assert_eq!(settings.join_window.expire_minutes_after, 120);
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_catalog() {
        let config = r#"
            config_version = 1

            [[packages]]
            id = "broken"
            name = "Broken"
            price = -5
            sessions = "غير محدد"
        "#;

        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = load_config(file.path()).unwrap();
        assert!(settings.catalog.get_service(&"assessment".into()).is_some());
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }
}
