//! Configuration parsing and validation for studylog
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Service settings (owner, data directory, timezone policy)
//! - Timer and advice generator settings
//! - A preset subject catalog
//! - Validation with clear error messages

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

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load configuration, falling back to defaults when the file does not exist
pub fn load_config_or_default(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!(path = %path.display(), "No config file, using defaults");
        return Ok(Settings::default());
    }
    load_config(path)
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
    use std::time::Duration;

    #[test]
    fn parse_minimal_config() {
        let settings = parse_config("config_version = 1").unwrap();

        assert_eq!(settings.service.user_id.as_str(), DEFAULT_USER_ID);
        assert_eq!(settings.service.timezone, TimezonePolicy::Local);
        assert_eq!(settings.timer.tick_interval, Duration::from_millis(100));
        assert_eq!(settings.advice.model, "gpt-4o-mini");
        assert_eq!(settings.subjects.len(), default_subjects().len());
    }

    #[test]
    fn parse_full_config() {
        let config = r##"
            config_version = 1

            [service]
            user_id = "alice"
            data_dir = "/tmp/studylog-test"
            timezone = "Asia/Tokyo"

            [timer]
            tick_interval_ms = 250

            [advice]
            model = "gpt-4o"
            temperature = 0.2
            timeout_secs = 5

            [profile]
            grade = "11"
            target_school = "State University"

            [[subjects]]
            id = "math"
            name = "Math"
            color = "#3b82f6"
        "##;

        let settings = parse_config(config).unwrap();
        assert_eq!(settings.service.user_id.as_str(), "alice");
        assert_eq!(
            settings.service.timezone,
            TimezonePolicy::Named(chrono_tz::Asia::Tokyo)
        );
        assert_eq!(
            settings.service.database_path(),
            std::path::PathBuf::from("/tmp/studylog-test/studylog.db")
        );
        assert_eq!(settings.timer.tick_interval, Duration::from_millis(250));
        assert_eq!(settings.advice.timeout, Duration::from_secs(5));
        assert_eq!(settings.advice.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(settings.profile.target_school.as_deref(), Some("State University"));
        assert_eq!(settings.subjects.len(), 1);
        assert_eq!(settings.subjects[0].color, "#3B82F6");
        assert!(settings.get_subject(&"math".into()).is_some());
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_timezone() {
        let config = r#"
            config_version = 1

            [service]
            timezone = "Atlantis/Capital"
        "#;

        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(errors[0], ValidationError::InvalidTimezone(_)));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_config_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings.service.user_id.as_str(), DEFAULT_USER_ID);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "config_version = 1\n[timer]\ntick_interval_ms = 50\n").unwrap();

        let settings = load_config(&path).unwrap();
        assert_eq!(settings.timer.tick_interval, Duration::from_millis(50));
    }
}
