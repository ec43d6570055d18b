//! Application configuration.
//!
//! # Responsibility
//! - Load the backend project configuration and local runtime settings from
//!   a JSON file.
//! - Reject configurations still carrying template placeholders.
//!
//! # Invariants
//! - `validate()` passing means `api_key` and `project_id` are usable.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY";
const PROJECT_ID_PLACEHOLDER: &str = "YOUR_PROJECT_ID";

/// Backend project settings, keyed the way the hosting console exports them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    /// Store file; `None` keeps the store in memory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    MissingField(&'static str),
    PlaceholderValue(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config file: {err}"),
            Self::Parse(err) => write!(f, "invalid config file: {err}"),
            Self::MissingField(field) => write!(f, "config field `{field}` is required"),
            Self::PlaceholderValue(field) => {
                write!(f, "config field `{field}` still holds the template placeholder")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl AppConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads, parses and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_field("backend.apiKey", &self.backend.api_key, API_KEY_PLACEHOLDER)?;
        check_field(
            "backend.projectId",
            &self.backend.project_id,
            PROJECT_ID_PLACEHOLDER,
        )?;
        Ok(())
    }

    pub fn log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .filter(|level| !level.trim().is_empty())
            .unwrap_or(default_log_level())
    }
}

fn check_field(
    field: &'static str,
    value: &str,
    placeholder: &str,
) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingField(field));
    }
    if value == placeholder {
        return Err(ConfigError::PlaceholderValue(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};

    #[test]
    fn parses_console_style_backend_keys() {
        let config = AppConfig::from_json_str(
            r#"{"backend":{"apiKey":"k","projectId":"todo-app","appId":"1:2:web"}}"#,
        )
        .expect("config should parse");
        assert_eq!(config.backend.api_key, "k");
        assert_eq!(config.backend.project_id, "todo-app");
        assert!(config.database_path.is_none());
        config.validate().expect("config should be valid");
    }

    #[test]
    fn rejects_template_placeholders() {
        let config = AppConfig::from_json_str(
            r#"{"backend":{"apiKey":"YOUR_API_KEY","projectId":"p"}}"#,
        )
        .expect("config should parse");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PlaceholderValue("backend.apiKey"))
        ));
    }

    #[test]
    fn rejects_blank_project_id() {
        let config = AppConfig::from_json_str(r#"{"backend":{"apiKey":"k"}}"#)
            .expect("config should parse");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("backend.projectId"))
        ));
    }
}
