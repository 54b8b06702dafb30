use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::UserId;
use crate::utils;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api";
const DEFAULT_USER_AGENT: &str = "event-sync/0.1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub user_agent: String,
    /// Identity to sign in as when no identity provider is attached.
    pub user_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            user_id: None,
        }
    }
}

impl ClientConfig {
    /// Defaults, then the config file in the data directory, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::from_file(&utils::config_path())?;
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        serde_json::from_str(&contents).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| ConfigError::Io(err.to_string()))?;
        }
        let contents =
            serde_json::to_string_pretty(self).map_err(|err| ConfigError::Parse(err.to_string()))?;
        fs::write(path, contents).map_err(|err| ConfigError::Io(err.to_string()))
    }

    fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(url) = non_empty("EVENTS_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(agent) = non_empty("EVENTS_USER_AGENT") {
            self.user_agent = agent;
        }
        if let Some(uid) = non_empty("EVENTS_USER_ID") {
            self.user_id = Some(uid);
        }
        self
    }

    pub fn identity(&self) -> Option<UserId> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .map(UserId::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::from_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn saved_config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ClientConfig {
            api_base_url: "https://events.example.com/api".to_string(),
            user_id: Some("user-1".to_string()),
            ..ClientConfig::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(ClientConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api_base_url": "https://events.example.com/api"}"#).unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.api_base_url, "https://events.example.com/api");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("EVENTS_API_BASE_URL", "https://override.example.com/api"),
            ("EVENTS_USER_ID", "  "),
        ]);
        let config = ClientConfig {
            user_id: Some("from-file".to_string()),
            ..ClientConfig::default()
        }
        .with_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "https://override.example.com/api");
        assert_eq!(config.identity(), Some(UserId::from("from-file")));
    }

    #[test]
    fn garbage_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ClientConfig::from_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
