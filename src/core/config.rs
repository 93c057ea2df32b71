use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::api::ProviderKind;
use crate::core::error::ChatError;

/// Environment variable that overrides the configured API credential.
pub const CREDENTIAL_ENV_VAR: &str = "LORZ_API_KEY";

/// Errors that can occur when loading configuration from disk.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse the configuration file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config at {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config at {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from_path(&Self::config_path())
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), Box<dyn StdError>> {
        let parent = config_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());

        if let Some(dir) = parent {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        temp_file.write_all(contents.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file
            .persist(config_path)
            .map_err(|err| -> Box<dyn StdError> { Box::new(err) })?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let proj_dirs =
            ProjectDirs::from("org", "lorz", "lorz").expect("failed to determine config directory");
        proj_dirs.config_dir().join("config.toml")
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider.unwrap_or(ProviderKind::Gemini)
    }

    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider().default_base_url().to_string())
    }

    /// Resolve the API credential, environment first, then the config file.
    ///
    /// Checked before the chat loop starts; a missing credential blocks entry
    /// rather than failing mid-send.
    pub fn credential(&self) -> Result<String, ChatError> {
        let env_value = std::env::var(CREDENTIAL_ENV_VAR).ok();
        self.credential_with_env(env_value)
    }

    fn credential_with_env(&self, env_value: Option<String>) -> Result<String, ChatError> {
        if let Some(key) = env_value.filter(|key| !key.trim().is_empty()) {
            return Ok(key);
        }
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ChatError::Configuration(format!(
                    "no API credential: {CREDENTIAL_ENV_VAR} is unset and api_key is missing \
                     from the config file"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.provider(), ProviderKind::Gemini);
        assert_eq!(config.model(), ProviderKind::Gemini.default_model());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            api_key: Some("secret".to_string()),
            provider: Some(ProviderKind::Textgen),
            model: Some("some/model".to_string()),
            base_url: None,
        };
        config.save_to_path(&path).unwrap();

        let reloaded = Config::load_from_path(&path).unwrap();
        assert_eq!(reloaded.api_key.as_deref(), Some("secret"));
        assert_eq!(reloaded.provider(), ProviderKind::Textgen);
        assert_eq!(reloaded.base_url(), ProviderKind::Textgen.default_base_url());
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = [not toml").unwrap();
        let error = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
        assert!(error.to_string().contains("parse"));
    }

    #[test]
    fn credential_prefers_environment_and_rejects_blank() {
        let config = Config {
            api_key: Some("from-file".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config
                .credential_with_env(Some("from-env".to_string()))
                .unwrap(),
            "from-env"
        );
        assert_eq!(
            config.credential_with_env(Some("  ".to_string())).unwrap(),
            "from-file"
        );

        let empty = Config::default();
        let error = empty.credential_with_env(None).unwrap_err();
        assert!(matches!(error, ChatError::Configuration(_)));
    }
}
