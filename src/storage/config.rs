use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "chronos.toml";
pub const DEFAULT_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Cannot determine the directory of the running executable")]
    NoExecutableDir,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_secret: PathBuf,
    pub token_cache: PathBuf,
    pub calendar_api: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_secret: PathBuf::from("credentials.json"),
            token_cache: PathBuf::from("token.json"),
            calendar_api: DEFAULT_CALENDAR_API.to_string(),
        }
    }
}

impl Config {
    pub fn new(client_secret: impl Into<PathBuf>, token_cache: impl Into<PathBuf>) -> Self {
        Self {
            google: GoogleConfig {
                client_secret: client_secret.into(),
                token_cache: token_cache.into(),
                calendar_api: DEFAULT_CALENDAR_API.to_string(),
            },
        }
    }

    pub fn with_calendar_api(mut self, calendar_api: impl Into<String>) -> Self {
        self.google.calendar_api = calendar_api.into();
        self
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    /// Reads `chronos.toml` from `dir` when present, falling back to the
    /// defaults. Relative paths are anchored at `dir`.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        let config = if config_path.exists() {
            tracing::info!("Loading config from {}", config_path.display());
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        Ok(config.anchored_at(dir))
    }

    pub fn beside_executable() -> Result<Self, ConfigError> {
        let exe = std::env::current_exe()?.canonicalize()?;
        let dir = exe.parent().ok_or(ConfigError::NoExecutableDir)?;
        Self::load_from_dir(dir)
    }

    fn anchored_at(mut self, dir: &Path) -> Self {
        self.google.client_secret = dir.join(&self.google.client_secret);
        self.google.token_cache = dir.join(&self.google.token_cache);
        self
    }
}
