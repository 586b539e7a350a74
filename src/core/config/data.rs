use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::config::io::ConfigError;
use crate::core::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::core::persona::PersonaId;
use crate::core::session::DEFAULT_TEMPERATURE;

/// User settings. Every field is optional; unset fields fall back to the
/// built-in defaults through the accessor methods.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Model id, e.g. "gemini-3-pro-preview"
    pub model: Option<String>,
    /// API root the model endpoints hang off
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    /// Persona used when none is given on the command line
    pub default_persona: Option<PersonaId>,
    /// Directory holding the snippet library
    pub data_dir: Option<PathBuf>,
}

/// Settings addressable through `vibecode set` / `vibecode unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Model,
    BaseUrl,
    Temperature,
    DefaultPersona,
    DataDir,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 5] = [
        ConfigKey::Model,
        ConfigKey::BaseUrl,
        ConfigKey::Temperature,
        ConfigKey::DefaultPersona,
        ConfigKey::DataDir,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Model => "model",
            ConfigKey::BaseUrl => "base-url",
            ConfigKey::Temperature => "temperature",
            ConfigKey::DefaultPersona => "default-persona",
            ConfigKey::DataDir => "data-dir",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/vibecode/config.toml` → `~/.config/vibecode/config.toml`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn default_persona(&self) -> PersonaId {
        self.default_persona.unwrap_or_default()
    }

    /// Snippet library directory, falling back to the platform data dir.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_data_dir(),
        }
    }

    /// Parse and store `value` under `key`.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidValue {
                key,
                value: value.to_string(),
                reason: "value must not be empty".to_string(),
            });
        }

        match key {
            ConfigKey::Model => self.model = Some(value.to_string()),
            ConfigKey::BaseUrl => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(ConfigError::InvalidValue {
                        key,
                        value: value.to_string(),
                        reason: "expected an http(s) URL".to_string(),
                    });
                }
                self.base_url = Some(value.to_string());
            }
            ConfigKey::Temperature => {
                let temperature = value
                    .parse::<f32>()
                    .ok()
                    .filter(|t| (0.0..=2.0).contains(t))
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key,
                        value: value.to_string(),
                        reason: "expected a number between 0.0 and 2.0".to_string(),
                    })?;
                self.temperature = Some(temperature);
            }
            ConfigKey::DefaultPersona => {
                let persona =
                    value
                        .parse::<PersonaId>()
                        .map_err(|err| ConfigError::InvalidValue {
                            key,
                            value: value.to_string(),
                            reason: err.to_string(),
                        })?;
                self.default_persona = Some(persona);
            }
            ConfigKey::DataDir => self.data_dir = Some(PathBuf::from(value)),
        }
        Ok(())
    }

    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::Model => self.model = None,
            ConfigKey::BaseUrl => self.base_url = None,
            ConfigKey::Temperature => self.temperature = None,
            ConfigKey::DefaultPersona => self.default_persona = None,
            ConfigKey::DataDir => self.data_dir = None,
        }
    }
}
