use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use dirs::config_dir;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::providers::{
    ConfiguredProvider, EnvSecretProvider, KeyringSecretProvider, SecretEncoding,
};

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "SECRETBOX_CONFIG";

const DEFAULT_KEYRING_SERVICE: &str = "secretbox";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config dir available")]
    NoConfigDir,
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Which secret store the process-wide key is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Env,
    Keyring,
}

/// Configuration loaded from `~/.config/secretbox/config.toml` (platform-specific).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SecretBoxConfig {
    /// Secret store backend.
    pub provider: ProviderKind,
    /// How the stored secret string is turned into key bytes.
    pub encoding: SecretEncoding,
    /// Keyring settings, used when `provider = "keyring"`.
    pub keyring: Option<KeyringConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyringConfig {
    pub service: Option<String>,
}

impl SecretBoxConfig {
    /// Load config from `SECRETBOX_CONFIG` or the default path; if missing, return defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => default_path()?,
        };
        Self::load_from_path(path)
    }

    /// Load config from a given path; if missing or empty, return defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the provider this configuration selects.
    pub fn provider(&self) -> ConfiguredProvider {
        match self.provider {
            ProviderKind::Env => ConfiguredProvider::Env(EnvSecretProvider::new(self.encoding)),
            ProviderKind::Keyring => {
                let service = self
                    .keyring
                    .as_ref()
                    .and_then(|k| k.service.clone())
                    .unwrap_or_else(|| DEFAULT_KEYRING_SERVICE.to_string());
                ConfiguredProvider::Keyring(KeyringSecretProvider::new(service, self.encoding))
            }
        }
    }
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf, ConfigError> {
    let base = config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("secretbox").join("config.toml"))
}
