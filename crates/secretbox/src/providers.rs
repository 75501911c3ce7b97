//! Concrete secret providers: process environment and OS keyring.

use std::env;

use base64::{engine::general_purpose, Engine as _};
use secretbox_core::secret::{SecretError, SecretProvider};
use serde::Deserialize;
use tracing::debug;

/// How a stored secret string maps to key bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretEncoding {
    /// The value's bytes are the key material as-is.
    Raw,
    /// Standard-alphabet base64 with padding.
    #[default]
    Base64,
}

impl SecretEncoding {
    pub fn decode(&self, name: &str, value: String) -> Result<Vec<u8>, SecretError> {
        match self {
            SecretEncoding::Raw => Ok(value.into_bytes()),
            SecretEncoding::Base64 => general_purpose::STANDARD
                .decode(value.trim())
                .map_err(|e| SecretError::Decode {
                    name: name.to_string(),
                    reason: e.to_string(),
                }),
        }
    }
}

/// Reads secrets from environment variables named after the secret.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    encoding: SecretEncoding,
}

impl EnvSecretProvider {
    pub fn new(encoding: SecretEncoding) -> Self {
        Self { encoding }
    }
}

impl SecretProvider for EnvSecretProvider {
    fn get_secret_value(&self, name: &str) -> Result<Vec<u8>, SecretError> {
        debug!(secret = name, encoding = ?self.encoding, "reading secret from environment");
        match env::var(name) {
            Ok(value) => self.encoding.decode(name, value),
            Err(env::VarError::NotPresent) => Err(SecretError::NotFound {
                name: name.to_string(),
            }),
            Err(env::VarError::NotUnicode(_)) => Err(SecretError::Decode {
                name: name.to_string(),
                reason: "value is not valid unicode".to_string(),
            }),
        }
    }
}

/// OS keyring-backed provider. The secret name is used as the keyring account.
///
/// Unlike a key generator, this never writes: a missing entry is reported as
/// [`SecretError::NotFound`].
#[derive(Debug, Clone)]
pub struct KeyringSecretProvider {
    service: String,
    encoding: SecretEncoding,
}

impl KeyringSecretProvider {
    pub fn new(service: impl Into<String>, encoding: SecretEncoding) -> Self {
        Self {
            service: service.into(),
            encoding,
        }
    }
}

impl SecretProvider for KeyringSecretProvider {
    fn get_secret_value(&self, name: &str) -> Result<Vec<u8>, SecretError> {
        debug!(secret = name, service = %self.service, "reading secret from keyring");
        let entry =
            keyring::Entry::new(&self.service, name).map_err(|e| keyring_error(name, e))?;
        let secret = entry.get_password().map_err(|e| keyring_error(name, e))?;
        self.encoding.decode(name, secret)
    }
}

fn keyring_error(name: &str, err: keyring::Error) -> SecretError {
    match err {
        keyring::Error::NoEntry => SecretError::NotFound {
            name: name.to_string(),
        },
        other => SecretError::Backend {
            reason: format!("keyring: {other}"),
        },
    }
}

/// Provider selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredProvider {
    Env(EnvSecretProvider),
    Keyring(KeyringSecretProvider),
}

impl SecretProvider for ConfiguredProvider {
    fn get_secret_value(&self, name: &str) -> Result<Vec<u8>, SecretError> {
        match self {
            ConfiguredProvider::Env(provider) => provider.get_secret_value(name),
            ConfiguredProvider::Keyring(provider) => provider.get_secret_value(name),
        }
    }
}
