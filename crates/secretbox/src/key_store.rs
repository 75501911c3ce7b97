//! [`KeyStore`]: lazily initialized, exactly-once holder of the 256-bit key.

use std::{
    fmt,
    sync::{Mutex, OnceLock},
};

use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use secretbox_core::secret::SecretProvider;
use tracing::{debug, error, info, instrument};

use crate::error::SecretBoxError;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Name the key is looked up under in the secret provider.
pub const AES_KEY_SECRET_NAME: &str = "AES_KEY";

/// 256-bit symmetric key. Debug output is redacted and the bytes are zeroed on drop.
#[derive(Clone)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Build a key from fetched material, rejecting anything that is not [`KEY_LEN`] bytes.
    pub fn from_slice(material: &[u8]) -> Result<Self, SecretBoxError> {
        if material.len() != KEY_LEN {
            return Err(SecretBoxError::InvalidKeyLength(material.len()));
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(material);
        Ok(Self(bytes))
    }

    /// Draw a fresh key from the OS CSPRNG.
    pub fn generate() -> Result<Self, SecretBoxError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| SecretBoxError::Randomness {
                reason: e.to_string(),
            })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Standard base64 encoding, the format [`crate::SecretEncoding::Base64`] reads back.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.0)
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Holds one key, fetched from `P` on first use and immutable afterwards.
///
/// Initialization state is the once-cell itself, so an all-zero key is as
/// valid as any other. Concurrent first callers serialize on `init_guard`;
/// only one of them reaches the provider.
pub struct KeyStore<P: SecretProvider> {
    provider: P,
    key: OnceLock<SecretKey>,
    init_guard: Mutex<()>,
}

impl<P: SecretProvider> KeyStore<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            key: OnceLock::new(),
            init_guard: Mutex::new(()),
        }
    }

    /// Whether a key has been loaded.
    pub fn is_initialized(&self) -> bool {
        self.key.get().is_some()
    }

    /// Return the key, fetching it from the provider if this is the first successful call.
    ///
    /// A failed fetch leaves the store uninitialized; nothing is retried here.
    #[instrument(skip_all, fields(secret = AES_KEY_SECRET_NAME))]
    pub fn ensure_key(&self) -> Result<&SecretKey, SecretBoxError> {
        if let Some(key) = self.key.get() {
            return Ok(key);
        }

        // The guard protects no data, so a poisoned lock is still usable.
        let _guard = self
            .init_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(key) = self.key.get() {
            debug!("key loaded by a concurrent caller");
            return Ok(key);
        }

        let key = self.load().inspect_err(|err| {
            error!(error = %err, "failed to initialize encryption key");
        })?;
        info!("encryption key loaded");
        Ok(self.key.get_or_init(|| key))
    }

    fn load(&self) -> Result<SecretKey, SecretBoxError> {
        let mut material = self.provider.get_secret_value(AES_KEY_SECRET_NAME)?;
        let key = SecretKey::from_slice(&material);
        material.iter_mut().for_each(|b| *b = 0);
        key
    }
}

impl<P: SecretProvider> fmt::Debug for KeyStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
