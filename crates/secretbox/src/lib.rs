//! Authenticated encryption of byte payloads with AES-256-GCM.
//! The key is fetched lazily from a secret provider, exactly once per key store.

pub mod cipher;
pub mod config;
pub mod error;
pub mod key_store;
pub mod providers;

use std::sync::OnceLock;

use tracing::{debug, error};

pub use cipher::{SecretBox, NONCE_LEN, TAG_LEN};
pub use config::SecretBoxConfig;
pub use error::{ErrorKind, SecretBoxError};
pub use key_store::{KeyStore, SecretKey, AES_KEY_SECRET_NAME, KEY_LEN};
pub use providers::{
    ConfiguredProvider, EnvSecretProvider, KeyringSecretProvider, SecretEncoding,
};
pub use secretbox_core::secret::{InMemorySecretProvider, SecretError, SecretProvider};

static DEFAULT_BOX: OnceLock<SecretBox<ConfiguredProvider>> = OnceLock::new();

/// Process-wide box built from [`SecretBoxConfig::load`] on first use.
fn default_box() -> Result<&'static SecretBox<ConfiguredProvider>, SecretBoxError> {
    if let Some(existing) = DEFAULT_BOX.get() {
        return Ok(existing);
    }

    let config = SecretBoxConfig::load().inspect_err(|err| {
        error!(error = %err, "failed to load secretbox configuration");
    })?;
    debug!(?config, "building process-wide secret box");
    // A racing builder may lose here; its box is dropped before any key fetch.
    Ok(DEFAULT_BOX.get_or_init(|| SecretBox::new(config.provider())))
}

/// Seal `plaintext` with the process-wide key.
///
/// Output takes the form `nonce || ciphertext || tag`.
pub fn seal(plaintext: &[u8]) -> Result<Vec<u8>, SecretBoxError> {
    default_box()?.seal(plaintext)
}

/// Open a message produced by [`seal`] with the process-wide key.
pub fn open(sealed: &[u8]) -> Result<Vec<u8>, SecretBoxError> {
    default_box()?.open(sealed)
}

/// Generate a fresh random 256-bit key, e.g. to provision a secret store.
///
/// Fails rather than falling back to a weaker source if the OS CSPRNG errors.
pub fn generate_key() -> Result<SecretKey, SecretBoxError> {
    SecretKey::generate()
}
