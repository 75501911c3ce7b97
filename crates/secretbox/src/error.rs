use secretbox_core::secret::SecretError;
use thiserror::Error;

use crate::{config::ConfigError, key_store::KEY_LEN};

/// Errors returned by seal/open and key initialization.
#[derive(Debug, Error)]
pub enum SecretBoxError {
    /// The secret provider could not supply key material.
    #[error("key lookup failed: {0}")]
    Secret(#[from] SecretError),

    /// Key material was fetched but has the wrong length.
    #[error("key is not {KEY_LEN} bytes (got {0})")]
    InvalidKeyLength(usize),

    /// The configuration file could not be located, read or parsed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input to open is shorter than a nonce.
    #[error("malformed ciphertext")]
    MalformedCiphertext,

    /// Tag verification failed. Deliberately does not say why.
    #[error("message authentication failed")]
    Authentication,

    /// The OS random source failed while drawing a nonce or key.
    #[error("secure random source failed: {reason}")]
    Randomness { reason: String },

    /// The AEAD primitive rejected the operation.
    #[error("cipher operation failed")]
    Cipher,
}

/// Coarse classification of [`SecretBoxError`] for callers deciding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Deployment misconfiguration; needs operator intervention.
    Configuration,
    /// Caller passed a blob that cannot be a sealed message.
    MalformedInput,
    /// Tampered data or wrong key.
    Authentication,
    /// Secure randomness unavailable.
    Randomness,
    /// Unexpected primitive failure.
    Cipher,
}

impl ErrorKind {
    /// Whether the error indicates the process cannot seal/open at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::Configuration | ErrorKind::Randomness | ErrorKind::Cipher
        )
    }
}

impl SecretBoxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SecretBoxError::Secret(_)
            | SecretBoxError::InvalidKeyLength(_)
            | SecretBoxError::Config(_) => ErrorKind::Configuration,
            SecretBoxError::MalformedCiphertext => ErrorKind::MalformedInput,
            SecretBoxError::Authentication => ErrorKind::Authentication,
            SecretBoxError::Randomness { .. } => ErrorKind::Randomness,
            SecretBoxError::Cipher => ErrorKind::Cipher,
        }
    }
}
