use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use thiserror::Error;
use tracing::debug;

/// Errors produced by secret provider implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    /// No secret is stored under the requested name.
    #[error("secret not found: {name}")]
    NotFound { name: String },
    /// The secret exists but its value could not be decoded into bytes.
    #[error("secret {name} could not be decoded: {reason}")]
    Decode { name: String, reason: String },
    /// Underlying secret store failure.
    #[error("secret store failure: {reason}")]
    Backend { reason: String },
}

/// Looks up raw secret material by name (environment, OS keyring, or memory in tests).
///
/// Implementations return the decoded bytes; length validation is left to the caller.
pub trait SecretProvider: Send + Sync {
    fn get_secret_value(&self, name: &str) -> Result<Vec<u8>, SecretError>;
}

impl<P: SecretProvider + ?Sized> SecretProvider for Arc<P> {
    fn get_secret_value(&self, name: &str) -> Result<Vec<u8>, SecretError> {
        (**self).get_secret_value(name)
    }
}

/// In-memory secret provider for tests and ephemeral sessions.
///
/// Clones share the same map, so a test can keep a handle and change or count
/// lookups after handing a clone to the code under test.
#[derive(Debug, Default, Clone)]
pub struct InMemorySecretProvider {
    inner: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    fetches: Arc<AtomicUsize>,
}

impl InMemorySecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`InMemorySecretProvider::set_secret`].
    pub fn with_secret(self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.set_secret(name, value);
        self
    }

    /// Store (or overwrite) a secret value.
    pub fn set_secret(&self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(name.into(), value.into());
    }

    /// Remove a secret (idempotent).
    pub fn remove_secret(&self, name: &str) {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.remove(name);
    }

    /// Number of lookups served so far, successful or not.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SecretProvider for InMemorySecretProvider {
    fn get_secret_value(&self, name: &str) -> Result<Vec<u8>, SecretError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let map = self.inner.lock().map_err(|err| SecretError::Backend {
            reason: format!("lock poisoned: {err}"),
        })?;

        debug!(secret = name, "in-memory secret lookup");
        map.get(name).cloned().ok_or_else(|| SecretError::NotFound {
            name: name.to_string(),
        })
    }
}
