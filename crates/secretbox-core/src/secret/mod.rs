mod provider;

pub use provider::{InMemorySecretProvider, SecretError, SecretProvider};
