//! Core abstractions for SecretBox: the secret provider contract.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod secret;
