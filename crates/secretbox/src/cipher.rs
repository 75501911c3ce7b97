//! AES-256-GCM seal/open over a lazily loaded key.
//!
//! Sealed messages are `nonce (12) || ciphertext || tag (16)` with no framing,
//! no version byte and no associated data.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use secretbox_core::secret::SecretProvider;
use tracing::{instrument, warn};

use crate::{
    error::SecretBoxError,
    key_store::{KeyStore, SecretKey},
};

/// Byte length of an AES-GCM nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Seals and opens messages with the key held by its [`KeyStore`].
///
/// Each call builds its own cipher instance, so a shared `SecretBox` needs no
/// locking once the key is loaded.
#[derive(Debug)]
pub struct SecretBox<P: SecretProvider> {
    keys: KeyStore<P>,
}

impl<P: SecretProvider> SecretBox<P> {
    pub fn new(provider: P) -> Self {
        Self {
            keys: KeyStore::new(provider),
        }
    }

    pub fn key_store(&self) -> &KeyStore<P> {
        &self.keys
    }

    /// Encrypt and authenticate `plaintext` under a fresh random nonce.
    ///
    /// The output is `NONCE_LEN + plaintext.len() + TAG_LEN` bytes long.
    #[instrument(skip_all, fields(len = plaintext.len()))]
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecretBoxError> {
        let cipher = build_cipher(self.keys.ensure_key()?);

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| SecretBoxError::Randomness {
                reason: e.to_string(),
            })?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| SecretBoxError::Cipher)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Verify and decrypt a message produced by [`SecretBox::seal`] under the same key.
    ///
    /// Tampering, a wrong key and a truncated tag all surface as
    /// [`SecretBoxError::Authentication`]; no plaintext is returned in that case.
    #[instrument(skip_all, fields(len = sealed.len()))]
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, SecretBoxError> {
        let cipher = build_cipher(self.keys.ensure_key()?);

        if sealed.len() < NONCE_LEN {
            return Err(SecretBoxError::MalformedCiphertext);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                warn!("sealed message failed authentication");
                SecretBoxError::Authentication
            })
    }
}

fn build_cipher(key: &SecretKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use secretbox_core::secret::{InMemorySecretProvider, SecretError};

    use super::*;
    use crate::{
        error::ErrorKind,
        key_store::{AES_KEY_SECRET_NAME, KEY_LEN},
    };

    fn test_box(byte: u8) -> SecretBox<InMemorySecretProvider> {
        SecretBox::new(
            InMemorySecretProvider::new().with_secret(AES_KEY_SECRET_NAME, vec![byte; KEY_LEN]),
        )
    }

    #[test]
    fn seals_and_opens_hello() {
        let sb = test_box(0x01);

        let sealed = sb.seal(b"hello").expect("seal");
        assert_eq!(sealed.len(), 12 + 5 + 16);
        assert_eq!(sb.open(&sealed).expect("open"), b"hello");

        let mut tampered = sealed.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        let err = sb.open(&tampered).expect_err("tampered tag");
        assert!(matches!(err, SecretBoxError::Authentication));
    }

    #[test]
    fn round_trips_assorted_payloads() {
        let sb = test_box(0x42);
        let large: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

        let payloads: [&[u8]; 4] = [
            b"",
            b"x",
            b"plaintext that spans more than one block",
            &large,
        ];

        for payload in payloads {
            let sealed = sb.seal(payload).expect("seal");
            assert_eq!(sealed.len(), NONCE_LEN + payload.len() + TAG_LEN);
            assert_eq!(sb.open(&sealed).expect("open"), payload);
        }
    }

    #[test]
    fn ciphertext_does_not_contain_plaintext() {
        let sb = test_box(0x01);
        let plaintext = b"top-secret-payload-top-secret";
        let sealed = sb.seal(plaintext).unwrap();
        assert!(!sealed
            .windows(plaintext.len())
            .any(|window| window == plaintext));
    }

    #[test]
    fn identical_plaintexts_get_fresh_nonces() {
        let sb = test_box(0x01);
        let first = sb.seal(b"same").unwrap();
        let second = sb.seal(b"same").unwrap();

        assert_ne!(first, second);
        assert_ne!(first[..NONCE_LEN], second[..NONCE_LEN]);
    }

    #[test]
    fn every_single_bit_flip_is_detected() {
        let sb = test_box(0x01);
        let sealed = sb.seal(b"hello").unwrap();

        for byte in 0..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                let err = sb.open(&tampered).expect_err("bit flip must fail");
                assert!(
                    matches!(err, SecretBoxError::Authentication),
                    "byte {byte} bit {bit}: {err:?}"
                );
            }
        }
    }

    #[test]
    fn short_input_is_malformed() {
        let sb = test_box(0x01);
        for len in [0, 5, NONCE_LEN - 1] {
            let err = sb.open(&vec![0u8; len]).expect_err("too short");
            assert!(matches!(err, SecretBoxError::MalformedCiphertext));
            assert_eq!(err.kind(), ErrorKind::MalformedInput);
        }
    }

    #[test]
    fn nonce_without_tag_fails_authentication() {
        let sb = test_box(0x01);
        let sealed = sb.seal(b"hello").unwrap();

        for len in [NONCE_LEN, NONCE_LEN + TAG_LEN - 1, sealed.len() - 1] {
            let err = sb.open(&sealed[..len]).expect_err("truncated");
            assert!(matches!(err, SecretBoxError::Authentication));
        }
    }

    #[test]
    fn wrong_key_is_indistinguishable_from_tampering() {
        let sealed = test_box(0x01).seal(b"hello").unwrap();
        let err = test_box(0x02).open(&sealed).expect_err("wrong key");

        assert!(matches!(err, SecretBoxError::Authentication));
        assert_eq!(err.to_string(), SecretBoxError::Authentication.to_string());
    }

    #[test]
    fn misconfigured_key_fails_both_operations() {
        let provider =
            InMemorySecretProvider::new().with_secret(AES_KEY_SECRET_NAME, vec![0x01; 33]);
        let sb = SecretBox::new(provider);

        let err = sb.seal(b"hello").expect_err("33-byte key");
        assert!(matches!(err, SecretBoxError::InvalidKeyLength(33)));

        // Key setup runs before input validation.
        let err = sb.open(b"short").expect_err("33-byte key");
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = SecretBox::new(InMemorySecretProvider::new())
            .seal(b"hello")
            .expect_err("missing key");
        assert!(matches!(
            err,
            SecretBoxError::Secret(SecretError::NotFound { .. })
        ));
    }

    #[test]
    fn key_is_stable_across_reinitialization_attempts() {
        let provider =
            InMemorySecretProvider::new().with_secret(AES_KEY_SECRET_NAME, vec![0x01; KEY_LEN]);
        let sb = SecretBox::new(provider.clone());
        let before = sb.seal(b"before").unwrap();

        provider.set_secret(AES_KEY_SECRET_NAME, vec![0x07; KEY_LEN]);
        let after = sb.seal(b"after").unwrap();

        assert_eq!(sb.open(&before).unwrap(), b"before");
        assert_eq!(sb.open(&after).unwrap(), b"after");
        assert_eq!(provider.fetch_count(), 1);
    }

    #[test]
    fn concurrent_seal_and_open() {
        let sb = test_box(0x03);
        std::thread::scope(|scope| {
            for i in 0..8u8 {
                let sb = &sb;
                scope.spawn(move || {
                    let payload = vec![i; usize::from(i) * 10];
                    let sealed = sb.seal(&payload).expect("seal");
                    assert_eq!(sb.open(&sealed).expect("open"), payload);
                });
            }
        });
        assert!(sb.key_store().is_initialized());
    }
}
