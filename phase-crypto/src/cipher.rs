//! ChaCha20-Poly1305 authenticated encryption under a symmetric key.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// ChaCha20-Poly1305 nonce size.
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Nonce plus ciphertext (tag included).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Compact wire form: base64(nonce || ciphertext).
    pub fn to_base64(&self) -> String {
        let mut buf = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.ciphertext);
        BASE64.encode(buf)
    }

    pub fn from_base64(s: &str) -> CryptoResult<Self> {
        let raw = BASE64
            .decode(s)
            .map_err(|e| CryptoError::InvalidFormat(format!("bad base64: {e}")))?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidFormat(format!(
                "ciphertext too short: {} bytes",
                raw.len()
            )));
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&raw[..NONCE_SIZE]);
        Ok(Self {
            nonce,
            ciphertext: raw[NONCE_SIZE..].to_vec(),
        })
    }
}

/// Encrypts `plaintext` under `key` with a random nonce.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData { nonce, ciphertext })
}

/// Decrypts data produced by [`encrypt`].
pub fn decrypt(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(&data.nonce), data.ciphertext.as_ref())
        .map_err(|_| CryptoError::Decryption("wrong key or tampered data".to_string()))
}

pub fn encrypt_string(key: &DerivedKey, plaintext: &str) -> CryptoResult<EncryptedData> {
    encrypt(key, plaintext.as_bytes())
}

pub fn decrypt_string(key: &DerivedKey, data: &EncryptedData) -> CryptoResult<String> {
    let bytes = decrypt(key, data)?;
    String::from_utf8(bytes)
        .map_err(|e| CryptoError::Decryption(format!("plaintext is not UTF-8: {e}")))
}
