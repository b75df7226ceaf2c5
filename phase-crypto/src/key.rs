//! Symmetric key material and Argon2id password derivation.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of every symmetric key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of an Argon2id salt in bytes.
pub const SALT_SIZE: usize = 16;

/// A 256-bit symmetric key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Lower-hex encoding, as carried in token strings.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parses a key from a 64-char hex string.
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        Ok(Self::from_bytes(decode_hex_32(s)?))
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Argon2id salt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Lanes.
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Minimal parameters for tests. Never use for real passwords.
    pub fn fast() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Derives a 256-bit key from a password with Argon2id.
pub fn derive_key(password: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<DerivedKey> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let key = DerivedKey::from_bytes(output);
    output.zeroize();
    Ok(key)
}

/// Generates a random 256-bit key.
pub fn generate_random_key() -> DerivedKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    DerivedKey::from_bytes(bytes)
}

/// Fills a fresh 32-byte array from the OS RNG.
pub(crate) fn random_32() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Decodes exactly 32 bytes of lower- or upper-case hex.
pub(crate) fn decode_hex_32(s: &str) -> CryptoResult<[u8; 32]> {
    let raw = hex::decode(s).map_err(|e| CryptoError::InvalidFormat(format!("bad hex: {e}")))?;
    if raw.len() != 32 {
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: raw.len(),
        });
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&raw);
    Ok(bytes)
}
