//! 2-of-2 secret sharing for token private keys.
//!
//! The private key is XORed with a uniformly random pad. The pad is one
//! share and the XOR result the other, so either share on its own is
//! uniformly distributed and independent of the key.

use crate::cipher::{EncryptedData, decrypt, encrypt};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{DerivedKey, decode_hex_32, generate_random_key, random_32};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One half of a split 32-byte secret.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyShare([u8; 32]);

impl KeyShare {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        Ok(Self(decode_hex_32(s)?))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyShare([REDACTED])")
    }
}

/// Splits `secret` into two shares; both are needed to rebuild it.
pub fn split_secret(secret: &[u8; 32]) -> [KeyShare; 2] {
    let pad = random_32();
    let mut masked = [0u8; 32];
    for (out, (s, p)) in masked.iter_mut().zip(secret.iter().zip(pad.iter())) {
        *out = s ^ p;
    }
    [KeyShare(pad), KeyShare(masked)]
}

/// Rebuilds the secret from both shares. Order does not matter.
pub fn combine_shares(a: &KeyShare, b: &KeyShare) -> [u8; 32] {
    let mut secret = [0u8; 32];
    for (out, (x, y)) in secret.iter_mut().zip(a.0.iter().zip(b.0.iter())) {
        *out = x ^ y;
    }
    secret
}

/// Fresh symmetric key used to wrap the server-held share.
pub fn new_wrap_key() -> DerivedKey {
    generate_random_key()
}

/// Encrypts a share under `wrap_key`; the result is what the server stores.
pub fn wrap_key_share(share: &KeyShare, wrap_key: &DerivedKey) -> CryptoResult<String> {
    Ok(encrypt(wrap_key, share.as_bytes())?.to_base64())
}

/// Decrypts a share produced by [`wrap_key_share`].
pub fn unwrap_key_share(wrapped: &str, wrap_key: &DerivedKey) -> CryptoResult<KeyShare> {
    let data = EncryptedData::from_base64(wrapped)?;
    let mut plaintext = decrypt(wrap_key, &data)?;
    if plaintext.len() != 32 {
        let actual = plaintext.len();
        plaintext.zeroize();
        return Err(CryptoError::InvalidKeyLength {
            expected: 32,
            actual,
        });
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&plaintext);
    plaintext.zeroize();
    Ok(KeyShare(bytes))
}
