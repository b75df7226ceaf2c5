//! Seed-derived X25519 keypairs and anonymous asymmetric encryption.
//!
//! Every scope (organisation, app, environment) and every token owns a
//! keypair regenerated from a 32-byte seed, so only the seed ever needs to
//! be wrapped for a principal. Encryption uses a fresh ephemeral X25519 key
//! per call plus XSalsa20-Poly1305; the sender stays anonymous.
//!
//! Wire form: `ph:v1:<ephemeral_public_hex>:<base64(nonce || ciphertext)>`.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{decode_hex_32, random_32};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use crypto_box::aead::Aead;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

const CIPHERTEXT_PREFIX: &str = "ph";
const CIPHERTEXT_VERSION: &str = "v1";
const SEED_DOMAIN: &[u8] = b"phase-keyring-from-seed-v1";
const BOX_NONCE_SIZE: usize = 24;

/// Random 32-byte seed from which a keypair is regenerated.
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct Seed([u8; 32]);

impl Seed {
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

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed([REDACTED])")
    }
}

/// Generates a new random seed.
pub fn new_seed() -> Seed {
    Seed(random_32())
}

/// X25519 keypair. The secret half zeroizes on drop (from crypto_box).
#[derive(Clone)]
pub struct ScopeKeypair {
    pub secret: SecretKey,
    pub public: PublicKey,
}

impl ScopeKeypair {
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Public key as lower hex, the form the backend stores.
    pub fn public_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret.to_bytes())
    }

    /// Rebuilds a keypair from raw secret bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = SecretKey::from(bytes);
        let public = secret.public_key();
        Self { secret, public }
    }
}

impl std::fmt::Debug for ScopeKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeKeypair")
            .field("public", &self.public_hex())
            .finish_non_exhaustive()
    }
}

/// Deterministically regenerates the keypair owned by `seed`.
pub fn keyring_from_seed(seed: &Seed) -> ScopeKeypair {
    let mut hasher = Sha256::new();
    hasher.update(SEED_DOMAIN);
    hasher.update(seed.as_bytes());
    let mut secret_bytes: [u8; 32] = hasher.finalize().into();
    let keypair = ScopeKeypair::from_secret_bytes(secret_bytes);
    secret_bytes.zeroize();
    keypair
}

/// Parses a hex-encoded X25519 public key.
pub fn public_key_from_hex(s: &str) -> CryptoResult<PublicKey> {
    Ok(PublicKey::from(decode_hex_32(s)?))
}

/// Ciphertext sealed for one recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedEnvelope {
    /// Ephemeral X25519 public key (sender side of DH).
    pub ephemeral_public_key: [u8; 32],
    /// XSalsa20 nonce.
    pub nonce: [u8; BOX_NONCE_SIZE],
    /// XSalsa20-Poly1305 ciphertext plus tag.
    pub ciphertext: Vec<u8>,
}

impl SealedEnvelope {
    /// Renders the `ph:v1:` wire string.
    pub fn to_wire(&self) -> String {
        let mut body = Vec::with_capacity(BOX_NONCE_SIZE + self.ciphertext.len());
        body.extend_from_slice(&self.nonce);
        body.extend_from_slice(&self.ciphertext);
        format!(
            "{CIPHERTEXT_PREFIX}:{CIPHERTEXT_VERSION}:{}:{}",
            hex::encode(self.ephemeral_public_key),
            BASE64.encode(body)
        )
    }

    /// Parses a `ph:v1:` wire string.
    pub fn from_wire(s: &str) -> CryptoResult<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [prefix, version, ephemeral, body] = parts.as_slice() else {
            return Err(CryptoError::InvalidFormat(format!(
                "expected 4 ciphertext segments, got {}",
                parts.len()
            )));
        };
        if *prefix != CIPHERTEXT_PREFIX {
            return Err(CryptoError::InvalidFormat(format!("unknown prefix {prefix:?}")));
        }
        if *version != CIPHERTEXT_VERSION {
            return Err(CryptoError::InvalidFormat(format!(
                "unsupported ciphertext version {version:?}"
            )));
        }

        let ephemeral_public_key = decode_hex_32(ephemeral)?;
        let raw = BASE64
            .decode(body)
            .map_err(|e| CryptoError::InvalidFormat(format!("bad base64: {e}")))?;
        if raw.len() < BOX_NONCE_SIZE {
            return Err(CryptoError::InvalidFormat("ciphertext shorter than nonce".into()));
        }

        let mut nonce = [0u8; BOX_NONCE_SIZE];
        nonce.copy_from_slice(&raw[..BOX_NONCE_SIZE]);
        Ok(Self {
            ephemeral_public_key,
            nonce,
            ciphertext: raw[BOX_NONCE_SIZE..].to_vec(),
        })
    }
}

/// Seals `plaintext` for the holder of `recipient`'s secret key.
pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> CryptoResult<SealedEnvelope> {
    let ephemeral = SecretKey::from(random_32());
    let ephemeral_pk = ephemeral.public_key();

    let salsa_box = SalsaBox::new(recipient, &ephemeral);

    let mut nonce = [0u8; BOX_NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = salsa_box
        .encrypt(crypto_box::Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(format!("seal failed: {e}")))?;

    Ok(SealedEnvelope {
        ephemeral_public_key: *ephemeral_pk.as_bytes(),
        nonce,
        ciphertext,
    })
}

/// Opens an envelope with the recipient's secret key.
pub fn open(envelope: &SealedEnvelope, recipient: &SecretKey) -> CryptoResult<Vec<u8>> {
    let ephemeral_pk = PublicKey::from(envelope.ephemeral_public_key);
    let salsa_box = SalsaBox::new(&ephemeral_pk, recipient);

    salsa_box
        .decrypt(
            crypto_box::Nonce::from_slice(&envelope.nonce),
            envelope.ciphertext.as_ref(),
        )
        .map_err(|_| CryptoError::Decryption("wrong key or tampered data".to_string()))
}

/// Encrypts a string for `recipient`, returning the `ph:v1:` wire form.
pub fn encrypt_asymmetric(plaintext: &str, recipient: &PublicKey) -> CryptoResult<String> {
    Ok(seal(plaintext.as_bytes(), recipient)?.to_wire())
}

/// Decrypts a `ph:v1:` string.
///
/// `recipient_public` must belong to `recipient_secret`; a mismatch is
/// reported as [`CryptoError::KeyMismatch`] rather than a generic failure.
pub fn decrypt_asymmetric(
    ciphertext: &str,
    recipient_secret: &SecretKey,
    recipient_public: &PublicKey,
) -> CryptoResult<String> {
    if recipient_secret.public_key().as_bytes() != recipient_public.as_bytes() {
        return Err(CryptoError::KeyMismatch);
    }
    let envelope = SealedEnvelope::from_wire(ciphertext)?;
    let plaintext = open(&envelope, recipient_secret)?;
    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::Decryption(format!("plaintext is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_has_four_segments() {
        let kp = keyring_from_seed(&new_seed());
        let ct = encrypt_asymmetric("hello", &kp.public).unwrap();
        assert!(ct.starts_with("ph:v1:"));
        assert_eq!(ct.split(':').count(), 4);
    }

    #[test]
    fn mismatched_public_key_is_reported() {
        let a = keyring_from_seed(&new_seed());
        let b = keyring_from_seed(&new_seed());
        let ct = encrypt_asymmetric("hello", &a.public).unwrap();
        let err = decrypt_asymmetric(&ct, &a.secret, &b.public).unwrap_err();
        assert!(matches!(err, CryptoError::KeyMismatch));
    }

    #[test]
    fn unknown_version_rejected() {
        let kp = keyring_from_seed(&new_seed());
        let ct = encrypt_asymmetric("hello", &kp.public).unwrap().replacen("v1", "v9", 1);
        let err = decrypt_asymmetric(&ct, &kp.secret, &kp.public).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidFormat(_)));
    }

    #[test]
    fn seed_debug_is_redacted() {
        assert_eq!(format!("{:?}", new_seed()), "Seed([REDACTED])");
    }
}
