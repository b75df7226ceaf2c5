//! Account keyring: the user's long-lived key material.
//!
//! A keyring is fully determined by its 24-word recovery phrase:
//!
//! - **Signing key** (Ed25519), derived from the phrase entropy.
//! - **KX keypair** (X25519), derived from the signing key's scalar. This is
//!   the identity key that scope seeds are wrapped for.
//! - **Symmetric key**, derived from the phrase entropy with its own domain.
//!
//! At rest the keyring is sealed under the [`DeviceKey`]; the decrypted form
//! only ever lives in memory.

use crate::asymmetric::ScopeKeypair;
use crate::cipher::{EncryptedData, decrypt, encrypt};
use crate::device::DeviceKey;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{DerivedKey, random_32};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

/// Sealed keyring format version.
pub const KEYRING_VERSION: u32 = 1;

const RECOVERY_WORDS: usize = 24;
const SIGNING_DOMAIN: &[u8] = b"phase-account-signing-v1";
const SYMMETRIC_DOMAIN: &[u8] = b"phase-account-symmetric-v1";

/// Decrypted account keyring.
#[derive(Clone)]
pub struct AccountKeyring {
    signing: SigningKey,
    kx: ScopeKeypair,
    symmetric_key: DerivedKey,
    recovery_phrase: Zeroizing<String>,
}

impl AccountKeyring {
    /// Creates a keyring with a fresh recovery phrase.
    pub fn generate() -> CryptoResult<Self> {
        let mut entropy = random_32();
        let mnemonic = bip39::Mnemonic::from_entropy(&entropy)
            .map_err(|e| CryptoError::KeyDerivation(format!("mnemonic generation failed: {e}")));
        entropy.zeroize();
        Self::from_mnemonic(&mnemonic?.to_string())
    }

    /// Rebuilds a keyring from its recovery phrase.
    pub fn from_mnemonic(phrase: &str) -> CryptoResult<Self> {
        let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let mnemonic = bip39::Mnemonic::parse_normalized(&normalized)
            .map_err(|e| CryptoError::KeyDerivation(format!("invalid recovery phrase: {e}")))?;
        if mnemonic.word_count() != RECOVERY_WORDS {
            return Err(CryptoError::KeyDerivation(format!(
                "recovery phrase must have {RECOVERY_WORDS} words, got {}",
                mnemonic.word_count()
            )));
        }

        let (mut entropy, len) = mnemonic.to_entropy_array();
        let signing_seed = Zeroizing::new(domain_hash(SIGNING_DOMAIN, &entropy[..len]));
        let symmetric = domain_hash(SYMMETRIC_DOMAIN, &entropy[..len]);
        entropy.zeroize();

        let signing = SigningKey::from_bytes(&signing_seed);
        let kx_scalar = Zeroizing::new(signing.to_scalar_bytes());
        let kx = ScopeKeypair::from_secret_bytes(*kx_scalar);

        Ok(Self {
            signing,
            kx,
            symmetric_key: DerivedKey::from_bytes(symmetric),
            recovery_phrase: Zeroizing::new(normalized),
        })
    }

    /// X25519 keypair used to unwrap scope seeds.
    pub fn kx(&self) -> &ScopeKeypair {
        &self.kx
    }

    /// Identity (KX public) key, lower hex.
    pub fn identity_key(&self) -> String {
        self.kx.public_hex()
    }

    /// Ed25519 verifying key, lower hex.
    pub fn signing_public_key(&self) -> String {
        hex::encode(self.signing.verifying_key().to_bytes())
    }

    pub fn symmetric_key(&self) -> &DerivedKey {
        &self.symmetric_key
    }

    pub fn recovery_phrase(&self) -> &str {
        &self.recovery_phrase
    }

    /// Detached Ed25519 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for AccountKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKeyring")
            .field("identity_key", &self.identity_key())
            .finish_non_exhaustive()
    }
}

/// Verifies a detached signature made by [`AccountKeyring::sign`].
pub fn verify_signature(
    signing_public_hex: &str,
    message: &[u8],
    signature: &[u8; 64],
) -> CryptoResult<()> {
    let bytes = crate::key::decode_hex_32(signing_public_hex)?;
    let verifying = VerifyingKey::from_bytes(&bytes)
        .map_err(|e| CryptoError::InvalidFormat(format!("bad signing key: {e}")))?;
    verifying
        .verify(message, &Signature::from_bytes(signature))
        .map_err(|_| CryptoError::Decryption("signature verification failed".into()))
}

fn domain_hash(domain: &[u8], input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(input);
    hasher.finalize().into()
}

/// Plaintext layout sealed inside an [`EncryptedKeyring`].
#[derive(Serialize, Deserialize, Zeroize)]
struct KeyringPayload {
    recovery_phrase: String,
    symmetric_key: String,
}

/// Account keyring sealed under a device key, as kept in local storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyring {
    pub version: u32,
    pub organisation_id: String,
    pub email: String,
    /// Identity key of the sealed keyring, checked after decryption.
    pub identity_key: String,
    pub sealed: EncryptedData,
    pub created_at: i64,
}

/// Seals `keyring` under `device_key` for local storage.
pub fn encrypt_account_keyring(
    keyring: &AccountKeyring,
    device_key: &DeviceKey,
    organisation_id: &str,
    email: &str,
) -> CryptoResult<EncryptedKeyring> {
    let mut payload = KeyringPayload {
        recovery_phrase: keyring.recovery_phrase().to_string(),
        symmetric_key: keyring.symmetric_key.to_hex(),
    };
    let json = Zeroizing::new(serde_json::to_vec(&payload)?);
    payload.zeroize();

    let sealed = encrypt(device_key.as_key(), &json)?;
    Ok(EncryptedKeyring {
        version: KEYRING_VERSION,
        organisation_id: organisation_id.to_string(),
        email: email.trim().to_lowercase(),
        identity_key: keyring.identity_key(),
        sealed,
        created_at: chrono::Utc::now().timestamp(),
    })
}

/// Opens a sealed keyring. A wrong device key yields
/// [`CryptoError::Decryption`].
pub fn decrypt_account_keyring(
    encrypted: &EncryptedKeyring,
    device_key: &DeviceKey,
) -> CryptoResult<AccountKeyring> {
    if encrypted.version != KEYRING_VERSION {
        return Err(CryptoError::InvalidFormat(format!(
            "unsupported keyring version {}",
            encrypted.version
        )));
    }

    let json = Zeroizing::new(decrypt(device_key.as_key(), &encrypted.sealed)?);
    let mut payload: KeyringPayload = serde_json::from_slice(&json)?;
    let keyring = AccountKeyring::from_mnemonic(&payload.recovery_phrase);
    let symmetric = DerivedKey::from_hex(&payload.symmetric_key);
    payload.zeroize();
    let keyring = keyring?;

    if keyring.symmetric_key.as_bytes() != symmetric?.as_bytes()
        || keyring.identity_key() != encrypted.identity_key
    {
        return Err(CryptoError::KeyMismatch);
    }
    Ok(keyring)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_phrase_has_24_words() {
        let keyring = AccountKeyring::generate().unwrap();
        assert_eq!(keyring.recovery_phrase().split(' ').count(), 24);
    }

    #[test]
    fn phrase_rebuilds_same_keys() {
        let keyring = AccountKeyring::generate().unwrap();
        let again = AccountKeyring::from_mnemonic(keyring.recovery_phrase()).unwrap();
        assert_eq!(keyring.identity_key(), again.identity_key());
        assert_eq!(keyring.signing_public_key(), again.signing_public_key());
        assert_eq!(keyring.symmetric_key().as_bytes(), again.symmetric_key().as_bytes());
    }

    #[test]
    fn phrase_whitespace_and_case_ignored() {
        let keyring = AccountKeyring::generate().unwrap();
        let messy = format!("  {}  ", keyring.recovery_phrase().to_uppercase().replace(' ', "   "));
        let again = AccountKeyring::from_mnemonic(&messy).unwrap();
        assert_eq!(keyring.identity_key(), again.identity_key());
    }

    #[test]
    fn twelve_word_phrase_rejected() {
        let twelve = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        assert!(AccountKeyring::from_mnemonic(twelve).is_err());
    }

    #[test]
    fn signature_verifies_and_detects_tampering() {
        let keyring = AccountKeyring::generate().unwrap();
        let sig = keyring.sign(b"identity");
        verify_signature(&keyring.signing_public_key(), b"identity", &sig).unwrap();
        assert!(verify_signature(&keyring.signing_public_key(), b"identitz", &sig).is_err());
    }
}
