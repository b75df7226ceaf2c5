//! Password-derived device key.
//!
//! The device key is never stored. It is recomputed from the sudo password
//! and account email on every unlock and only seals the account keyring.

use crate::error::CryptoResult;
use crate::key::{DerivedKey, KdfParams, SALT_SIZE, Salt, derive_key};
use sha2::{Digest, Sha256};

const EMAIL_SALT_DOMAIN: &[u8] = b"phase-device-vault-key-v1:";

/// Symmetric key that seals the account keyring at rest.
#[derive(Clone, Debug)]
pub struct DeviceKey(DerivedKey);

impl DeviceKey {
    pub fn as_key(&self) -> &DerivedKey {
        &self.0
    }
}

/// Salt bound to the account email. Case and surrounding whitespace in the
/// email are ignored.
pub fn email_salt(email: &str) -> Salt {
    let normalized = email.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(EMAIL_SALT_DOMAIN);
    hasher.update(normalized.as_bytes());
    let hash = hasher.finalize();

    let mut bytes = [0u8; SALT_SIZE];
    bytes.copy_from_slice(&hash[..SALT_SIZE]);
    Salt::from_bytes(bytes)
}

/// Derives the device key for `(password, email)` with Argon2id.
pub fn device_vault_key(password: &str, email: &str, params: &KdfParams) -> CryptoResult<DeviceKey> {
    let salt = email_salt(email);
    Ok(DeviceKey(derive_key(password, &salt, params)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_key() {
        let a = device_vault_key("pw", "dev@phase.dev", &KdfParams::fast()).unwrap();
        let b = device_vault_key("pw", "dev@phase.dev", &KdfParams::fast()).unwrap();
        assert_eq!(a.as_key().as_bytes(), b.as_key().as_bytes());
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(email_salt(" Dev@Phase.dev "), email_salt("dev@phase.dev"));
    }

    #[test]
    fn different_email_different_key() {
        let a = device_vault_key("pw", "a@phase.dev", &KdfParams::fast()).unwrap();
        let b = device_vault_key("pw", "b@phase.dev", &KdfParams::fast()).unwrap();
        assert_ne!(a.as_key().as_bytes(), b.as_key().as_bytes());
    }
}
