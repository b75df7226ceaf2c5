//! Client-side encryption primitives for the Phase console.
//!
//! Nothing in this crate performs I/O. It provides:
//! - Argon2id device keys derived from (password, email)
//! - The account keyring and its sealed at-rest form
//! - Seed-derived X25519 keypairs with anonymous sealed-box encryption
//! - HMAC-SHA256 digests for server-side key lookups
//! - 2-of-2 key splitting and the `pss:` bearer token format
//!
//! # Key hierarchy
//!
//! 1. **Device key**: derived from the sudo password every unlock, never
//!    stored. Seals the account keyring.
//! 2. **Account keyring**: long-lived signing + KX keys. Its KX public key is
//!    the identity that scope seeds are wrapped for.
//! 3. **Scope keyring**: one per organisation, app and environment,
//!    regenerated from a seed. The seed is wrapped once per principal.
//!
//! A lost account keyring (and recovery phrase) means every secret it can
//! reach is unrecoverable. There is no server-side escrow.

pub mod asymmetric;
mod cipher;
pub mod device;
pub mod digest;
mod error;
mod key;
pub mod keyring;
pub mod shares;
pub mod token;

pub use asymmetric::{
    decrypt_asymmetric, encrypt_asymmetric, keyring_from_seed, new_seed, open,
    public_key_from_hex, seal, ScopeKeypair, SealedEnvelope, Seed,
};
pub use cipher::{
    decrypt, decrypt_string, encrypt, encrypt_string, EncryptedData, NONCE_SIZE, TAG_SIZE,
};
pub use device::{device_vault_key, DeviceKey};
pub use digest::{digest, new_salt, token_lookup_digest};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, generate_random_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use keyring::{
    decrypt_account_keyring, encrypt_account_keyring, verify_signature, AccountKeyring,
    EncryptedKeyring,
};
pub use shares::{
    combine_shares, new_wrap_key, split_secret, unwrap_key_share, wrap_key_share, KeyShare,
};
pub use token::{new_raw_token, BearerToken, TokenKind};

/// Re-exported so callers can name key types without depending on crypto_box.
pub use crypto_box::{PublicKey, SecretKey};
