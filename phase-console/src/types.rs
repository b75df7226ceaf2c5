//! Shared types exchanged with the backend.
//!
//! Everything here that crosses the backend boundary carries ciphertext,
//! wrapped keys, digests or public keys only.

use chrono::{DateTime, Utc};
use phase_crypto::TokenKind;
use serde::{Deserialize, Serialize};

/// Level of the key hierarchy a keyring belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Organisation,
    App,
    Environment,
}

/// Kind of principal a scope key can be wrapped for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    ServiceAccount,
    Token,
}

/// A member, service account or token holding an X25519 identity key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub kind: PrincipalKind,
    /// X25519 public key, lower hex.
    pub identity_key: String,
}

/// A scope's seed and salt sealed for one principal.
///
/// `identity_key` is the scope's own public key, letting the holder check
/// that the seed they unwrapped regenerates the expected keypair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedScopeKey {
    pub scope_id: String,
    pub scope_kind: ScopeKind,
    pub principal_id: String,
    pub identity_key: String,
    pub wrapped_seed: String,
    pub wrapped_salt: String,
}

/// Per-(environment, principal) key set, as stored by `createEnvironmentKey`.
pub type EnvironmentKeySet = WrappedScopeKey;

/// Plaintext secret as entered in the editor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretInput {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub path: String,
}

impl SecretInput {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

/// One prior version of a secret, encrypted like the secret itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRevision {
    pub version: u32,
    pub key: String,
    pub value: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A secret as the backend stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedSecret {
    #[serde(default)]
    pub id: String,
    pub env_id: String,
    pub path: String,
    pub key: String,
    pub value: String,
    pub comment: String,
    pub key_digest: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default)]
    pub history: Vec<EncryptedRevision>,
    #[serde(default)]
    pub personal_override: Option<EncryptedOverride>,
}

fn first_version() -> u32 {
    1
}

/// Decrypted prior version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revision {
    pub version: u32,
    pub key: String,
    pub value: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Plaintext personal override of one secret's value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonalSecretOverride {
    pub secret_id: String,
    pub value: String,
    pub is_active: bool,
}

/// Personal override as the backend stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedOverride {
    pub secret_id: String,
    pub value: String,
    pub is_active: bool,
}

/// A secret after client-side decryption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptedSecret {
    pub id: String,
    pub env_id: String,
    pub path: String,
    pub key: String,
    pub value: String,
    pub comment: String,
    pub tags: Vec<String>,
    pub version: u32,
    pub history: Vec<Revision>,
    pub personal_override: Option<PersonalSecretOverride>,
}

impl DecryptedSecret {
    /// Value the holder sees: the active override if any, else the canonical value.
    pub fn effective_value(&self) -> &str {
        match &self.personal_override {
            Some(o) if o.is_active => &o.value,
            _ => &self.value,
        }
    }
}

/// Token registration sent to the backend. The token string itself never is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTokenRecord {
    pub organisation_id: String,
    pub name: String,
    pub kind: TokenKind,
    pub identity_key: String,
    pub token_digest: String,
    pub wrapped_key_share: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Token as listed by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub id: String,
    pub name: String,
    pub kind: TokenKind,
    pub identity_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Server-held half of a token's private key, returned only to a caller
/// presenting a live token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKeyShare {
    pub token_id: String,
    pub identity_key: String,
    pub wrapped_key_share: String,
}

/// App keypair registration for `createAppKeys` / `rotateAppKeys`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppKeysInput {
    pub app_id: String,
    pub identity_key: String,
    pub wrapped_keys: Vec<WrappedScopeKey>,
}

/// Lockbox creation request; `data` is ciphertext.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockboxInput {
    pub data: String,
    pub allowed_views: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Lockbox as served by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLockbox {
    pub id: String,
    pub data: String,
    pub views: u32,
    pub allowed_views: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}
