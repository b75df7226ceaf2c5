//! Contract with the Phase backend.
//!
//! One method per GraphQL operation the core uses. Implementations:
//! [`GraphQlClient`](crate::graphql::GraphQlClient) talks to a real server,
//! [`MemoryBackend`](crate::memory::MemoryBackend) enforces the same server
//! rules in process.

use crate::error::ConsoleResult;
use crate::types::*;
use async_trait::async_trait;

#[async_trait]
pub trait ConsoleBackend: Send + Sync {
    // ── Environment keys ──

    /// The key set wrapped for `principal_id` in `env_id`.
    async fn environment_key(
        &self,
        env_id: &str,
        principal_id: &str,
    ) -> ConsoleResult<EnvironmentKeySet>;

    /// Every key set of `env_id`, one per principal.
    async fn environment_keys(&self, env_id: &str) -> ConsoleResult<Vec<EnvironmentKeySet>>;

    async fn create_environment_key(&self, key: &EnvironmentKeySet) -> ConsoleResult<()>;

    async fn delete_environment_key(&self, env_id: &str, principal_id: &str) -> ConsoleResult<()>;

    // ── App keys ──

    async fn create_app_keys(&self, input: &AppKeysInput) -> ConsoleResult<()>;

    async fn rotate_app_keys(&self, input: &AppKeysInput) -> ConsoleResult<()>;

    // ── Secrets ──

    /// Secrets of `env_id`, with `principal_id`'s personal overrides attached.
    async fn secrets(&self, env_id: &str, principal_id: &str)
    -> ConsoleResult<Vec<EncryptedSecret>>;

    /// Stores a new secret and returns its id.
    async fn create_secret(&self, secret: &EncryptedSecret) -> ConsoleResult<String>;

    /// Replaces a secret's fields. The previous version moves to its history.
    async fn update_secret(&self, secret: &EncryptedSecret) -> ConsoleResult<()>;

    /// Replaces a secret's ciphertext and history in place after a key
    /// rotation. Version and id are unchanged. Every personal override of
    /// the secret is deleted; holders set them again under the new key.
    async fn rekey_secret(&self, secret: &EncryptedSecret) -> ConsoleResult<()>;

    async fn delete_secret(&self, secret_id: &str) -> ConsoleResult<()>;

    async fn create_override(
        &self,
        principal_id: &str,
        personal_override: &EncryptedOverride,
    ) -> ConsoleResult<()>;

    // ── Tokens ──

    async fn create_token(&self, record: &NewTokenRecord) -> ConsoleResult<TokenRecord>;

    /// Server half of a token's key. Fails with `TokenExpired` once the
    /// token's expiry has passed, whatever the caller holds.
    async fn wrapped_key_share(&self, token_digest: &str) -> ConsoleResult<WrappedKeyShare>;

    async fn revoke_token(&self, token_id: &str) -> ConsoleResult<()>;

    // ── Lockboxes ──

    /// Stores a lockbox and returns its id.
    async fn create_lockbox(&self, input: &LockboxInput) -> ConsoleResult<String>;

    /// Serves a lockbox, counting the view. Fails with `LockboxUnavailable`
    /// once views or expiry are exhausted.
    async fn lockbox(&self, lockbox_id: &str) -> ConsoleResult<StoredLockbox>;
}
