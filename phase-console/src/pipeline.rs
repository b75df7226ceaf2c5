//! The decryption pipeline behind an environment view.
//!
//! Stages, each usable on its own:
//! 1. derive the device key and open the account keyring ([`KeyringSession::unlock`])
//! 2. take the account KX keypair
//! 3. fetch this user's wrapped environment key
//! 4. unwrap seed and salt, regenerate the environment keyring
//! 5. fetch and decrypt the environment's secrets
//!
//! Unwrapped environment keyrings are cached per environment until the
//! pipeline is locked.

use crate::backend::ConsoleBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::scope::ScopeKeyring;
use crate::secrets::decrypt_secrets;
use crate::session::KeyringSession;
use crate::types::DecryptedSecret;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Thread-safe cache of unwrapped environment keyrings.
#[derive(Clone, Default)]
pub struct EnvironmentKeyCache {
    keyrings: Arc<RwLock<HashMap<String, ScopeKeyring>>>,
}

impl EnvironmentKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, keyring: ScopeKeyring) {
        self.keyrings
            .write()
            .await
            .insert(keyring.scope_id().to_string(), keyring);
    }

    pub async fn get(&self, env_id: &str) -> Option<ScopeKeyring> {
        self.keyrings.read().await.get(env_id).cloned()
    }

    /// Drops one environment (e.g. after it was rotated).
    pub async fn remove(&self, env_id: &str) -> Option<ScopeKeyring> {
        self.keyrings.write().await.remove(env_id)
    }

    pub async fn clear(&self) {
        self.keyrings.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.keyrings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keyrings.read().await.is_empty()
    }
}

/// An environment opened for display.
#[derive(Debug)]
pub struct LoadedEnvironment {
    pub keyring: ScopeKeyring,
    pub secrets: Vec<DecryptedSecret>,
}

pub struct EnvironmentPipeline {
    session: KeyringSession,
    backend: Arc<dyn ConsoleBackend>,
    cache: EnvironmentKeyCache,
}

impl EnvironmentPipeline {
    pub fn new(session: KeyringSession, backend: Arc<dyn ConsoleBackend>) -> Self {
        Self {
            session,
            backend,
            cache: EnvironmentKeyCache::new(),
        }
    }

    pub fn session(&self) -> &KeyringSession {
        &self.session
    }

    pub fn cache(&self) -> &EnvironmentKeyCache {
        &self.cache
    }

    /// Unlocks the session with `password`, then loads `env_id`.
    pub async fn unlock_and_load(
        &self,
        password: &str,
        env_id: &str,
    ) -> ConsoleResult<LoadedEnvironment> {
        self.session.unlock(password).await?;
        self.load(env_id).await
    }

    /// Loads `env_id` with the already unlocked session.
    pub async fn load(&self, env_id: &str) -> ConsoleResult<LoadedEnvironment> {
        let keyring = self.environment_keyring(env_id).await?;
        let user_id = &self.session.account().user_id;
        let stored = self.backend.secrets(env_id, user_id).await?;
        let secrets = decrypt_secrets(&stored, &keyring)?;
        debug!("loaded environment {env_id}: {} secrets", secrets.len());
        Ok(LoadedEnvironment { keyring, secrets })
    }

    /// The environment keyring, unwrapped with the session's KX keypair.
    pub async fn environment_keyring(&self, env_id: &str) -> ConsoleResult<ScopeKeyring> {
        let account = self.session.keyring().await?;
        if let Some(keyring) = self.cache.get(env_id).await {
            return Ok(keyring);
        }

        let user_id = &self.session.account().user_id;
        let wrapped = self.backend.environment_key(env_id, user_id).await?;
        if wrapped.principal_id != *user_id {
            return Err(ConsoleError::NoAccess(format!(
                "environment {env_id} key belongs to another principal"
            )));
        }
        let keyring = ScopeKeyring::unwrap(&wrapped, account.kx())?;
        self.cache.insert(keyring.clone()).await;
        Ok(keyring)
    }

    /// Locks the session and forgets every unwrapped environment key.
    pub async fn lock(&self) {
        self.cache.clear().await;
        self.session.lock().await;
    }
}
