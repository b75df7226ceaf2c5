//! In-process backend enforcing the server side of the contract.
//!
//! Holds only what a real server would: ciphertext, wrapped keys, digests
//! and public keys. Enforces token expiry, lockbox view and expiry limits,
//! and duplicate-key rejection by digest. The clock can be advanced to
//! exercise expiry without sleeping.

use crate::backend::ConsoleBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::types::*;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

struct StoredToken {
    record: TokenRecord,
    wrapped_key_share: String,
}

#[derive(Default)]
struct State {
    env_keys: HashMap<(String, String), WrappedScopeKey>,
    app_keys: HashMap<String, AppKeysInput>,
    secrets: HashMap<String, EncryptedSecret>,
    overrides: HashMap<(String, String), EncryptedOverride>,
    tokens: HashMap<String, StoredToken>,
    lockboxes: HashMap<String, StoredLockbox>,
    clock_offset_secs: i64,
}

impl State {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.clock_offset_secs)
    }

    /// Rejects a key digest already used at the same environment and path,
    /// ignoring the secret being replaced.
    fn reject_duplicate(
        &self,
        secret: &EncryptedSecret,
        replacing: Option<&str>,
    ) -> ConsoleResult<()> {
        let duplicate = self.secrets.values().any(|s| {
            Some(s.id.as_str()) != replacing
                && s.env_id == secret.env_id
                && s.path == secret.path
                && s.key_digest == secret.key_digest
        });
        if duplicate {
            return Err(ConsoleError::InvalidInput(
                "a secret with this key already exists at this path".into(),
            ));
        }
        Ok(())
    }
}

/// Thread-safe in-memory backend.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the server clock forward.
    pub async fn advance_clock(&self, by: Duration) {
        self.state.write().await.clock_offset_secs += by.num_seconds();
    }

    /// App key registration as last stored by create/rotate.
    pub async fn app_keys(&self, app_id: &str) -> Option<AppKeysInput> {
        self.state.read().await.app_keys.get(app_id).cloned()
    }

    /// Raw stored secrets of an environment, for asserting what the server sees.
    pub async fn stored_secrets(&self, env_id: &str) -> Vec<EncryptedSecret> {
        self.state
            .read()
            .await
            .secrets
            .values()
            .filter(|s| s.env_id == env_id)
            .cloned()
            .collect()
    }

    /// Tokens that are registered and not revoked.
    pub async fn token_count(&self) -> usize {
        self.state.read().await.tokens.len()
    }
}

#[async_trait]
impl ConsoleBackend for MemoryBackend {
    async fn environment_key(
        &self,
        env_id: &str,
        principal_id: &str,
    ) -> ConsoleResult<EnvironmentKeySet> {
        self.state
            .read()
            .await
            .env_keys
            .get(&(env_id.to_string(), principal_id.to_string()))
            .cloned()
            .ok_or_else(|| ConsoleError::NoAccess(format!("environment {env_id}")))
    }

    async fn environment_keys(&self, env_id: &str) -> ConsoleResult<Vec<EnvironmentKeySet>> {
        let state = self.state.read().await;
        let mut keys: Vec<_> = state
            .env_keys
            .values()
            .filter(|k| k.scope_id == env_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.principal_id.cmp(&b.principal_id));
        Ok(keys)
    }

    async fn create_environment_key(&self, key: &EnvironmentKeySet) -> ConsoleResult<()> {
        self.state.write().await.env_keys.insert(
            (key.scope_id.clone(), key.principal_id.clone()),
            key.clone(),
        );
        Ok(())
    }

    async fn delete_environment_key(&self, env_id: &str, principal_id: &str) -> ConsoleResult<()> {
        self.state
            .write()
            .await
            .env_keys
            .remove(&(env_id.to_string(), principal_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| ConsoleError::NotFound(format!("key for {principal_id} in {env_id}")))
    }

    async fn create_app_keys(&self, input: &AppKeysInput) -> ConsoleResult<()> {
        let mut state = self.state.write().await;
        if state.app_keys.contains_key(&input.app_id) {
            return Err(ConsoleError::InvalidInput(format!(
                "app {} already has keys",
                input.app_id
            )));
        }
        state.app_keys.insert(input.app_id.clone(), input.clone());
        Ok(())
    }

    async fn rotate_app_keys(&self, input: &AppKeysInput) -> ConsoleResult<()> {
        let mut state = self.state.write().await;
        if !state.app_keys.contains_key(&input.app_id) {
            return Err(ConsoleError::NotFound(format!("app {}", input.app_id)));
        }
        state.app_keys.insert(input.app_id.clone(), input.clone());
        Ok(())
    }

    async fn secrets(
        &self,
        env_id: &str,
        principal_id: &str,
    ) -> ConsoleResult<Vec<EncryptedSecret>> {
        let state = self.state.read().await;
        let mut secrets: Vec<EncryptedSecret> = state
            .secrets
            .values()
            .filter(|s| s.env_id == env_id)
            .cloned()
            .map(|mut s| {
                s.personal_override = state
                    .overrides
                    .get(&(s.id.clone(), principal_id.to_string()))
                    .cloned();
                s
            })
            .collect();
        secrets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(secrets)
    }

    async fn create_secret(&self, secret: &EncryptedSecret) -> ConsoleResult<String> {
        let mut state = self.state.write().await;
        state.reject_duplicate(secret, None)?;

        let id = Uuid::now_v7().to_string();
        let mut stored = secret.clone();
        stored.id = id.clone();
        stored.version = 1;
        stored.history.clear();
        stored.personal_override = None;
        state.secrets.insert(id.clone(), stored);
        debug!("stored secret {id} in environment {}", secret.env_id);
        Ok(id)
    }

    async fn update_secret(&self, secret: &EncryptedSecret) -> ConsoleResult<()> {
        let mut state = self.state.write().await;
        let now = state.now();
        let env_id = state
            .secrets
            .get(&secret.id)
            .map(|s| s.env_id.clone())
            .ok_or_else(|| ConsoleError::NotFound(format!("secret {}", secret.id)))?;
        state.reject_duplicate(
            &EncryptedSecret {
                env_id,
                ..secret.clone()
            },
            Some(&secret.id),
        )?;
        let stored = state
            .secrets
            .get_mut(&secret.id)
            .ok_or_else(|| ConsoleError::NotFound(format!("secret {}", secret.id)))?;

        stored.history.push(EncryptedRevision {
            version: stored.version,
            key: stored.key.clone(),
            value: stored.value.clone(),
            comment: stored.comment.clone(),
            created_at: now,
        });
        stored.version += 1;
        stored.path = secret.path.clone();
        stored.key = secret.key.clone();
        stored.value = secret.value.clone();
        stored.comment = secret.comment.clone();
        stored.key_digest = secret.key_digest.clone();
        stored.tags = secret.tags.clone();
        Ok(())
    }

    async fn rekey_secret(&self, secret: &EncryptedSecret) -> ConsoleResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .secrets
            .get_mut(&secret.id)
            .ok_or_else(|| ConsoleError::NotFound(format!("secret {}", secret.id)))?;
        stored.key = secret.key.clone();
        stored.value = secret.value.clone();
        stored.comment = secret.comment.clone();
        stored.key_digest = secret.key_digest.clone();
        stored.history = secret.history.clone();
        // Overrides were sealed under the retired key.
        let dropped = {
            let before = state.overrides.len();
            state.overrides.retain(|(id, _), _| id != &secret.id);
            before - state.overrides.len()
        };
        if dropped > 0 {
            debug!("dropped {dropped} overrides of rekeyed secret {}", secret.id);
        }
        Ok(())
    }

    async fn delete_secret(&self, secret_id: &str) -> ConsoleResult<()> {
        let mut state = self.state.write().await;
        state
            .secrets
            .remove(secret_id)
            .ok_or_else(|| ConsoleError::NotFound(format!("secret {secret_id}")))?;
        state.overrides.retain(|(id, _), _| id != secret_id);
        Ok(())
    }

    async fn create_override(
        &self,
        principal_id: &str,
        personal_override: &EncryptedOverride,
    ) -> ConsoleResult<()> {
        let mut state = self.state.write().await;
        if !state.secrets.contains_key(&personal_override.secret_id) {
            return Err(ConsoleError::NotFound(format!(
                "secret {}",
                personal_override.secret_id
            )));
        }
        state.overrides.insert(
            (personal_override.secret_id.clone(), principal_id.to_string()),
            personal_override.clone(),
        );
        Ok(())
    }

    async fn create_token(&self, record: &NewTokenRecord) -> ConsoleResult<TokenRecord> {
        let mut state = self.state.write().await;
        let stored = TokenRecord {
            id: Uuid::new_v4().to_string(),
            name: record.name.clone(),
            kind: record.kind,
            identity_key: record.identity_key.clone(),
            created_at: state.now(),
            expires_at: record.expires_at,
        };
        state.tokens.insert(
            record.token_digest.clone(),
            StoredToken {
                record: stored.clone(),
                wrapped_key_share: record.wrapped_key_share.clone(),
            },
        );
        Ok(stored)
    }

    async fn wrapped_key_share(&self, token_digest: &str) -> ConsoleResult<WrappedKeyShare> {
        let state = self.state.read().await;
        let token = state
            .tokens
            .get(token_digest)
            .ok_or_else(|| ConsoleError::NotFound("token".to_string()))?;

        if token.record.expires_at.is_some_and(|exp| state.now() >= exp) {
            debug!("rejected expired token {}", token.record.id);
            return Err(ConsoleError::TokenExpired);
        }

        Ok(WrappedKeyShare {
            token_id: token.record.id.clone(),
            identity_key: token.record.identity_key.clone(),
            wrapped_key_share: token.wrapped_key_share.clone(),
        })
    }

    async fn revoke_token(&self, token_id: &str) -> ConsoleResult<()> {
        let mut state = self.state.write().await;
        let before = state.tokens.len();
        state.tokens.retain(|_, t| t.record.id != token_id);
        if state.tokens.len() == before {
            return Err(ConsoleError::NotFound(format!("token {token_id}")));
        }
        Ok(())
    }

    async fn create_lockbox(&self, input: &LockboxInput) -> ConsoleResult<String> {
        if input.allowed_views == Some(0) {
            return Err(ConsoleError::InvalidInput("allowed_views must be at least 1".into()));
        }
        let id = Uuid::new_v4().to_string();
        self.state.write().await.lockboxes.insert(
            id.clone(),
            StoredLockbox {
                id: id.clone(),
                data: input.data.clone(),
                views: 0,
                allowed_views: input.allowed_views,
                expires_at: input.expires_at,
            },
        );
        Ok(id)
    }

    async fn lockbox(&self, lockbox_id: &str) -> ConsoleResult<StoredLockbox> {
        let mut state = self.state.write().await;
        let now = state.now();
        let lockbox = state
            .lockboxes
            .get_mut(lockbox_id)
            .ok_or_else(|| ConsoleError::LockboxUnavailable(format!("{lockbox_id} not found")))?;

        if lockbox.expires_at.is_some_and(|exp| now >= exp) {
            return Err(ConsoleError::LockboxUnavailable(format!("{lockbox_id} expired")));
        }
        if lockbox.allowed_views.is_some_and(|allowed| lockbox.views >= allowed) {
            return Err(ConsoleError::LockboxUnavailable(format!(
                "{lockbox_id} has no views left"
            )));
        }

        lockbox.views += 1;
        Ok(lockbox.clone())
    }
}
