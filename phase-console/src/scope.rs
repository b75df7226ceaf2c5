//! Organisation, app and environment keyrings and their distribution.
//!
//! A scope keyring is regenerated from a random seed. The seed and the
//! scope's digest salt are wrapped once per principal with that
//! principal's X25519 identity key, so the backend only ever stores
//! ciphertext it cannot open.
//!
//! Granting access wraps the existing seed for a new principal. Revoking
//! deletes the wrapped copy and nothing else: a revoked principal who kept
//! the seed can still read data encrypted before the next rotation.
//! [`ScopeDistributor::rotate_environment`] re-seeds the scope and
//! re-encrypts every secret under the new key.

use crate::backend::ConsoleBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::secrets::{decrypt_override, decrypt_secret, encrypt_override, reencrypt_secret};
use crate::types::*;
use phase_crypto::{
    decrypt_asymmetric, digest, encrypt_asymmetric, keyring_from_seed, new_salt, new_seed,
    public_key_from_hex, ScopeKeypair, Seed,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keyring of one organisation, app or environment.
#[derive(Clone)]
pub struct ScopeKeyring {
    kind: ScopeKind,
    scope_id: String,
    seed: Seed,
    salt: String,
    keypair: ScopeKeypair,
}

impl std::fmt::Debug for ScopeKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeKeyring")
            .field("kind", &self.kind)
            .field("scope_id", &self.scope_id)
            .field("identity_key", &self.keypair.public_hex())
            .finish_non_exhaustive()
    }
}

impl ScopeKeyring {
    /// Creates a keyring with a fresh seed and salt.
    pub fn provision(kind: ScopeKind, scope_id: impl Into<String>) -> Self {
        Self::from_parts(kind, scope_id, new_seed(), new_salt())
    }

    /// Rebuilds a keyring from a known seed and salt.
    pub fn from_parts(
        kind: ScopeKind,
        scope_id: impl Into<String>,
        seed: Seed,
        salt: String,
    ) -> Self {
        let keypair = keyring_from_seed(&seed);
        Self {
            kind,
            scope_id: scope_id.into(),
            seed,
            salt,
            keypair,
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn keypair(&self) -> &ScopeKeypair {
        &self.keypair
    }

    /// The scope's public key, lower hex.
    pub fn identity_key(&self) -> String {
        self.keypair.public_hex()
    }

    /// Encrypts one field for this scope.
    pub fn encrypt(&self, plaintext: &str) -> ConsoleResult<String> {
        Ok(encrypt_asymmetric(plaintext, &self.keypair.public)?)
    }

    /// Decrypts one field sealed for this scope.
    pub fn decrypt(&self, ciphertext: &str) -> ConsoleResult<String> {
        Ok(decrypt_asymmetric(
            ciphertext,
            &self.keypair.secret,
            &self.keypair.public,
        )?)
    }

    /// Keyed digest of a plaintext secret key under this scope's salt.
    pub fn digest(&self, plaintext_key: &str) -> String {
        digest(plaintext_key, &self.salt)
    }

    /// Wraps seed and salt for one principal.
    pub fn wrap_for(&self, principal: &Principal) -> ConsoleResult<WrappedScopeKey> {
        let recipient = public_key_from_hex(&principal.identity_key).map_err(|e| {
            ConsoleError::InvalidInput(format!(
                "principal {} has an invalid identity key: {e}",
                principal.id
            ))
        })?;

        Ok(WrappedScopeKey {
            scope_id: self.scope_id.clone(),
            scope_kind: self.kind,
            principal_id: principal.id.clone(),
            identity_key: self.identity_key(),
            wrapped_seed: encrypt_asymmetric(&self.seed.to_hex(), &recipient)?,
            wrapped_salt: encrypt_asymmetric(&self.salt, &recipient)?,
        })
    }

    /// Wraps seed and salt once per principal.
    pub fn wrap_for_all(&self, principals: &[Principal]) -> ConsoleResult<Vec<WrappedScopeKey>> {
        principals.iter().map(|p| self.wrap_for(p)).collect()
    }

    /// Opens a wrapped copy with the holder's keypair and regenerates the
    /// scope keyring. Fails if the regenerated public key differs from the
    /// identity key recorded alongside the wrapped seed.
    pub fn unwrap(wrapped: &WrappedScopeKey, holder: &ScopeKeypair) -> ConsoleResult<Self> {
        let seed_hex = decrypt_asymmetric(&wrapped.wrapped_seed, &holder.secret, &holder.public)?;
        let salt = decrypt_asymmetric(&wrapped.wrapped_salt, &holder.secret, &holder.public)?;
        let seed = Seed::from_hex(&seed_hex)
            .map_err(|e| ConsoleError::DecryptionFailed(format!("wrapped seed: {e}")))?;

        let keyring = Self::from_parts(wrapped.scope_kind, wrapped.scope_id.clone(), seed, salt);
        if keyring.identity_key() != wrapped.identity_key {
            return Err(ConsoleError::DecryptionFailed(format!(
                "seed for {} does not match its identity key",
                wrapped.scope_id
            )));
        }
        Ok(keyring)
    }
}

/// Distributes scope keys to principals through the backend.
pub struct ScopeDistributor {
    backend: Arc<dyn ConsoleBackend>,
}

impl ScopeDistributor {
    pub fn new(backend: Arc<dyn ConsoleBackend>) -> Self {
        Self { backend }
    }

    /// Creates an environment keyring and wraps it for every principal.
    pub async fn provision_environment(
        &self,
        env_id: &str,
        principals: &[Principal],
    ) -> ConsoleResult<ScopeKeyring> {
        let keyring = ScopeKeyring::provision(ScopeKind::Environment, env_id);
        for wrapped in keyring.wrap_for_all(principals)? {
            self.backend.create_environment_key(&wrapped).await?;
        }
        info!(
            "provisioned environment {env_id} for {} principals",
            principals.len()
        );
        Ok(keyring)
    }

    /// Creates an app keyring and registers it wrapped for every principal.
    pub async fn provision_app(
        &self,
        app_id: &str,
        principals: &[Principal],
    ) -> ConsoleResult<ScopeKeyring> {
        let keyring = ScopeKeyring::provision(ScopeKind::App, app_id);
        self.backend
            .create_app_keys(&AppKeysInput {
                app_id: app_id.to_string(),
                identity_key: keyring.identity_key(),
                wrapped_keys: keyring.wrap_for_all(principals)?,
            })
            .await?;
        info!("provisioned app {app_id} for {} principals", principals.len());
        Ok(keyring)
    }

    /// Fetches and opens `holder_id`'s copy of an environment key.
    pub async fn open_environment(
        &self,
        env_id: &str,
        holder_id: &str,
        holder: &ScopeKeypair,
    ) -> ConsoleResult<ScopeKeyring> {
        let wrapped = self.backend.environment_key(env_id, holder_id).await?;
        ScopeKeyring::unwrap(&wrapped, holder)
    }

    /// Wraps an environment key for one more principal (member invite,
    /// service account or token).
    pub async fn grant(
        &self,
        env: &ScopeKeyring,
        principal: &Principal,
    ) -> ConsoleResult<WrappedScopeKey> {
        if env.kind() != ScopeKind::Environment {
            return Err(ConsoleError::InvalidInput(format!(
                "grant expects an environment keyring, got {:?}",
                env.kind()
            )));
        }
        let wrapped = env.wrap_for(principal)?;
        self.backend.create_environment_key(&wrapped).await?;
        info!(
            "granted environment {} to {:?} {}",
            env.scope_id(),
            principal.kind,
            principal.id
        );
        Ok(wrapped)
    }

    /// Deletes a principal's wrapped copy. Does not rotate the key.
    pub async fn revoke(&self, env_id: &str, principal_id: &str) -> ConsoleResult<()> {
        self.backend.delete_environment_key(env_id, principal_id).await?;
        warn!("revoked {principal_id} from environment {env_id}; key not rotated");
        Ok(())
    }

    /// Replaces an environment's key.
    ///
    /// Generates a new seed and salt, re-wraps for `remaining`, deletes any
    /// other wrapped copies, then re-encrypts every secret (with its
    /// history) under the new key. `rotator` must be one of `remaining`;
    /// only its own personal overrides are re-encrypted, since the backend
    /// returns no one else's.
    pub async fn rotate_environment(
        &self,
        current: &ScopeKeyring,
        rotator_id: &str,
        remaining: &[Principal],
    ) -> ConsoleResult<ScopeKeyring> {
        if !remaining.iter().any(|p| p.id == rotator_id) {
            return Err(ConsoleError::InvalidInput(
                "the rotating principal must keep access".into(),
            ));
        }
        let env_id = current.scope_id();

        // Decrypt everything before any key changes.
        let stored = self.backend.secrets(env_id, rotator_id).await?;
        let mut decrypted = Vec::with_capacity(stored.len());
        for secret in &stored {
            decrypted.push(decrypt_secret(secret, current)?);
        }

        let next = ScopeKeyring::provision(ScopeKind::Environment, env_id);
        let keep: HashSet<&str> = remaining.iter().map(|p| p.id.as_str()).collect();
        for wrapped in next.wrap_for_all(remaining)? {
            self.backend.create_environment_key(&wrapped).await?;
        }
        for old in self.backend.environment_keys(env_id).await? {
            if !keep.contains(old.principal_id.as_str()) {
                self.backend
                    .delete_environment_key(env_id, &old.principal_id)
                    .await?;
            }
        }

        for (secret, plain) in stored.iter().zip(&decrypted) {
            self.backend
                .rekey_secret(&reencrypt_secret(secret, plain, &next)?)
                .await?;
            if let Some(existing) = &secret.personal_override {
                let personal = decrypt_override(existing, current)?;
                self.backend
                    .create_override(rotator_id, &encrypt_override(&personal, &next)?)
                    .await?;
            }
        }

        info!(
            "rotated environment {env_id}: {} secrets re-encrypted for {} principals",
            stored.len(),
            remaining.len()
        );
        Ok(next)
    }

    /// Replaces an app's key and re-wraps it for `principals`.
    pub async fn rotate_app(
        &self,
        app_id: &str,
        principals: &[Principal],
    ) -> ConsoleResult<ScopeKeyring> {
        let next = ScopeKeyring::provision(ScopeKind::App, app_id);
        self.backend
            .rotate_app_keys(&AppKeysInput {
                app_id: app_id.to_string(),
                identity_key: next.identity_key(),
                wrapped_keys: next.wrap_for_all(principals)?,
            })
            .await?;
        debug!("rotated app {app_id}");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str) -> (Principal, ScopeKeypair) {
        let kp = keyring_from_seed(&new_seed());
        (
            Principal {
                id: id.to_string(),
                kind: PrincipalKind::User,
                identity_key: kp.public_hex(),
            },
            kp,
        )
    }

    #[test]
    fn unwrap_regenerates_scope_keypair() {
        let (alice, alice_kp) = member("alice");
        let env = ScopeKeyring::provision(ScopeKind::Environment, "env-1");
        let wrapped = env.wrap_for(&alice).unwrap();

        let opened = ScopeKeyring::unwrap(&wrapped, &alice_kp).unwrap();
        assert_eq!(opened.identity_key(), env.identity_key());
        assert_eq!(opened.salt(), env.salt());
        assert_eq!(opened.kind(), ScopeKind::Environment);
    }

    #[test]
    fn wrong_holder_cannot_unwrap() {
        let (alice, _) = member("alice");
        let (_, mallory_kp) = member("mallory");
        let env = ScopeKeyring::provision(ScopeKind::Environment, "env-1");
        let wrapped = env.wrap_for(&alice).unwrap();

        let err = ScopeKeyring::unwrap(&wrapped, &mallory_kp).unwrap_err();
        assert!(err.is_decryption_failure());
    }

    #[test]
    fn tampered_identity_key_is_rejected() {
        let (alice, alice_kp) = member("alice");
        let env = ScopeKeyring::provision(ScopeKind::Environment, "env-1");
        let mut wrapped = env.wrap_for(&alice).unwrap();
        wrapped.identity_key = ScopeKeyring::provision(ScopeKind::Environment, "x").identity_key();

        assert!(ScopeKeyring::unwrap(&wrapped, &alice_kp)
            .unwrap_err()
            .is_decryption_failure());
    }

    #[test]
    fn invalid_principal_key_is_input_error() {
        let env = ScopeKeyring::provision(ScopeKind::App, "app-1");
        let bad = Principal {
            id: "svc".into(),
            kind: PrincipalKind::ServiceAccount,
            identity_key: "not-hex".into(),
        };
        assert!(matches!(env.wrap_for(&bad), Err(ConsoleError::InvalidInput(_))));
    }

    #[test]
    fn debug_hides_seed() {
        let env = ScopeKeyring::provision(ScopeKind::Environment, "env-1");
        let dbg = format!("{env:?}");
        assert!(!dbg.contains(&env.seed().to_hex()));
        assert!(!dbg.contains(env.salt()));
    }
}
