//! Secret encryption, digests and editing helpers.
//!
//! Key, value and comment are sealed independently under the environment
//! public key. The key's digest under the environment salt lets the
//! backend reject duplicates without seeing plaintext.

use crate::backend::ConsoleBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::scope::ScopeKeyring;
use crate::types::*;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper-cases and trims a secret key. Empty keys are rejected.
pub fn normalize_key(key: &str) -> ConsoleResult<String> {
    let key = key.trim().to_uppercase();
    if key.is_empty() {
        return Err(ConsoleError::InvalidInput("secret key cannot be empty".into()));
    }
    Ok(key)
}

/// Defaults an empty path to `/`. Paths must be absolute.
pub fn normalize_path(path: &str) -> ConsoleResult<String> {
    let path = path.trim();
    if path.is_empty() {
        return Ok("/".to_string());
    }
    if !path.starts_with('/') {
        return Err(ConsoleError::InvalidInput(format!(
            "secret path must start with '/': {path}"
        )));
    }
    Ok(path.to_string())
}

/// True for `true`/`false` in any casing.
pub fn is_boolean_value(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
}

/// Flips a boolean string, keeping lower, Title or UPPER case.
///
/// Other casings of `true`/`false` flip to lower case. Anything else is
/// returned unchanged.
pub fn toggle_boolean_keeping_case(value: &str) -> String {
    match value {
        "true" => "false",
        "false" => "true",
        "True" => "False",
        "False" => "True",
        "TRUE" => "FALSE",
        "FALSE" => "TRUE",
        v if v.eq_ignore_ascii_case("true") => "false",
        v if v.eq_ignore_ascii_case("false") => "true",
        v => v,
    }
    .to_string()
}

/// Normalised keys that appear more than once at the same path.
///
/// Advisory: the editor highlights these before submit.
pub fn duplicate_keys(secrets: &[SecretInput]) -> BTreeSet<String> {
    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();
    for secret in secrets {
        let key = secret.key.trim().to_uppercase();
        if key.is_empty() {
            continue;
        }
        let path = normalize_path(&secret.path).unwrap_or_else(|_| secret.path.clone());
        if !seen.insert((path, key.clone())) {
            duplicates.insert(key);
        }
    }
    duplicates
}

/// Seals a plaintext secret for `env`.
pub fn encrypt_secret(input: &SecretInput, env: &ScopeKeyring) -> ConsoleResult<EncryptedSecret> {
    let key = normalize_key(&input.key)?;
    let path = normalize_path(&input.path)?;

    Ok(EncryptedSecret {
        id: String::new(),
        env_id: env.scope_id().to_string(),
        path,
        key_digest: env.digest(&key),
        key: env.encrypt(&key)?,
        value: env.encrypt(&input.value)?,
        comment: env.encrypt(&input.comment)?,
        tags: input.tags.clone(),
        version: 1,
        history: Vec::new(),
        personal_override: None,
    })
}

/// Opens every field of a stored secret, its history and override.
pub fn decrypt_secret(secret: &EncryptedSecret, env: &ScopeKeyring) -> ConsoleResult<DecryptedSecret> {
    let history = secret
        .history
        .iter()
        .map(|rev| -> ConsoleResult<Revision> {
            Ok(Revision {
                version: rev.version,
                key: env.decrypt(&rev.key)?,
                value: env.decrypt(&rev.value)?,
                comment: env.decrypt(&rev.comment)?,
                created_at: rev.created_at,
            })
        })
        .collect::<ConsoleResult<Vec<_>>>()?;

    let personal_override = secret
        .personal_override
        .as_ref()
        .map(|o| decrypt_override(o, env))
        .transpose()?;

    Ok(DecryptedSecret {
        id: secret.id.clone(),
        env_id: secret.env_id.clone(),
        path: secret.path.clone(),
        key: env.decrypt(&secret.key)?,
        value: env.decrypt(&secret.value)?,
        comment: env.decrypt(&secret.comment)?,
        tags: secret.tags.clone(),
        version: secret.version,
        history,
        personal_override,
    })
}

/// Opens a batch, failing on the first secret that cannot be opened.
pub fn decrypt_secrets(
    secrets: &[EncryptedSecret],
    env: &ScopeKeyring,
) -> ConsoleResult<Vec<DecryptedSecret>> {
    secrets.iter().map(|s| decrypt_secret(s, env)).collect()
}

/// Re-seals a stored secret and its history under a new key, keeping id,
/// version and timestamps.
pub(crate) fn reencrypt_secret(
    stored: &EncryptedSecret,
    plain: &DecryptedSecret,
    next: &ScopeKeyring,
) -> ConsoleResult<EncryptedSecret> {
    let history = plain
        .history
        .iter()
        .map(|rev| -> ConsoleResult<EncryptedRevision> {
            Ok(EncryptedRevision {
                version: rev.version,
                key: next.encrypt(&rev.key)?,
                value: next.encrypt(&rev.value)?,
                comment: next.encrypt(&rev.comment)?,
                created_at: rev.created_at,
            })
        })
        .collect::<ConsoleResult<Vec<_>>>()?;

    Ok(EncryptedSecret {
        key_digest: next.digest(&plain.key),
        key: next.encrypt(&plain.key)?,
        value: next.encrypt(&plain.value)?,
        comment: next.encrypt(&plain.comment)?,
        history,
        personal_override: None,
        ..stored.clone()
    })
}

pub fn encrypt_override(
    personal: &PersonalSecretOverride,
    env: &ScopeKeyring,
) -> ConsoleResult<EncryptedOverride> {
    Ok(EncryptedOverride {
        secret_id: personal.secret_id.clone(),
        value: env.encrypt(&personal.value)?,
        is_active: personal.is_active,
    })
}

pub fn decrypt_override(
    stored: &EncryptedOverride,
    env: &ScopeKeyring,
) -> ConsoleResult<PersonalSecretOverride> {
    Ok(PersonalSecretOverride {
        secret_id: stored.secret_id.clone(),
        value: env.decrypt(&stored.value)?,
        is_active: stored.is_active,
    })
}

/// Secret CRUD for one principal against the backend.
pub struct SecretService {
    backend: Arc<dyn ConsoleBackend>,
}

impl SecretService {
    pub fn new(backend: Arc<dyn ConsoleBackend>) -> Self {
        Self { backend }
    }

    /// Encrypts and stores a new secret, returning its id.
    pub async fn create(&self, env: &ScopeKeyring, input: &SecretInput) -> ConsoleResult<String> {
        let encrypted = encrypt_secret(input, env)?;
        let id = self.backend.create_secret(&encrypted).await?;
        info!("created secret {id} in environment {}", env.scope_id());
        Ok(id)
    }

    /// Stores a batch. Duplicates are logged; the backend decides whether
    /// to accept them.
    pub async fn create_many(
        &self,
        env: &ScopeKeyring,
        inputs: &[SecretInput],
    ) -> ConsoleResult<Vec<String>> {
        let duplicates = duplicate_keys(inputs);
        if !duplicates.is_empty() {
            warn!("{} duplicate keys in batch", duplicates.len());
        }
        let mut ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            ids.push(self.create(env, input).await?);
        }
        Ok(ids)
    }

    /// Replaces a secret's content. The backend keeps the prior version.
    pub async fn update(
        &self,
        env: &ScopeKeyring,
        secret_id: &str,
        input: &SecretInput,
    ) -> ConsoleResult<()> {
        let mut encrypted = encrypt_secret(input, env)?;
        encrypted.id = secret_id.to_string();
        self.backend.update_secret(&encrypted).await?;
        debug!("updated secret {secret_id}");
        Ok(())
    }

    pub async fn delete(&self, secret_id: &str) -> ConsoleResult<()> {
        self.backend.delete_secret(secret_id).await?;
        info!("deleted secret {secret_id}");
        Ok(())
    }

    /// Fetches and decrypts an environment's secrets as `principal_id` sees them.
    pub async fn list(
        &self,
        env: &ScopeKeyring,
        principal_id: &str,
    ) -> ConsoleResult<Vec<DecryptedSecret>> {
        let stored = self.backend.secrets(env.scope_id(), principal_id).await?;
        let secrets = decrypt_secrets(&stored, env)?;
        debug!(
            "decrypted {} secrets for environment {}",
            secrets.len(),
            env.scope_id()
        );
        Ok(secrets)
    }

    /// Flips a boolean secret's value, keeping its casing.
    pub async fn toggle_boolean(
        &self,
        env: &ScopeKeyring,
        secret: &DecryptedSecret,
    ) -> ConsoleResult<String> {
        if !is_boolean_value(&secret.value) {
            return Err(ConsoleError::InvalidInput(format!(
                "secret {} is not a boolean",
                secret.id
            )));
        }
        let value = toggle_boolean_keeping_case(&secret.value);
        let input = SecretInput {
            key: secret.key.clone(),
            value: value.clone(),
            comment: secret.comment.clone(),
            tags: secret.tags.clone(),
            path: secret.path.clone(),
        };
        self.update(env, &secret.id, &input).await?;
        Ok(value)
    }

    /// Stores `principal_id`'s personal override. The canonical secret is untouched.
    pub async fn set_override(
        &self,
        env: &ScopeKeyring,
        principal_id: &str,
        personal: &PersonalSecretOverride,
    ) -> ConsoleResult<()> {
        self.backend
            .create_override(principal_id, &encrypt_override(personal, env)?)
            .await?;
        debug!("saved override of secret {}", personal.secret_id);
        Ok(())
    }

    /// Activates or deactivates an existing override, keeping its value.
    pub async fn toggle_override(
        &self,
        env: &ScopeKeyring,
        principal_id: &str,
        secret: &DecryptedSecret,
    ) -> ConsoleResult<PersonalSecretOverride> {
        let current = secret.personal_override.as_ref().ok_or_else(|| {
            ConsoleError::NotFound(format!("override of secret {}", secret.id))
        })?;
        let toggled = PersonalSecretOverride {
            is_active: !current.is_active,
            ..current.clone()
        };
        self.set_override(env, principal_id, &toggled).await?;
        Ok(toggled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_upper_cased_and_trimmed() {
        assert_eq!(normalize_key("  db_password ").unwrap(), "DB_PASSWORD");
        assert!(normalize_key("   ").is_err());
    }

    #[test]
    fn path_defaults_to_root() {
        assert_eq!(normalize_path("").unwrap(), "/");
        assert_eq!(normalize_path("/api").unwrap(), "/api");
        assert!(normalize_path("api").is_err());
    }

    #[test]
    fn toggle_keeps_case() {
        assert_eq!(toggle_boolean_keeping_case("true"), "false");
        assert_eq!(toggle_boolean_keeping_case("False"), "True");
        assert_eq!(toggle_boolean_keeping_case("TRUE"), "FALSE");
        assert_eq!(toggle_boolean_keeping_case("tRuE"), "false");
        assert_eq!(toggle_boolean_keeping_case("yes"), "yes");
    }

    #[test]
    fn boolean_detection() {
        assert!(is_boolean_value("TRUE"));
        assert!(is_boolean_value("false"));
        assert!(!is_boolean_value("1"));
        assert!(!is_boolean_value(" true"));
    }

    #[test]
    fn duplicates_are_per_path() {
        let inputs = vec![
            SecretInput::new("API_KEY", "a"),
            SecretInput::new("api_key ", "b"),
            SecretInput {
                path: "/other".into(),
                ..SecretInput::new("API_KEY", "c")
            },
            SecretInput::new("PORT", "80"),
        ];
        let dupes = duplicate_keys(&inputs);
        assert_eq!(dupes.into_iter().collect::<Vec<_>>(), vec!["API_KEY"]);
    }
}
