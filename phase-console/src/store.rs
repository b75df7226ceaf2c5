//! Local storage for sealed account keyrings.
//!
//! Only [`EncryptedKeyring`] values ever reach storage. Keyrings are keyed
//! by (organisation id, email).

use crate::error::{ConsoleError, ConsoleResult};
use phase_crypto::EncryptedKeyring;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Key-value access to sealed keyrings.
pub trait KeyringStore: Send + Sync {
    /// Returns `None` when no keyring exists for this account.
    fn load(&self, organisation_id: &str, email: &str) -> ConsoleResult<Option<EncryptedKeyring>>;

    /// Stores (or replaces) a sealed keyring.
    fn save(&self, keyring: &EncryptedKeyring) -> ConsoleResult<()>;

    /// Removes a keyring. Missing entries are not an error.
    fn remove(&self, organisation_id: &str, email: &str) -> ConsoleResult<()>;
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Replaces anything that isn't safe in a file name with '_'.
fn sanitize_for_path(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// One JSON file per keyring under a directory.
pub struct FileKeyringStore {
    dir: PathBuf,
}

impl FileKeyringStore {
    /// Creates the store, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> ConsoleResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, organisation_id: &str, email: &str) -> PathBuf {
        self.dir.join(format!(
            "{}__{}.json",
            sanitize_for_path(organisation_id),
            sanitize_for_path(&normalize_email(email))
        ))
    }
}

impl KeyringStore for FileKeyringStore {
    fn load(&self, organisation_id: &str, email: &str) -> ConsoleResult<Option<EncryptedKeyring>> {
        let path = self.path_for(organisation_id, email);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let keyring: EncryptedKeyring = serde_json::from_slice(&bytes)
            .map_err(|e| ConsoleError::Storage(format!("corrupt keyring file: {e}")))?;
        Ok(Some(keyring))
    }

    fn save(&self, keyring: &EncryptedKeyring) -> ConsoleResult<()> {
        let path = self.path_for(&keyring.organisation_id, &keyring.email);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(keyring)?)?;
        fs::rename(&tmp, &path)?;
        debug!("saved sealed keyring to {}", path.display());
        Ok(())
    }

    fn remove(&self, organisation_id: &str, email: &str) -> ConsoleResult<()> {
        match fs::remove_file(self.path_for(organisation_id, email)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryKeyringStore {
    keyrings: Mutex<HashMap<(String, String), EncryptedKeyring>>,
}

impl MemoryKeyringStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyringStore for MemoryKeyringStore {
    fn load(&self, organisation_id: &str, email: &str) -> ConsoleResult<Option<EncryptedKeyring>> {
        let keyrings = self
            .keyrings
            .lock()
            .map_err(|e| ConsoleError::Storage(format!("lock poisoned: {e}")))?;
        Ok(keyrings
            .get(&(organisation_id.to_string(), normalize_email(email)))
            .cloned())
    }

    fn save(&self, keyring: &EncryptedKeyring) -> ConsoleResult<()> {
        self.keyrings
            .lock()
            .map_err(|e| ConsoleError::Storage(format!("lock poisoned: {e}")))?
            .insert(
                (keyring.organisation_id.clone(), normalize_email(&keyring.email)),
                keyring.clone(),
            );
        Ok(())
    }

    fn remove(&self, organisation_id: &str, email: &str) -> ConsoleResult<()> {
        self.keyrings
            .lock()
            .map_err(|e| ConsoleError::Storage(format!("lock poisoned: {e}")))?
            .remove(&(organisation_id.to_string(), normalize_email(email)));
        Ok(())
    }
}
