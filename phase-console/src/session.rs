//! Session-scoped keyring state.
//!
//! [`KeyringSession`] is owned by the application shell and handed to every
//! workflow that needs decryption. It moves through
//! `Locked -> Unlocking -> Unlocked | Error`; `lock()` returns it to
//! `Locked` and drops the keyring. The decrypted keyring is shared
//! read-only and never written to storage.

use crate::error::{ConsoleError, ConsoleResult};
use crate::store::KeyringStore;
use phase_crypto::{
    decrypt_account_keyring, device_vault_key, encrypt_account_keyring, AccountKeyring,
    CryptoError, KdfParams,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The signed-in account a session belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub organisation_id: String,
    pub email: String,
    /// Principal id that scope keys are wrapped for.
    pub user_id: String,
}

/// Current state of a session.
#[derive(Clone, Debug)]
pub enum SessionState {
    Locked,
    Unlocking,
    Unlocked(Arc<AccountKeyring>),
    /// Last unlock failed; holds the user-facing reason.
    Error(String),
}

/// State without the keyring, for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Locked,
    Unlocking,
    Unlocked,
    Error,
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Locked => SessionStatus::Locked,
            Self::Unlocking => SessionStatus::Unlocking,
            Self::Unlocked(_) => SessionStatus::Unlocked,
            Self::Error(_) => SessionStatus::Error,
        }
    }
}

/// Handle to the session keyring. Clones share state.
#[derive(Clone)]
pub struct KeyringSession {
    account: Arc<Account>,
    store: Arc<dyn KeyringStore>,
    kdf: KdfParams,
    state: Arc<RwLock<SessionState>>,
}

impl KeyringSession {
    pub fn new(account: Account, store: Arc<dyn KeyringStore>, kdf: KdfParams) -> Self {
        Self {
            account: Arc::new(account),
            store,
            kdf,
            state: Arc::new(RwLock::new(SessionState::Locked)),
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status()
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// True when a sealed keyring exists locally for this account.
    pub fn has_local_keyring(&self) -> ConsoleResult<bool> {
        Ok(self
            .store
            .load(&self.account.organisation_id, &self.account.email)?
            .is_some())
    }

    /// The unlocked keyring, or `Locked`.
    pub async fn keyring(&self) -> ConsoleResult<Arc<AccountKeyring>> {
        match &*self.state.read().await {
            SessionState::Unlocked(keyring) => Ok(Arc::clone(keyring)),
            _ => Err(ConsoleError::Locked),
        }
    }

    /// Derives the device key from `password` and opens the local keyring.
    ///
    /// A missing keyring returns `KeyringNotFound` and leaves the session
    /// `Locked`. A wrong password returns `DecryptionFailed` and moves the
    /// session to `Error`; it is never retried here.
    pub async fn unlock(&self, password: &str) -> ConsoleResult<Arc<AccountKeyring>> {
        *self.state.write().await = SessionState::Unlocking;

        let sealed = match self
            .store
            .load(&self.account.organisation_id, &self.account.email)
        {
            Ok(Some(sealed)) => sealed,
            Ok(None) => {
                *self.state.write().await = SessionState::Locked;
                debug!("no local keyring for organisation {}", self.account.organisation_id);
                return Err(ConsoleError::KeyringNotFound {
                    organisation_id: self.account.organisation_id.clone(),
                    email: self.account.email.clone(),
                });
            }
            Err(e) => {
                *self.state.write().await = SessionState::Error(e.to_string());
                return Err(e);
            }
        };

        let opened = device_vault_key(password, &self.account.email, &self.kdf)
            .and_then(|device_key| decrypt_account_keyring(&sealed, &device_key));

        match opened {
            Ok(keyring) => {
                let keyring = Arc::new(keyring);
                *self.state.write().await = SessionState::Unlocked(Arc::clone(&keyring));
                info!("keyring unlocked for organisation {}", self.account.organisation_id);
                Ok(keyring)
            }
            Err(e) => {
                let err = ConsoleError::from(e);
                warn!("keyring unlock failed: {err}");
                *self.state.write().await = SessionState::Error(err.to_string());
                Err(err)
            }
        }
    }

    /// Drops the decrypted keyring.
    pub async fn lock(&self) {
        *self.state.write().await = SessionState::Locked;
        debug!("keyring locked");
    }

    /// Onboarding: creates a keyring, seals it under `password` and unlocks.
    ///
    /// The returned keyring's recovery phrase must be shown to the user once.
    pub async fn setup(&self, password: &str) -> ConsoleResult<Arc<AccountKeyring>> {
        if self.has_local_keyring()? {
            return Err(ConsoleError::InvalidInput(
                "a keyring already exists for this account".into(),
            ));
        }
        let keyring = AccountKeyring::generate()?;
        self.seal_and_unlock(keyring, password).await
    }

    /// Rebuilds the keyring from its recovery phrase and seals it under a
    /// new password, replacing any local copy.
    pub async fn recover(
        &self,
        recovery_phrase: &str,
        new_password: &str,
    ) -> ConsoleResult<Arc<AccountKeyring>> {
        let keyring = AccountKeyring::from_mnemonic(recovery_phrase).map_err(|e| match e {
            CryptoError::KeyDerivation(msg) => ConsoleError::InvalidInput(msg),
            other => ConsoleError::from(other),
        })?;
        info!("keyring recovered from phrase");
        self.seal_and_unlock(keyring, new_password).await
    }

    /// Re-seals the local keyring under a new password. Keys are unchanged.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> ConsoleResult<()> {
        let keyring = self.unlock(old_password).await?;
        let device_key = device_vault_key(new_password, &self.account.email, &self.kdf)?;
        let sealed = encrypt_account_keyring(
            &keyring,
            &device_key,
            &self.account.organisation_id,
            &self.account.email,
        )?;
        self.store.save(&sealed)?;
        info!("keyring re-sealed under new password");
        Ok(())
    }

    async fn seal_and_unlock(
        &self,
        keyring: AccountKeyring,
        password: &str,
    ) -> ConsoleResult<Arc<AccountKeyring>> {
        let device_key = device_vault_key(password, &self.account.email, &self.kdf)?;
        let sealed = encrypt_account_keyring(
            &keyring,
            &device_key,
            &self.account.organisation_id,
            &self.account.email,
        )?;
        self.store.save(&sealed)?;

        let keyring = Arc::new(keyring);
        *self.state.write().await = SessionState::Unlocked(Arc::clone(&keyring));
        Ok(keyring)
    }
}
