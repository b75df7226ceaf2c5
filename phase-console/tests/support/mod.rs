//! Shared test helpers.

#![allow(dead_code)]

use phase_console::{
    Account, KeyringSession, MemoryKeyringStore, Principal, PrincipalKind,
};
use phase_crypto::{keyring_from_seed, new_seed, KdfParams, ScopeKeypair};
use std::sync::Arc;

pub const ORG_ID: &str = "org-1";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn account(user_id: &str) -> Account {
    Account {
        organisation_id: ORG_ID.into(),
        email: format!("{user_id}@phase.test"),
        user_id: user_id.into(),
    }
}

/// A locked session backed by an empty in-memory store.
pub fn session(user_id: &str) -> KeyringSession {
    KeyringSession::new(
        account(user_id),
        Arc::new(MemoryKeyringStore::new()),
        KdfParams::fast(),
    )
}

/// A session that has completed onboarding and is unlocked.
pub async fn onboarded(user_id: &str) -> (KeyringSession, Principal) {
    let session = session(user_id);
    let keyring = session
        .setup(PASSWORD)
        .await
        .expect("onboarding must succeed");
    let principal = Principal {
        id: user_id.into(),
        kind: PrincipalKind::User,
        identity_key: keyring.identity_key(),
    };
    (session, principal)
}

/// A principal with a throwaway keypair.
pub fn principal(id: &str, kind: PrincipalKind) -> (Principal, ScopeKeypair) {
    let keypair = keyring_from_seed(&new_seed());
    (
        Principal {
            id: id.into(),
            kind,
            identity_key: keypair.public_hex(),
        },
        keypair,
    )
}
