//! Lockboxes: bounded-view encrypted shares of secret plaintext.
//!
//! The payload is sealed under a keypair regenerated from a random seed.
//! The seed only ever appears in the share URL fragment, which browsers do
//! not send to the server. View and expiry limits are enforced by the
//! backend as access limits; they do not protect a recipient who already
//! fetched the ciphertext.

use crate::backend::ConsoleBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::types::LockboxInput;
use chrono::{DateTime, Utc};
use phase_crypto::{decrypt_asymmetric, encrypt_asymmetric, keyring_from_seed, new_seed, Seed};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const LOCKBOX_PATH: &str = "/lockbox/";

/// One secret inside a lockbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockboxSecret {
    pub key: String,
    pub value: String,
}

/// Plaintext contents of a lockbox.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockboxPayload {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub secrets: Vec<LockboxSecret>,
}

/// A created lockbox. `url` embeds the seed; hand it to the recipient only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockboxLink {
    pub id: String,
    pub url: String,
}

pub fn new_box_seed() -> Seed {
    new_seed()
}

/// Seals `payload` as JSON under the keypair owned by `seed`.
pub fn encrypt_box(payload: &LockboxPayload, seed: &Seed) -> ConsoleResult<String> {
    let keypair = keyring_from_seed(seed);
    let json = serde_json::to_string(payload)?;
    Ok(encrypt_asymmetric(&json, &keypair.public)?)
}

pub fn open_box(ciphertext: &str, seed: &Seed) -> ConsoleResult<LockboxPayload> {
    let keypair = keyring_from_seed(seed);
    let json = decrypt_asymmetric(ciphertext, &keypair.secret, &keypair.public)?;
    Ok(serde_json::from_str(&json)?)
}

/// `<origin>/lockbox/<id>#<seed hex>`.
pub fn share_url(origin: &str, lockbox_id: &str, seed: &Seed) -> String {
    format!(
        "{}{LOCKBOX_PATH}{lockbox_id}#{}",
        origin.trim_end_matches('/'),
        seed.to_hex()
    )
}

/// Splits a share URL into lockbox id and seed.
pub fn parse_share_url(url: &str) -> ConsoleResult<(String, Seed)> {
    let (location, fragment) = url
        .trim()
        .split_once('#')
        .ok_or_else(|| ConsoleError::InvalidInput("lockbox link has no key fragment".into()))?;
    let (_, id) = location
        .rsplit_once(LOCKBOX_PATH)
        .ok_or_else(|| ConsoleError::InvalidInput("not a lockbox link".into()))?;
    let id = id.trim_end_matches('/');
    if id.is_empty() || id.contains('/') {
        return Err(ConsoleError::InvalidInput("lockbox link has no id".into()));
    }
    let seed = Seed::from_hex(fragment)
        .map_err(|e| ConsoleError::InvalidInput(format!("lockbox key fragment: {e}")))?;
    Ok((id.to_string(), seed))
}

/// Creates and opens lockboxes through the backend.
pub struct LockboxService {
    backend: Arc<dyn ConsoleBackend>,
    origin: String,
}

impl LockboxService {
    pub fn new(backend: Arc<dyn ConsoleBackend>, origin: impl Into<String>) -> Self {
        Self {
            backend,
            origin: origin.into(),
        }
    }

    /// Seals `payload` and stores only the ciphertext and its limits.
    pub async fn create(
        &self,
        payload: &LockboxPayload,
        allowed_views: Option<u32>,
        expires_at: Option<DateTime<Utc>>,
    ) -> ConsoleResult<LockboxLink> {
        if allowed_views == Some(0) {
            return Err(ConsoleError::InvalidInput(
                "allowed_views must be at least 1".into(),
            ));
        }
        let seed = new_box_seed();
        let id = self
            .backend
            .create_lockbox(&LockboxInput {
                data: encrypt_box(payload, &seed)?,
                allowed_views,
                expires_at,
            })
            .await?;

        info!("created lockbox {id} (views: {allowed_views:?})");
        Ok(LockboxLink {
            url: share_url(&self.origin, &id, &seed),
            id,
        })
    }

    /// Fetches (counting a view) and decrypts a lockbox from its share URL.
    pub async fn open(&self, url: &str) -> ConsoleResult<LockboxPayload> {
        let (id, seed) = parse_share_url(url)?;
        let stored = self.backend.lockbox(&id).await?;
        debug!("opened lockbox {id}, view {}", stored.views);
        open_box(&stored.data, &seed)
    }
}
