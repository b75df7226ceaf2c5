//! Split-key bearer tokens.
//!
//! A token owns an X25519 keypair generated from a fresh seed. The private
//! key is split 2-of-2: one share travels inside the token string, the
//! other is wrapped under a key that also only travels inside the token,
//! and the wrapped share is stored by the backend. Neither side alone can
//! rebuild the private key.

use crate::backend::ConsoleBackend;
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::types::{NewTokenRecord, Principal, PrincipalKind, TokenRecord};
use chrono::{DateTime, Duration, Utc};
use phase_crypto::{
    combine_shares, keyring_from_seed, new_raw_token, new_seed, new_wrap_key, split_secret,
    unwrap_key_share, wrap_key_share, BearerToken, ScopeKeypair, TokenKind,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A freshly minted token. The token string is shown to the user once.
#[derive(Clone, Debug)]
pub struct MintedToken {
    pub kind: TokenKind,
    pub record: TokenRecord,
    pub token: BearerToken,
}

impl MintedToken {
    /// The token as a principal, for granting it environment access.
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.record.id.clone(),
            kind: PrincipalKind::Token,
            identity_key: self.record.identity_key.clone(),
        }
    }

    pub fn auth_header(&self) -> String {
        self.token.auth_header(self.kind)
    }
}

/// Keypair rebuilt from a token and the backend's share.
#[derive(Clone, Debug)]
pub struct TokenKeypair {
    pub token_id: String,
    pub keypair: ScopeKeypair,
}

/// Mints, reconstructs and revokes tokens for one organisation.
pub struct TokenMinter {
    backend: Arc<dyn ConsoleBackend>,
    organisation_id: String,
}

impl TokenMinter {
    pub fn new(backend: Arc<dyn ConsoleBackend>, organisation_id: impl Into<String>) -> Self {
        Self {
            backend,
            organisation_id: organisation_id.into(),
        }
    }

    /// Creates a token and registers its public half with the backend.
    pub async fn mint(
        &self,
        kind: TokenKind,
        name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> ConsoleResult<MintedToken> {
        let keypair = keyring_from_seed(&new_seed());
        let [held, stored] = split_secret(&keypair.secret_bytes());
        let wrap_key = new_wrap_key();
        let wrapped_key_share = wrap_key_share(&stored, &wrap_key)?;
        let token = BearerToken::new(new_raw_token(), held, wrap_key);

        let record = self
            .backend
            .create_token(&NewTokenRecord {
                organisation_id: self.organisation_id.clone(),
                name: name.to_string(),
                kind,
                identity_key: keypair.public_hex(),
                token_digest: token.lookup_digest(),
                wrapped_key_share,
                expires_at,
            })
            .await?;

        info!("minted {kind:?} token {} ({name})", record.id);
        Ok(MintedToken { kind, record, token })
    }

    /// Rebuilds the token's private key.
    ///
    /// The backend refuses the share once the token is expired or revoked.
    pub async fn reconstruct(&self, token: &BearerToken) -> ConsoleResult<TokenKeypair> {
        let share = self
            .backend
            .wrapped_key_share(&token.lookup_digest())
            .await?;
        let server_share = unwrap_key_share(&share.wrapped_key_share, &token.wrap_key)?;
        let keypair = ScopeKeypair::from_secret_bytes(combine_shares(&token.share, &server_share));

        if keypair.public_hex() != share.identity_key {
            return Err(ConsoleError::DecryptionFailed(format!(
                "shares of token {} do not rebuild its identity key",
                share.token_id
            )));
        }
        debug!("reconstructed keypair for token {}", share.token_id);
        Ok(TokenKeypair {
            token_id: share.token_id,
            keypair,
        })
    }

    pub async fn revoke(&self, token_id: &str) -> ConsoleResult<()> {
        self.backend.revoke_token(token_id).await?;
        info!("revoked token {token_id}");
        Ok(())
    }
}

struct CachedToken {
    minted: MintedToken,
    expires_at: DateTime<Utc>,
}

/// Short-lived user token for CLI/API snippets, re-minted before expiry.
pub struct EphemeralTokenCache {
    minter: Arc<TokenMinter>,
    validity: Duration,
    refresh_buffer: Duration,
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl EphemeralTokenCache {
    pub fn new(minter: Arc<TokenMinter>, config: &ConsoleConfig) -> Self {
        Self {
            minter,
            validity: Duration::seconds(config.user_token_validity_secs),
            refresh_buffer: Duration::seconds(config.token_refresh_buffer_secs),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// A token with more than the refresh buffer of validity left.
    pub async fn token(&self) -> ConsoleResult<MintedToken> {
        self.token_at(Utc::now()).await
    }

    /// As [`token`](Self::token), evaluated at `now`.
    pub async fn token_at(&self, now: DateTime<Utc>) -> ConsoleResult<MintedToken> {
        {
            let cached = self.cached.read().await;
            if let Some(minted) = self.usable(cached.as_ref(), now) {
                return Ok(minted);
            }
        }

        // Slow path: re-check under the write lock so concurrent callers
        // share one mint.
        let mut cached = self.cached.write().await;
        if let Some(minted) = self.usable(cached.as_ref(), now) {
            return Ok(minted);
        }
        if cached.is_some() {
            debug!(
                "ephemeral token expiring within {}s, re-minting",
                self.refresh_buffer.num_seconds()
            );
        }
        self.mint_into(&mut cached, now).await
    }

    /// Mints a replacement regardless of the cached token's validity.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> ConsoleResult<MintedToken> {
        let mut cached = self.cached.write().await;
        self.mint_into(&mut cached, now).await
    }

    fn usable(&self, cached: Option<&CachedToken>, now: DateTime<Utc>) -> Option<MintedToken> {
        cached
            .filter(|c| c.expires_at - now > self.refresh_buffer)
            .map(|c| c.minted.clone())
    }

    async fn mint_into(
        &self,
        slot: &mut Option<CachedToken>,
        now: DateTime<Utc>,
    ) -> ConsoleResult<MintedToken> {
        let expires_at = now + self.validity;
        let minted = self
            .minter
            .mint(TokenKind::User, "ephemeral", Some(expires_at))
            .await
            .map_err(|e| {
                warn!("ephemeral token mint failed: {e}");
                e
            })?;

        *slot = Some(CachedToken {
            minted: minted.clone(),
            expires_at,
        });
        Ok(minted)
    }

    /// Drops the cached token (on logout or organisation change).
    pub async fn clear(&self) {
        *self.cached.write().await = None;
    }

    pub async fn has_valid_token_at(&self, now: DateTime<Utc>) -> bool {
        self.usable(self.cached.read().await.as_ref(), now).is_some()
    }
}
