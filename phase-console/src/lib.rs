//! Client-side key management workflows for the Phase console.
//!
//! Builds on `phase-crypto` to provide:
//! - Keyring session lifecycle (unlock, lock, onboarding, recovery)
//! - Organisation/app/environment key provisioning, grants and rotation
//! - Secret encryption with keyed digests and personal overrides
//! - Split-key user and service tokens, with an ephemeral token cache
//! - Lockboxes shared by URL fragment
//! - A GraphQL backend client and an in-memory backend
//!
//! Only ciphertext, wrapped keys, digests and public keys are ever handed
//! to a [`ConsoleBackend`] or a [`KeyringStore`].

pub mod backend;
pub mod config;
pub mod error;
pub mod graphql;
pub mod lockbox;
pub mod memory;
pub mod pipeline;
pub mod scope;
pub mod secrets;
pub mod session;
pub mod store;
pub mod tokens;
pub mod types;

pub use backend::ConsoleBackend;
pub use config::ConsoleConfig;
pub use error::{ConsoleError, ConsoleResult};
pub use graphql::GraphQlClient;
pub use lockbox::{LockboxLink, LockboxPayload, LockboxSecret, LockboxService};
pub use memory::MemoryBackend;
pub use pipeline::{EnvironmentKeyCache, EnvironmentPipeline, LoadedEnvironment};
pub use scope::{ScopeDistributor, ScopeKeyring};
pub use secrets::SecretService;
pub use session::{Account, KeyringSession, SessionState, SessionStatus};
pub use store::{FileKeyringStore, KeyringStore, MemoryKeyringStore};
pub use tokens::{EphemeralTokenCache, MintedToken, TokenKeypair, TokenMinter};
pub use types::*;

/// Installs a stderr `tracing` subscriber filtered by `RUST_LOG` (default
/// `info`). Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
