//! Console core configuration.

use crate::error::{ConsoleError, ConsoleResult};
use phase_crypto::KdfParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the console core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the Phase backend (e.g., "https://console.phase.dev").
    pub api_base_url: String,

    /// Path of the GraphQL endpoint below `api_base_url`.
    pub graphql_path: String,

    /// HTTP timeout for backend calls (seconds).
    pub request_timeout_secs: u64,

    /// Origin used when building lockbox share links.
    pub lockbox_origin: String,

    /// Directory holding sealed account keyrings.
    pub keyring_dir: PathBuf,

    /// Argon2id cost for the device key.
    pub kdf: KdfParams,

    /// Lifetime of ephemeral user tokens minted for CLI/API snippets (seconds).
    pub user_token_validity_secs: i64,

    /// Re-mint a cached token once less than this much validity remains (seconds).
    pub token_refresh_buffer_secs: i64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://console.phase.dev".to_string(),
            graphql_path: "/graphql/".to_string(),
            request_timeout_secs: 30,
            lockbox_origin: "https://console.phase.dev".to_string(),
            keyring_dir: PathBuf::from(".phase/keyrings"),
            kdf: KdfParams::default(),
            user_token_validity_secs: 300, // 5 minutes
            token_refresh_buffer_secs: 60,
        }
    }
}

impl ConsoleConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> ConsoleResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ConsoleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Full URL of the GraphQL endpoint.
    pub fn graphql_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.graphql_path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> ConsoleResult<()> {
        if self.user_token_validity_secs <= 0 {
            return Err(ConsoleError::Config(
                "user_token_validity_secs must be positive".into(),
            ));
        }
        if self.token_refresh_buffer_secs < 0
            || self.token_refresh_buffer_secs >= self.user_token_validity_secs
        {
            return Err(ConsoleError::Config(
                "token_refresh_buffer_secs must be in [0, user_token_validity_secs)".into(),
            ));
        }
        Ok(())
    }

    /// Creates a config for tests: cheap KDF, local endpoints.
    pub fn test() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            lockbox_origin: "http://localhost:3000".to_string(),
            kdf: KdfParams::fast(),
            ..Self::default()
        }
    }
}
