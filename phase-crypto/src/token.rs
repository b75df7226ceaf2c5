//! Bearer token string format.
//!
//! `pss:v1:<raw_token>:<share0>:<wrap_key>`, every component 64 lower-hex
//! characters. The raw token authenticates the holder, `share0` is the
//! client half of the token's private key and `wrap_key` unwraps the
//! server-held half.

use crate::digest::token_lookup_digest;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{DerivedKey, random_32};
use crate::shares::KeyShare;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TOKEN_PREFIX: &str = "pss";
pub const TOKEN_VERSION: u32 = 1;

/// Who a bearer token authenticates as. Controls how it is presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    User,
    Service,
}

impl TokenKind {
    /// Word following `Bearer` in the `Authorization` header.
    pub fn header_scheme(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Service => "Service",
        }
    }

    /// Environment variable the CLI reads the token from.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::User => "PHASE_USER_TOKEN",
            Self::Service => "PHASE_SERVICE_TOKEN",
        }
    }
}

/// Generates a random raw token component.
pub fn new_raw_token() -> String {
    hex::encode(random_32())
}

/// A parsed `pss:` bearer token.
#[derive(Clone)]
pub struct BearerToken {
    pub version: u32,
    pub raw_token: String,
    pub share: KeyShare,
    pub wrap_key: DerivedKey,
}

impl BearerToken {
    pub fn new(raw_token: String, share: KeyShare, wrap_key: DerivedKey) -> Self {
        Self {
            version: TOKEN_VERSION,
            raw_token,
            share,
            wrap_key,
        }
    }

    /// Digest the backend indexes this token under.
    pub fn lookup_digest(&self) -> String {
        token_lookup_digest(&self.raw_token)
    }

    /// `Authorization` header value, e.g. `Bearer User pss:v1:...`.
    pub fn auth_header(&self, kind: TokenKind) -> String {
        format!("Bearer {} {self}", kind.header_scheme())
    }

    /// Shell assignment for CLI snippets, e.g. `PHASE_SERVICE_TOKEN=pss:v1:...`.
    pub fn env_assignment(&self, kind: TokenKind) -> String {
        format!("{}={self}", kind.env_var())
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{TOKEN_PREFIX}:v{}:{}:{}:{}",
            self.version,
            self.raw_token,
            self.share.to_hex(),
            self.wrap_key.to_hex()
        )
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("version", &self.version)
            .field("lookup_digest", &self.lookup_digest())
            .finish_non_exhaustive()
    }
}

impl FromStr for BearerToken {
    type Err = CryptoError;

    fn from_str(s: &str) -> CryptoResult<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let [prefix, version, raw_token, share, wrap_key] = parts.as_slice() else {
            return Err(CryptoError::InvalidFormat(format!(
                "expected 5 token segments, got {}",
                parts.len()
            )));
        };

        if *prefix != TOKEN_PREFIX {
            return Err(CryptoError::InvalidFormat(format!("unknown token prefix {prefix:?}")));
        }
        let version: u32 = version
            .strip_prefix('v')
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| CryptoError::InvalidFormat(format!("bad token version {version:?}")))?;
        if version != TOKEN_VERSION {
            return Err(CryptoError::InvalidFormat(format!(
                "unsupported token version v{version}"
            )));
        }
        if raw_token.len() != 64 || !raw_token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CryptoError::InvalidFormat("raw token must be 64 hex chars".into()));
        }

        Ok(Self {
            version,
            raw_token: raw_token.to_ascii_lowercase(),
            share: KeyShare::from_hex(share)?,
            wrap_key: DerivedKey::from_hex(wrap_key)?,
        })
    }
}
