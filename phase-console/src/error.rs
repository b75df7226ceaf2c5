//! Console error types.

use thiserror::Error;

/// Result type for console workflows.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Message shown to the user when a keyring or wrapped key cannot be opened.
pub const DECRYPT_FAILED_MESSAGE: &str = "Failed to decrypt keys";

/// Errors that can occur in console workflows.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// No sealed keyring is stored locally for this account. Start
    /// onboarding or recovery; retrying the password will not help.
    #[error("no local keyring for {email} in organisation {organisation_id}")]
    KeyringNotFound {
        organisation_id: String,
        email: String,
    },

    /// Wrong password, corrupted wrapped data or a key mismatch.
    #[error("Failed to decrypt keys: {0}")]
    DecryptionFailed(String),

    #[error("keyring is locked")]
    Locked,

    #[error("no environment key for this principal: {0}")]
    NoAccess(String),

    #[error("token expired")]
    TokenExpired,

    #[error("lockbox unavailable: {0}")]
    LockboxUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("keyring storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("crypto error: {0}")]
    Crypto(phase_crypto::CryptoError),
}

impl From<phase_crypto::CryptoError> for ConsoleError {
    fn from(err: phase_crypto::CryptoError) -> Self {
        use phase_crypto::CryptoError;
        match err {
            CryptoError::Decryption(msg) => Self::DecryptionFailed(msg),
            CryptoError::KeyMismatch => Self::DecryptionFailed(err.to_string()),
            other => Self::Crypto(other),
        }
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl ConsoleError {
    /// True when re-prompting for the sudo password is the right recovery.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::DecryptionFailed(_))
    }
}
