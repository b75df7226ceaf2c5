use phase_console::ConsoleError;
use phase_crypto::CryptoError;

#[test]
fn keyring_not_found_display() {
    let err = ConsoleError::KeyringNotFound {
        organisation_id: "org-1".into(),
        email: "dev@phase.test".into(),
    };
    assert_eq!(
        err.to_string(),
        "no local keyring for dev@phase.test in organisation org-1"
    );
    assert!(!err.is_decryption_failure());
}

#[test]
fn decryption_failed_display() {
    let err = ConsoleError::DecryptionFailed("wrong key or tampered data".into());
    assert_eq!(
        err.to_string(),
        "Failed to decrypt keys: wrong key or tampered data"
    );
    assert!(err.is_decryption_failure());
}

#[test]
fn locked_display() {
    assert_eq!(ConsoleError::Locked.to_string(), "keyring is locked");
}

#[test]
fn token_expired_display() {
    assert_eq!(ConsoleError::TokenExpired.to_string(), "token expired");
}

#[test]
fn lockbox_unavailable_display() {
    let err = ConsoleError::LockboxUnavailable("box-1 expired".into());
    assert_eq!(err.to_string(), "lockbox unavailable: box-1 expired");
}

#[test]
fn graphql_error_display() {
    let err = ConsoleError::GraphQl("validation failed".into());
    assert_eq!(err.to_string(), "GraphQL error: validation failed");
}

#[test]
fn api_error_display() {
    let err = ConsoleError::Api("connection refused".into());
    assert_eq!(err.to_string(), "API request failed: connection refused");
}

#[test]
fn not_found_display() {
    let err = ConsoleError::NotFound("secret xyz".into());
    assert_eq!(err.to_string(), "not found: secret xyz");
}

#[test]
fn config_error_display() {
    let err = ConsoleError::Config("bad value".into());
    assert_eq!(err.to_string(), "invalid configuration: bad value");
}

#[test]
fn crypto_decryption_becomes_decryption_failed() {
    let err: ConsoleError = CryptoError::Decryption("tag mismatch".into()).into();
    assert!(matches!(err, ConsoleError::DecryptionFailed(ref m) if m == "tag mismatch"));
}

#[test]
fn key_mismatch_becomes_decryption_failed() {
    let err: ConsoleError = CryptoError::KeyMismatch.into();
    assert!(err.is_decryption_failure());
    assert_eq!(
        err.to_string(),
        "Failed to decrypt keys: private key does not match public key"
    );
}

#[test]
fn other_crypto_errors_stay_crypto() {
    let err: ConsoleError = CryptoError::InvalidFormat("bad hex".into()).into();
    assert!(matches!(err, ConsoleError::Crypto(_)));
    assert!(!err.is_decryption_failure());
}

#[test]
fn io_error_becomes_storage() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: ConsoleError = io.into();
    assert_eq!(err.to_string(), "keyring storage error: denied");
}

#[test]
fn serde_error_converts() {
    let bad: Result<serde_json::Value, _> = serde_json::from_str("{not json");
    let err: ConsoleError = bad.unwrap_err().into();
    assert!(err.to_string().starts_with("serialization error:"));
}
