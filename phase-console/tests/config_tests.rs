use phase_console::ConsoleConfig;
use phase_crypto::KdfParams;
use std::path::PathBuf;

#[test]
fn default_api_base_url() {
    let config = ConsoleConfig::default();
    assert_eq!(config.api_base_url, "https://console.phase.dev");
}

#[test]
fn default_graphql_url() {
    let config = ConsoleConfig::default();
    assert_eq!(config.graphql_url(), "https://console.phase.dev/graphql/");
}

#[test]
fn default_token_validity_is_five_minutes() {
    let config = ConsoleConfig::default();
    assert_eq!(config.user_token_validity_secs, 300);
    assert_eq!(config.token_refresh_buffer_secs, 60);
}

#[test]
fn default_kdf_is_production_strength() {
    let config = ConsoleConfig::default();
    assert_eq!(config.kdf, KdfParams::default());
    assert!(config.kdf.memory_kib >= 64 * 1024);
}

#[test]
fn test_config_uses_fast_kdf() {
    let config = ConsoleConfig::test();
    assert_eq!(config.kdf, KdfParams::fast());
    assert!(config.validate().is_ok());
}

#[test]
fn toml_overrides_selected_fields() {
    let config = ConsoleConfig::from_toml_str(
        r#"
        api_base_url = "https://phase.internal"
        keyring_dir = "/var/lib/phase"
        user_token_validity_secs = 600

        [kdf]
        memory_kib = 2048
        iterations = 2
        parallelism = 1
        "#,
    )
    .unwrap();

    assert_eq!(config.api_base_url, "https://phase.internal");
    assert_eq!(config.keyring_dir, PathBuf::from("/var/lib/phase"));
    assert_eq!(config.user_token_validity_secs, 600);
    assert_eq!(config.kdf.memory_kib, 2048);
    // Untouched fields keep defaults.
    assert_eq!(config.graphql_path, "/graphql/");
    assert_eq!(config.token_refresh_buffer_secs, 60);
}

#[test]
fn empty_toml_is_default() {
    assert_eq!(ConsoleConfig::from_toml_str("").unwrap(), ConsoleConfig::default());
}

#[test]
fn invalid_toml_rejected() {
    let err = ConsoleConfig::from_toml_str("api_base_url = ").unwrap_err();
    assert!(err.to_string().starts_with("invalid configuration:"));
}

#[test]
fn non_positive_validity_rejected() {
    assert!(ConsoleConfig::from_toml_str("user_token_validity_secs = 0").is_err());
}

#[test]
fn serialization_roundtrip() {
    let config = ConsoleConfig::test();
    let json = serde_json::to_string(&config).unwrap();
    let back: ConsoleConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(config, back);
}

#[test]
fn init_logging_is_idempotent() {
    phase_console::init_logging();
    phase_console::init_logging();
    tracing::info!("logging initialised twice");
}
