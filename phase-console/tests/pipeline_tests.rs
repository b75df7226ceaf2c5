//! End-to-end: onboarding, provisioning, then the unlock-and-decrypt pipeline.

mod support;

use phase_console::{
    ConsoleError, EnvironmentPipeline, MemoryBackend, PrincipalKind, ScopeDistributor,
    SecretInput, SecretService, SessionStatus,
};
use std::sync::Arc;
use support::{onboarded, principal, PASSWORD};

struct World {
    backend: Arc<MemoryBackend>,
    pipeline: EnvironmentPipeline,
}

async fn world() -> World {
    let backend = Arc::new(MemoryBackend::new());
    let (session, alice) = onboarded("alice").await;

    let distributor = ScopeDistributor::new(backend.clone());
    let env = distributor
        .provision_environment("env-1", &[alice])
        .await
        .unwrap();
    let secrets = SecretService::new(backend.clone());
    secrets
        .create_many(
            &env,
            &[
                SecretInput::new("DB_PASSWORD", "s3cr3t"),
                SecretInput::new("DEBUG", "false"),
            ],
        )
        .await
        .unwrap();

    session.lock().await;
    World {
        pipeline: EnvironmentPipeline::new(session, backend.clone()),
        backend,
    }
}

#[tokio::test]
async fn unlock_and_load_decrypts_environment() {
    let w = world().await;
    let loaded = w.pipeline.unlock_and_load(PASSWORD, "env-1").await.unwrap();

    let mut keys: Vec<&str> = loaded.secrets.iter().map(|s| s.key.as_str()).collect();
    keys.sort();
    assert_eq!(keys, vec!["DB_PASSWORD", "DEBUG"]);
    assert_eq!(loaded.keyring.scope_id(), "env-1");
    assert_eq!(w.pipeline.session().status().await, SessionStatus::Unlocked);
}

#[tokio::test]
async fn wrong_password_stops_before_backend() {
    let w = world().await;
    let err = w
        .pipeline
        .unlock_and_load("wrong", "env-1")
        .await
        .unwrap_err();
    assert!(err.is_decryption_failure());
    assert!(w.pipeline.cache().is_empty().await);
}

#[tokio::test]
async fn load_requires_unlocked_session() {
    let w = world().await;
    assert!(matches!(
        w.pipeline.load("env-1").await,
        Err(ConsoleError::Locked)
    ));
}

#[tokio::test]
async fn environment_keyring_is_cached_until_lock() {
    let w = world().await;
    w.pipeline.unlock_and_load(PASSWORD, "env-1").await.unwrap();
    assert_eq!(w.pipeline.cache().len().await, 1);

    w.pipeline.load("env-1").await.unwrap();
    assert_eq!(w.pipeline.cache().len().await, 1);

    w.pipeline.lock().await;
    assert!(w.pipeline.cache().is_empty().await);
    assert!(matches!(
        w.pipeline.load("env-1").await,
        Err(ConsoleError::Locked)
    ));
}

#[tokio::test]
async fn cached_key_not_served_after_session_lock() {
    let w = world().await;
    w.pipeline.unlock_and_load(PASSWORD, "env-1").await.unwrap();

    // Locking the session directly, not through the pipeline.
    w.pipeline.session().lock().await;
    assert!(matches!(
        w.pipeline.environment_keyring("env-1").await,
        Err(ConsoleError::Locked)
    ));
}

#[tokio::test]
async fn environment_without_grant_is_no_access() {
    let w = world().await;
    let (bob, _) = principal("bob", PrincipalKind::User);
    ScopeDistributor::new(w.backend.clone())
        .provision_environment("env-2", &[bob])
        .await
        .unwrap();

    w.pipeline.session().unlock(PASSWORD).await.unwrap();
    assert!(matches!(
        w.pipeline.load("env-2").await,
        Err(ConsoleError::NoAccess(_))
    ));
}

#[tokio::test]
async fn rotated_environment_needs_cache_eviction() {
    let w = world().await;
    let before = w.pipeline.unlock_and_load(PASSWORD, "env-1").await.unwrap();

    let account = w.pipeline.session().keyring().await.unwrap();
    let me = phase_console::Principal {
        id: "alice".into(),
        kind: PrincipalKind::User,
        identity_key: account.identity_key(),
    };
    ScopeDistributor::new(w.backend.clone())
        .rotate_environment(&before.keyring, "alice", &[me])
        .await
        .unwrap();

    assert!(w.pipeline.load("env-1").await.unwrap_err().is_decryption_failure());

    w.pipeline.cache().remove("env-1").await;
    let after = w.pipeline.load("env-1").await.unwrap();
    assert_eq!(after.secrets.len(), 2);
    assert_ne!(after.keyring.identity_key(), before.keyring.identity_key());
}
