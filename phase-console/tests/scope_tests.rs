mod support;

use phase_console::secrets::decrypt_secrets;
use phase_console::{
    ConsoleBackend, ConsoleError, MemoryBackend, PersonalSecretOverride, PrincipalKind,
    ScopeDistributor, ScopeKeyring, ScopeKind, SecretInput, SecretService,
};
use std::sync::Arc;
use support::{onboarded, principal};

fn setup() -> (Arc<MemoryBackend>, ScopeDistributor, SecretService) {
    let backend = Arc::new(MemoryBackend::new());
    let distributor = ScopeDistributor::new(backend.clone());
    let secrets = SecretService::new(backend.clone());
    (backend, distributor, secrets)
}

// ── Provisioning ──

#[tokio::test]
async fn provision_wraps_once_per_principal() {
    let (backend, distributor, _) = setup();
    let (alice, _) = principal("alice", PrincipalKind::User);
    let (bob, _) = principal("bob", PrincipalKind::User);

    let env = distributor
        .provision_environment("env-1", &[alice, bob])
        .await
        .unwrap();

    let keys = backend.environment_keys("env-1").await.unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.iter().all(|k| k.identity_key == env.identity_key()));
    // Every copy is distinct ciphertext.
    assert_ne!(keys[0].wrapped_seed, keys[1].wrapped_seed);
    assert!(keys.iter().all(|k| !k.wrapped_seed.contains(&env.seed().to_hex())));
}

#[tokio::test]
async fn each_member_opens_same_keyring() {
    let (_, distributor, _) = setup();
    let (alice, alice_kp) = principal("alice", PrincipalKind::User);
    let (bob, bob_kp) = principal("bob", PrincipalKind::User);

    let env = distributor
        .provision_environment("env-1", &[alice, bob])
        .await
        .unwrap();

    let a = distributor.open_environment("env-1", "alice", &alice_kp).await.unwrap();
    let b = distributor.open_environment("env-1", "bob", &bob_kp).await.unwrap();
    assert_eq!(a.identity_key(), env.identity_key());
    assert_eq!(b.identity_key(), env.identity_key());
    assert_eq!(a.salt(), b.salt());
}

#[tokio::test]
async fn account_keyring_opens_environment() {
    let (_, distributor, _) = setup();
    let (session, alice) = onboarded("alice").await;
    let env = distributor
        .provision_environment("env-1", &[alice])
        .await
        .unwrap();

    let keyring = session.keyring().await.unwrap();
    let opened = distributor
        .open_environment("env-1", "alice", keyring.kx())
        .await
        .unwrap();
    assert_eq!(opened.identity_key(), env.identity_key());
}

#[tokio::test]
async fn non_member_has_no_access() {
    let (_, distributor, _) = setup();
    let (alice, _) = principal("alice", PrincipalKind::User);
    let (_, eve_kp) = principal("eve", PrincipalKind::User);
    distributor.provision_environment("env-1", &[alice]).await.unwrap();

    let err = distributor
        .open_environment("env-1", "eve", &eve_kp)
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::NoAccess(_)));
}

#[tokio::test]
async fn provision_app_registers_wrapped_keys() {
    let (backend, distributor, _) = setup();
    let (owner, owner_kp) = principal("owner", PrincipalKind::User);

    let app = distributor.provision_app("app-1", &[owner]).await.unwrap();
    let stored = backend.app_keys("app-1").await.unwrap();
    assert_eq!(stored.identity_key, app.identity_key());
    assert_eq!(stored.wrapped_keys.len(), 1);

    let opened = ScopeKeyring::unwrap(&stored.wrapped_keys[0], &owner_kp).unwrap();
    assert_eq!(opened.kind(), ScopeKind::App);
    assert_eq!(opened.identity_key(), app.identity_key());
}

#[tokio::test]
async fn rotate_app_replaces_keys() {
    let (backend, distributor, _) = setup();
    let (owner, _) = principal("owner", PrincipalKind::User);
    let first = distributor.provision_app("app-1", &[owner.clone()]).await.unwrap();
    let second = distributor.rotate_app("app-1", &[owner]).await.unwrap();

    assert_ne!(first.identity_key(), second.identity_key());
    assert_eq!(
        backend.app_keys("app-1").await.unwrap().identity_key,
        second.identity_key()
    );
}

#[tokio::test]
async fn rotate_unknown_app_fails() {
    let (_, distributor, _) = setup();
    let (owner, _) = principal("owner", PrincipalKind::User);
    assert!(matches!(
        distributor.rotate_app("nope", &[owner]).await,
        Err(ConsoleError::NotFound(_))
    ));
}

// ── Grant / revoke ──

#[tokio::test]
async fn grant_gives_new_member_access() {
    let (_, distributor, _) = setup();
    let (alice, _) = principal("alice", PrincipalKind::User);
    let (svc, svc_kp) = principal("svc-1", PrincipalKind::ServiceAccount);

    let env = distributor.provision_environment("env-1", &[alice]).await.unwrap();
    distributor.grant(&env, &svc).await.unwrap();

    let opened = distributor.open_environment("env-1", "svc-1", &svc_kp).await.unwrap();
    assert_eq!(opened.identity_key(), env.identity_key());
}

#[tokio::test]
async fn grant_rejects_app_keyring() {
    let (_, distributor, _) = setup();
    let (alice, _) = principal("alice", PrincipalKind::User);
    let app = ScopeKeyring::provision(ScopeKind::App, "app-1");
    assert!(matches!(
        distributor.grant(&app, &alice).await,
        Err(ConsoleError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn revoke_without_rotation_leaves_old_copy_usable() {
    let (backend, distributor, secrets) = setup();
    let (alice, _) = principal("alice", PrincipalKind::User);
    let (bob, bob_kp) = principal("bob", PrincipalKind::User);

    let env = distributor
        .provision_environment("env-1", &[alice, bob])
        .await
        .unwrap();
    // Bob keeps his unwrapped copy.
    let bobs_copy = distributor.open_environment("env-1", "bob", &bob_kp).await.unwrap();

    distributor.revoke("env-1", "bob").await.unwrap();
    assert!(matches!(
        distributor.open_environment("env-1", "bob", &bob_kp).await,
        Err(ConsoleError::NoAccess(_))
    ));

    // Without a rotation, data written afterwards is still readable by the retained copy.
    secrets
        .create(&env, &SecretInput::new("API_KEY", "after-revoke"))
        .await
        .unwrap();
    let stored = backend.stored_secrets("env-1").await;
    let read = decrypt_secrets(&stored, &bobs_copy).unwrap();
    assert_eq!(read[0].value, "after-revoke");
}

#[tokio::test]
async fn revoke_unknown_principal_fails() {
    let (_, distributor, _) = setup();
    let (alice, _) = principal("alice", PrincipalKind::User);
    distributor.provision_environment("env-1", &[alice]).await.unwrap();
    assert!(matches!(
        distributor.revoke("env-1", "ghost").await,
        Err(ConsoleError::NotFound(_))
    ));
}

// ── Rotation ──

#[tokio::test]
async fn rotation_locks_out_retained_copy() {
    let (backend, distributor, secrets) = setup();
    let (alice, alice_kp) = principal("alice", PrincipalKind::User);
    let (bob, bob_kp) = principal("bob", PrincipalKind::User);

    let env = distributor
        .provision_environment("env-1", &[alice.clone(), bob])
        .await
        .unwrap();
    let bobs_copy = distributor.open_environment("env-1", "bob", &bob_kp).await.unwrap();

    let id = secrets
        .create(&env, &SecretInput::new("DB_PASSWORD", "v1"))
        .await
        .unwrap();
    secrets
        .update(&env, &id, &SecretInput::new("DB_PASSWORD", "v2"))
        .await
        .unwrap();

    distributor.revoke("env-1", "bob").await.unwrap();
    let rotated = distributor
        .rotate_environment(&env, "alice", &[alice])
        .await
        .unwrap();
    assert_ne!(rotated.identity_key(), env.identity_key());

    let stored = backend.stored_secrets("env-1").await;
    assert!(decrypt_secrets(&stored, &bobs_copy)
        .unwrap_err()
        .is_decryption_failure());

    let reopened = distributor
        .open_environment("env-1", "alice", &alice_kp)
        .await
        .unwrap();
    let listed = secrets.list(&reopened, "alice").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].value, "v2");
    assert_eq!(listed[0].version, 2);
    assert_eq!(listed[0].history[0].value, "v1");
}

#[tokio::test]
async fn rotation_keeps_remaining_members_readable() {
    let (_, distributor, secrets) = setup();
    let (alice, alice_kp) = principal("alice", PrincipalKind::User);
    let (bob, bob_kp) = principal("bob", PrincipalKind::User);

    let env = distributor
        .provision_environment("env-1", &[alice.clone(), bob.clone()])
        .await
        .unwrap();
    let id = secrets
        .create(&env, &SecretInput::new("API_URL", "https://prod"))
        .await
        .unwrap();
    for (holder, value) in [("alice", "https://alice.local"), ("bob", "https://bob.local")] {
        secrets
            .set_override(
                &env,
                holder,
                &PersonalSecretOverride {
                    secret_id: id.clone(),
                    value: value.into(),
                    is_active: true,
                },
            )
            .await
            .unwrap();
    }

    distributor
        .rotate_environment(&env, "alice", &[alice, bob])
        .await
        .unwrap();

    let bobs = distributor.open_environment("env-1", "bob", &bob_kp).await.unwrap();
    let listed = secrets.list(&bobs, "bob").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].value, "https://prod");
    assert!(listed[0].personal_override.is_none());

    let alices = distributor
        .open_environment("env-1", "alice", &alice_kp)
        .await
        .unwrap();
    let listed = secrets.list(&alices, "alice").await.unwrap();
    let kept = listed[0].personal_override.as_ref().unwrap();
    assert_eq!(kept.value, "https://alice.local");
    assert!(kept.is_active);
}

#[tokio::test]
async fn rotation_removes_keys_of_dropped_principals() {
    let (backend, distributor, _) = setup();
    let (alice, _) = principal("alice", PrincipalKind::User);
    let (bob, _) = principal("bob", PrincipalKind::User);

    let env = distributor
        .provision_environment("env-1", &[alice.clone(), bob])
        .await
        .unwrap();
    distributor
        .rotate_environment(&env, "alice", &[alice])
        .await
        .unwrap();

    let keys = backend.environment_keys("env-1").await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].principal_id, "alice");
}

#[tokio::test]
async fn rotator_must_keep_access() {
    let (_, distributor, _) = setup();
    let (alice, _) = principal("alice", PrincipalKind::User);
    let (bob, _) = principal("bob", PrincipalKind::User);
    let env = distributor
        .provision_environment("env-1", &[alice, bob.clone()])
        .await
        .unwrap();

    assert!(matches!(
        distributor.rotate_environment(&env, "alice", &[bob]).await,
        Err(ConsoleError::InvalidInput(_))
    ));
}
