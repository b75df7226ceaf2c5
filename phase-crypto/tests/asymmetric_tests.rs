use phase_crypto::{
    decrypt_asymmetric, encrypt_asymmetric, keyring_from_seed, new_seed, open, seal,
    CryptoError, SealedEnvelope, Seed,
};

#[test]
fn seed_regenerates_identical_keypair() {
    let seed = new_seed();
    let a = keyring_from_seed(&seed);
    let b = keyring_from_seed(&seed);
    assert_eq!(a.public_bytes(), b.public_bytes());
    assert_eq!(a.secret_bytes(), b.secret_bytes());
}

#[test]
fn seed_hex_roundtrip_regenerates_keypair() {
    let seed = new_seed();
    let restored = Seed::from_hex(&seed.to_hex()).unwrap();
    assert_eq!(
        keyring_from_seed(&seed).public_hex(),
        keyring_from_seed(&restored).public_hex()
    );
}

#[test]
fn different_seeds_give_different_keypairs() {
    let a = keyring_from_seed(&new_seed());
    let b = keyring_from_seed(&new_seed());
    assert_ne!(a.public_bytes(), b.public_bytes());
    // Public and secret halves must differ
    assert_ne!(a.public_bytes(), a.secret_bytes());
}

#[test]
fn encrypt_decrypt_roundtrip() {
    let kp = keyring_from_seed(&new_seed());
    let ct = encrypt_asymmetric("s3cr3t", &kp.public).unwrap();
    assert_eq!(decrypt_asymmetric(&ct, &kp.secret, &kp.public).unwrap(), "s3cr3t");
}

#[test]
fn empty_plaintext_roundtrips() {
    let kp = keyring_from_seed(&new_seed());
    let ct = encrypt_asymmetric("", &kp.public).unwrap();
    assert_eq!(decrypt_asymmetric(&ct, &kp.secret, &kp.public).unwrap(), "");
}

#[test]
fn wrong_recipient_key_fails_to_open() {
    let target = keyring_from_seed(&new_seed());
    let wrong = keyring_from_seed(&new_seed());

    let ct = encrypt_asymmetric("value", &target.public).unwrap();
    let err = decrypt_asymmetric(&ct, &wrong.secret, &wrong.public).unwrap_err();
    assert!(matches!(err, CryptoError::Decryption(_)));
}

#[test]
fn tampered_ciphertext_fails() {
    let kp = keyring_from_seed(&new_seed());
    let mut envelope = seal(b"value", &kp.public).unwrap();
    if let Some(byte) = envelope.ciphertext.first_mut() {
        *byte ^= 0xFF;
    }
    assert!(open(&envelope, &kp.secret).is_err());
}

#[test]
fn tampered_nonce_fails() {
    let kp = keyring_from_seed(&new_seed());
    let mut envelope = seal(b"value", &kp.public).unwrap();
    envelope.nonce[0] ^= 0xFF;
    assert!(open(&envelope, &kp.secret).is_err());
}

#[test]
fn each_encryption_produces_different_ciphertext() {
    let kp = keyring_from_seed(&new_seed());
    let c1 = encrypt_asymmetric("same", &kp.public).unwrap();
    let c2 = encrypt_asymmetric("same", &kp.public).unwrap();

    // Different ephemeral keys and nonces
    assert_ne!(c1, c2);
    let e1 = SealedEnvelope::from_wire(&c1).unwrap();
    let e2 = SealedEnvelope::from_wire(&c2).unwrap();
    assert_ne!(e1.ephemeral_public_key, e2.ephemeral_public_key);

    assert_eq!(decrypt_asymmetric(&c1, &kp.secret, &kp.public).unwrap(), "same");
    assert_eq!(decrypt_asymmetric(&c2, &kp.secret, &kp.public).unwrap(), "same");
}

#[test]
fn wire_roundtrip_preserves_envelope() {
    let kp = keyring_from_seed(&new_seed());
    let envelope = seal(b"wire", &kp.public).unwrap();
    let parsed = SealedEnvelope::from_wire(&envelope.to_wire()).unwrap();
    assert_eq!(parsed, envelope);
}

#[test]
fn malformed_wire_strings_rejected() {
    let kp = keyring_from_seed(&new_seed());
    for bad in ["", "ph:v1:abc", "xx:v1:00:AAAA", "ph:v1:zz:AAAA", "ph:v1:a:b:c"] {
        let err = decrypt_asymmetric(bad, &kp.secret, &kp.public).unwrap_err();
        assert!(
            matches!(err, CryptoError::InvalidFormat(_) | CryptoError::InvalidKeyLength { .. }),
            "{bad:?} gave {err:?}"
        );
    }
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn encrypt_decrypt_always_roundtrips(plaintext in ".{0,200}", seed in any::<[u8; 32]>()) {
            let kp = keyring_from_seed(&Seed::from_bytes(seed));
            let ct = encrypt_asymmetric(&plaintext, &kp.public).unwrap();
            prop_assert_eq!(decrypt_asymmetric(&ct, &kp.secret, &kp.public).unwrap(), plaintext);
        }

        #[test]
        fn keyring_from_seed_is_deterministic(seed in any::<[u8; 32]>()) {
            let a = keyring_from_seed(&Seed::from_bytes(seed));
            let b = keyring_from_seed(&Seed::from_bytes(seed));
            prop_assert_eq!(a.secret_bytes(), b.secret_bytes());
            prop_assert_eq!(a.public_bytes(), b.public_bytes());
        }
    }
}
