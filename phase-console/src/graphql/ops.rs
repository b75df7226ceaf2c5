//! Typed GraphQL operations.
//!
//! Each operation is a marker type binding its document to the exact
//! variables and response shape, so a request can only be built with the
//! fields its document declares.

use super::GraphQlOperation;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// `{ ok }` payload returned by most mutations.
#[derive(Clone, Debug, Deserialize)]
pub struct OkPayload {
    pub ok: bool,
}

/// `{ id }` selection.
#[derive(Clone, Debug, Deserialize)]
pub struct IdPayload {
    pub id: String,
}

const WRAPPED_KEY_FIELDS: &str =
    "scopeId scopeKind principalId identityKey wrappedSeed wrappedSalt";

macro_rules! operation {
    ($op:ident, $name:literal, $vars:ty, $data:ty, $doc:expr) => {
        pub struct $op;

        impl GraphQlOperation for $op {
            const NAME: &'static str = $name;
            type Variables = $vars;
            type Data = $data;

            fn document() -> String {
                $doc
            }
        }
    };
}

// ── Environment keys ──

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvKeyVars {
    pub env_id: String,
    pub principal_id: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvKeyData {
    pub environment_key: Option<WrappedScopeKey>,
}

operation!(
    GetEnvKey,
    "GetEnvKey",
    EnvKeyVars,
    EnvKeyData,
    format!(
        "query GetEnvKey($envId: ID!, $principalId: ID!) {{ \
         environmentKey(envId: $envId, principalId: $principalId) {{ {WRAPPED_KEY_FIELDS} }} }}"
    )
);

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvIdVars {
    pub env_id: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvKeysData {
    pub environment_keys: Vec<WrappedScopeKey>,
}

operation!(
    GetEnvKeys,
    "GetEnvKeys",
    EnvIdVars,
    EnvKeysData,
    format!(
        "query GetEnvKeys($envId: ID!) {{ \
         environmentKeys(envId: $envId) {{ {WRAPPED_KEY_FIELDS} }} }}"
    )
);

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvKeyVars {
    pub env_id: String,
    pub user_id: String,
    pub wrapped_seed: String,
    pub wrapped_salt: String,
    pub identity_key: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvKeyData {
    pub create_environment_key: OkPayload,
}

operation!(
    CreateEnvKey,
    "CreateEnvKey",
    CreateEnvKeyVars,
    CreateEnvKeyData,
    "mutation CreateEnvKey($envId: ID!, $userId: ID!, $wrappedSeed: String!, \
     $wrappedSalt: String!, $identityKey: String!) { \
     createEnvironmentKey(envId: $envId, userId: $userId, wrappedSeed: $wrappedSeed, \
     wrappedSalt: $wrappedSalt, identityKey: $identityKey) { ok } }"
        .to_string()
);

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEnvKeyData {
    pub delete_environment_key: OkPayload,
}

operation!(
    DeleteEnvKey,
    "DeleteEnvKey",
    EnvKeyVars,
    DeleteEnvKeyData,
    "mutation DeleteEnvKey($envId: ID!, $principalId: ID!) { \
     deleteEnvironmentKey(envId: $envId, principalId: $principalId) { ok } }"
        .to_string()
);

// ── App keys ──

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppKeysVars {
    pub input: AppKeysInput,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppKeysData {
    pub create_app_keys: OkPayload,
}

operation!(
    CreateAppKeys,
    "CreateAppKeys",
    AppKeysVars,
    CreateAppKeysData,
    "mutation CreateAppKeys($input: AppKeysInput!) { createAppKeys(input: $input) { ok } }"
        .to_string()
);

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateAppKeysData {
    pub rotate_app_keys: OkPayload,
}

operation!(
    RotateAppKeys,
    "RotateAppKeys",
    AppKeysVars,
    RotateAppKeysData,
    "mutation RotateAppKeys($input: AppKeysInput!) { rotateAppKeys(input: $input) { ok } }"
        .to_string()
);

// ── Secrets ──

/// `SecretInput` as the schema names it: ciphertext fields plus the digest.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretData {
    pub env_id: String,
    pub path: String,
    pub key: String,
    pub value: String,
    pub comment: String,
    pub key_digest: String,
    pub tags: Vec<String>,
}

impl From<&EncryptedSecret> for SecretData {
    fn from(s: &EncryptedSecret) -> Self {
        Self {
            env_id: s.env_id.clone(),
            path: s.path.clone(),
            key: s.key.clone(),
            value: s.value.clone(),
            comment: s.comment.clone(),
            key_digest: s.key_digest.clone(),
            tags: s.tags.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSecretsVars {
    pub env_id: String,
    pub principal_id: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSecretsData {
    pub secrets: Vec<EncryptedSecret>,
}

operation!(
    GetSecrets,
    "GetSecrets",
    GetSecretsVars,
    GetSecretsData,
    "query GetSecrets($envId: ID!, $principalId: ID!) { \
     secrets(envId: $envId, principalId: $principalId) { \
     id envId path key value comment keyDigest tags version \
     history { version key value comment createdAt } \
     personalOverride { secretId value isActive } } }"
        .to_string()
);

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretVars {
    pub secret_data: SecretData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SecretPayload {
    pub secret: IdPayload,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretData {
    pub create_secret: SecretPayload,
}

operation!(
    CreateNewSecret,
    "CreateNewSecret",
    CreateSecretVars,
    CreateSecretData,
    "mutation CreateNewSecret($secretData: SecretInput!) { \
     createSecret(secretData: $secretData) { secret { id } } }"
        .to_string()
);

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSecretVars {
    pub id: String,
    pub secret_data: SecretData,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSecretData {
    pub update_secret: SecretPayload,
}

operation!(
    UpdateSecret,
    "UpdateSecret",
    UpdateSecretVars,
    UpdateSecretData,
    "mutation UpdateSecret($id: ID!, $secretData: SecretInput!) { \
     updateSecret(id: $id, secretData: $secretData) { secret { id } } }"
        .to_string()
);

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RekeySecretVars {
    pub id: String,
    pub secret_data: SecretData,
    pub history: Vec<EncryptedRevision>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RekeySecretData {
    pub rekey_secret: OkPayload,
}

operation!(
    RekeySecret,
    "RekeySecret",
    RekeySecretVars,
    RekeySecretData,
    "mutation RekeySecret($id: ID!, $secretData: SecretInput!, $history: [RevisionInput!]!) { \
     rekeySecret(id: $id, secretData: $secretData, history: $history) { ok } }"
        .to_string()
);

#[derive(Clone, Debug, Serialize)]
pub struct IdVars {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSecretData {
    pub delete_secret: OkPayload,
}

operation!(
    DeleteSecret,
    "DeleteSecret",
    IdVars,
    DeleteSecretData,
    "mutation DeleteSecret($id: ID!) { deleteSecret(id: $id) { ok } }".to_string()
);

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOverrideVars {
    pub principal_id: String,
    pub override_data: EncryptedOverride,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOverrideData {
    pub create_override: OkPayload,
}

operation!(
    CreateOverride,
    "CreateOverride",
    CreateOverrideVars,
    CreateOverrideData,
    "mutation CreateOverride($principalId: ID!, $overrideData: PersonalSecretInput!) { \
     createOverride(principalId: $principalId, overrideData: $overrideData) { ok } }"
        .to_string()
);

// ── Tokens ──

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenVars {
    pub token_data: NewTokenRecord,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenPayload {
    pub token: TokenRecord,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenData {
    pub create_token: TokenPayload,
}

operation!(
    CreateToken,
    "CreateToken",
    CreateTokenVars,
    CreateTokenData,
    "mutation CreateToken($tokenData: TokenInput!) { createToken(tokenData: $tokenData) { \
     token { id name kind identityKey createdAt expiresAt } } }"
        .to_string()
);

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKeyShareVars {
    pub token_digest: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKeyShareData {
    pub wrapped_key_share: Option<WrappedKeyShare>,
}

operation!(
    GetWrappedKeyShare,
    "GetWrappedKeyShare",
    WrappedKeyShareVars,
    WrappedKeyShareData,
    "query GetWrappedKeyShare($tokenDigest: String!) { \
     wrappedKeyShare(tokenDigest: $tokenDigest) { tokenId identityKey wrappedKeyShare } }"
        .to_string()
);

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeTokenData {
    pub revoke_token: OkPayload,
}

operation!(
    RevokeToken,
    "RevokeToken",
    IdVars,
    RevokeTokenData,
    "mutation RevokeToken($id: ID!) { revokeToken(id: $id) { ok } }".to_string()
);

// ── Lockboxes ──

#[derive(Clone, Debug, Serialize)]
pub struct CreateLockboxVars {
    pub input: LockboxInput,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LockboxIdPayload {
    pub lockbox: IdPayload,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLockboxData {
    pub create_lockbox: LockboxIdPayload,
}

operation!(
    CreateLockbox,
    "CreateLockbox",
    CreateLockboxVars,
    CreateLockboxData,
    "mutation CreateLockbox($input: LockboxInput!) { \
     createLockbox(input: $input) { lockbox { id } } }"
        .to_string()
);

#[derive(Clone, Debug, Deserialize)]
pub struct GetLockboxData {
    pub lockbox: Option<StoredLockbox>,
}

operation!(
    GetLockbox,
    "GetLockbox",
    IdVars,
    GetLockboxData,
    "query GetLockbox($id: ID!) { lockbox(id: $id) { id data views allowedViews expiresAt } }"
        .to_string()
);
