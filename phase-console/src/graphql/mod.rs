//! GraphQL client for the Phase backend.
//!
//! Posts `{ query, operationName, variables }` for typed operations and maps
//! GraphQL `errors` onto [`ConsoleError`]. Calls are never retried; a failed
//! mutation surfaces to the caller and the user re-triggers the action.

pub mod ops;

use crate::backend::ConsoleBackend;
use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::types::*;
use async_trait::async_trait;
use ops::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A GraphQL operation with its document, variables and response shape.
pub trait GraphQlOperation {
    const NAME: &'static str;
    type Variables: Serialize + Send + Sync;
    type Data: DeserializeOwned;

    fn document() -> String;
}

#[derive(Serialize)]
struct GraphQlRequest<'a, V> {
    query: String,
    #[serde(rename = "operationName")]
    operation_name: &'a str,
    variables: &'a V,
}

#[derive(Deserialize)]
struct GraphQlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphQlErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorBody {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorExtensions {
    code: Option<String>,
}

impl GraphQlErrorBody {
    fn into_console_error(self) -> ConsoleError {
        let code = self.extensions.and_then(|e| e.code);
        match code.as_deref() {
            Some("TOKEN_EXPIRED") => ConsoleError::TokenExpired,
            Some("LOCKBOX_UNAVAILABLE") => ConsoleError::LockboxUnavailable(self.message),
            Some("NOT_FOUND") => ConsoleError::NotFound(self.message),
            _ => ConsoleError::GraphQl(self.message),
        }
    }
}

/// HTTP client for the Phase GraphQL API.
pub struct GraphQlClient {
    client: Client,
    endpoint: String,
    /// Full `Authorization` header value, e.g. `Bearer User pss:v1:...`.
    authorization: Arc<RwLock<Option<String>>>,
}

impl GraphQlClient {
    pub fn new(config: &ConsoleConfig) -> ConsoleResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.graphql_url(),
            authorization: Arc::new(RwLock::new(None)),
        })
    }

    /// Sets the `Authorization` header sent with every request.
    pub async fn set_authorization(&self, header: String) {
        *self.authorization.write().await = Some(header);
    }

    pub async fn is_authenticated(&self) -> bool {
        self.authorization.read().await.is_some()
    }

    pub async fn logout(&self) {
        *self.authorization.write().await = None;
    }

    /// Executes one operation and returns its `data`.
    pub async fn execute<Op: GraphQlOperation>(
        &self,
        variables: &Op::Variables,
    ) -> ConsoleResult<Op::Data> {
        let body = GraphQlRequest {
            query: Op::document(),
            operation_name: Op::NAME,
            variables,
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(header) = self.authorization.read().await.as_ref() {
            req = req.header(reqwest::header::AUTHORIZATION, header);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ConsoleError::Api(format!("{} rejected: {status}", Op::NAME)));
        }

        let resp: GraphQlResponse<Op::Data> = resp
            .error_for_status()
            .map_err(|e| ConsoleError::Api(e.to_string()))?
            .json()
            .await?;

        if let Some(first) = resp.errors.into_iter().next() {
            debug!("{} returned GraphQL error: {}", Op::NAME, first.message);
            return Err(first.into_console_error());
        }

        resp.data
            .ok_or_else(|| ConsoleError::GraphQl(format!("{} returned no data", Op::NAME)))
    }
}

fn ensure_ok(op: &str, payload: OkPayload) -> ConsoleResult<()> {
    if payload.ok {
        Ok(())
    } else {
        Err(ConsoleError::Api(format!("{op} reported failure")))
    }
}

#[async_trait]
impl ConsoleBackend for GraphQlClient {
    async fn environment_key(
        &self,
        env_id: &str,
        principal_id: &str,
    ) -> ConsoleResult<EnvironmentKeySet> {
        let data = self
            .execute::<GetEnvKey>(&EnvKeyVars {
                env_id: env_id.to_string(),
                principal_id: principal_id.to_string(),
            })
            .await?;
        data.environment_key
            .ok_or_else(|| ConsoleError::NoAccess(format!("environment {env_id}")))
    }

    async fn environment_keys(&self, env_id: &str) -> ConsoleResult<Vec<EnvironmentKeySet>> {
        let data = self
            .execute::<GetEnvKeys>(&EnvIdVars {
                env_id: env_id.to_string(),
            })
            .await?;
        Ok(data.environment_keys)
    }

    async fn create_environment_key(&self, key: &EnvironmentKeySet) -> ConsoleResult<()> {
        let data = self
            .execute::<CreateEnvKey>(&CreateEnvKeyVars {
                env_id: key.scope_id.clone(),
                user_id: key.principal_id.clone(),
                wrapped_seed: key.wrapped_seed.clone(),
                wrapped_salt: key.wrapped_salt.clone(),
                identity_key: key.identity_key.clone(),
            })
            .await?;
        ensure_ok(CreateEnvKey::NAME, data.create_environment_key)
    }

    async fn delete_environment_key(&self, env_id: &str, principal_id: &str) -> ConsoleResult<()> {
        let data = self
            .execute::<DeleteEnvKey>(&EnvKeyVars {
                env_id: env_id.to_string(),
                principal_id: principal_id.to_string(),
            })
            .await?;
        ensure_ok(DeleteEnvKey::NAME, data.delete_environment_key)
    }

    async fn create_app_keys(&self, input: &AppKeysInput) -> ConsoleResult<()> {
        let data = self
            .execute::<CreateAppKeys>(&AppKeysVars {
                input: input.clone(),
            })
            .await?;
        ensure_ok(CreateAppKeys::NAME, data.create_app_keys)
    }

    async fn rotate_app_keys(&self, input: &AppKeysInput) -> ConsoleResult<()> {
        let data = self
            .execute::<RotateAppKeys>(&AppKeysVars {
                input: input.clone(),
            })
            .await?;
        ensure_ok(RotateAppKeys::NAME, data.rotate_app_keys)
    }

    async fn secrets(
        &self,
        env_id: &str,
        principal_id: &str,
    ) -> ConsoleResult<Vec<EncryptedSecret>> {
        let data = self
            .execute::<GetSecrets>(&GetSecretsVars {
                env_id: env_id.to_string(),
                principal_id: principal_id.to_string(),
            })
            .await?;
        Ok(data.secrets)
    }

    async fn create_secret(&self, secret: &EncryptedSecret) -> ConsoleResult<String> {
        let data = self
            .execute::<CreateNewSecret>(&CreateSecretVars {
                secret_data: SecretData::from(secret),
            })
            .await?;
        Ok(data.create_secret.secret.id)
    }

    async fn update_secret(&self, secret: &EncryptedSecret) -> ConsoleResult<()> {
        self.execute::<UpdateSecret>(&UpdateSecretVars {
            id: secret.id.clone(),
            secret_data: SecretData::from(secret),
        })
        .await?;
        Ok(())
    }

    async fn rekey_secret(&self, secret: &EncryptedSecret) -> ConsoleResult<()> {
        let data = self
            .execute::<RekeySecret>(&RekeySecretVars {
                id: secret.id.clone(),
                secret_data: SecretData::from(secret),
                history: secret.history.clone(),
            })
            .await?;
        ensure_ok(RekeySecret::NAME, data.rekey_secret)
    }

    async fn delete_secret(&self, secret_id: &str) -> ConsoleResult<()> {
        let data = self
            .execute::<DeleteSecret>(&IdVars {
                id: secret_id.to_string(),
            })
            .await?;
        ensure_ok(DeleteSecret::NAME, data.delete_secret)
    }

    async fn create_override(
        &self,
        principal_id: &str,
        personal_override: &EncryptedOverride,
    ) -> ConsoleResult<()> {
        let data = self
            .execute::<CreateOverride>(&CreateOverrideVars {
                principal_id: principal_id.to_string(),
                override_data: personal_override.clone(),
            })
            .await?;
        ensure_ok(CreateOverride::NAME, data.create_override)
    }

    async fn create_token(&self, record: &NewTokenRecord) -> ConsoleResult<TokenRecord> {
        let data = self
            .execute::<CreateToken>(&CreateTokenVars {
                token_data: record.clone(),
            })
            .await?;
        Ok(data.create_token.token)
    }

    async fn wrapped_key_share(&self, token_digest: &str) -> ConsoleResult<WrappedKeyShare> {
        let data = self
            .execute::<GetWrappedKeyShare>(&WrappedKeyShareVars {
                token_digest: token_digest.to_string(),
            })
            .await?;
        data.wrapped_key_share
            .ok_or_else(|| ConsoleError::NotFound("token".to_string()))
    }

    async fn revoke_token(&self, token_id: &str) -> ConsoleResult<()> {
        let data = self
            .execute::<RevokeToken>(&IdVars {
                id: token_id.to_string(),
            })
            .await?;
        ensure_ok(RevokeToken::NAME, data.revoke_token)
    }

    async fn create_lockbox(&self, input: &LockboxInput) -> ConsoleResult<String> {
        let data = self
            .execute::<CreateLockbox>(&CreateLockboxVars {
                input: input.clone(),
            })
            .await?;
        Ok(data.create_lockbox.lockbox.id)
    }

    async fn lockbox(&self, lockbox_id: &str) -> ConsoleResult<StoredLockbox> {
        let data = self
            .execute::<GetLockbox>(&IdVars {
                id: lockbox_id.to_string(),
            })
            .await?;
        data.lockbox
            .ok_or_else(|| ConsoleError::LockboxUnavailable(lockbox_id.to_string()))
    }
}
