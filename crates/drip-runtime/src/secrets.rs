//! Secret storage backends.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};

use drip_core::config::SecretsConfig;
use drip_core::error::{DripError, Result};
use drip_core::store::SecretStore;

/// Secrets kept in a Vault KV version 2 engine.
pub struct VaultSecretStore {
    client: reqwest::Client,
    addr: String,
    token: String,
    mount: String,
}

impl VaultSecretStore {
    pub fn new(config: &SecretsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            addr: config.vault_addr.trim_end_matches('/').to_string(),
            token: config.vault_token.clone(),
            mount: config.mount.trim_matches('/').to_string(),
        }
    }

    /// Full API URL for `section` ("data" or "metadata") of a secret path.
    fn url(&self, section: &str, path: &str) -> String {
        format!(
            "{}/v1/{}/{}/{}",
            self.addr,
            self.mount,
            section,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("X-Vault-Token", &self.token)
    }
}

fn secret_error(action: &str, path: &str, e: impl std::fmt::Display) -> DripError {
    DripError::Secret(format!("failed to {} secret at {}: {}", action, path, e))
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<()> {
        let url = self.url("data", path);
        self.request(reqwest::Method::POST, &url)
            .json(&json!({ "data": data }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| secret_error("write", path, e))?;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Map<String, Value>>> {
        let url = self.url("data", path);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| secret_error("read", path, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: Value = response
            .error_for_status()
            .map_err(|e| secret_error("read", path, e))?
            .json()
            .await
            .map_err(|e| secret_error("read", path, e))?;

        match body.pointer("/data/data") {
            Some(Value::Object(data)) => Ok(Some(data.clone())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(DripError::Secret(format!(
                "invalid secret format at {}",
                path
            ))),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url("metadata", path);
        self.request(reqwest::Method::DELETE, &url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| secret_error("delete", path, e))?;
        Ok(())
    }
}

/// Process-local secret store for tests and development.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, Map<String, Value>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn secrets(&self) -> std::sync::MutexGuard<'_, HashMap<String, Map<String, Value>>> {
        self.secrets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<()> {
        self.secrets().insert(path.to_string(), data);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Map<String, Value>>> {
        Ok(self.secrets().get(path).cloned())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.secrets().remove(path);
        Ok(())
    }
}
