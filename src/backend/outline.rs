//! Outline management API client.
//!
//! The pool address is the server's secret management base URL, e.g.
//! `https://203.0.113.7:18923/Xk2v...`. All endpoints hang off it.
//!
//! Management endpoints usually sit behind self-signed certificates, so
//! certificate checking is a connector setting rather than hardcoded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::backend::{BackendClient, BackendConnector, BackendError, BackendResult, Credential};
use crate::config::BackendConfig;

/// Client for a single Outline server.
#[derive(Debug, Clone)]
pub struct OutlineClient {
    client: Client,
    address: String,
    base: String,
}

impl OutlineClient {
    /// Create a client for `address`, sharing the given reqwest [`Client`].
    pub fn new(client: Client, address: impl Into<String>) -> BackendResult<Self> {
        let address = address.into();
        let url = Url::parse(&address).map_err(|e| BackendError::InvalidAddress {
            address: address.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BackendError::InvalidAddress {
                address,
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        let base = address.trim_end_matches('/').to_string();
        Ok(Self { client, address, base })
    }

    fn keys_url(&self) -> String {
        format!("{}/access-keys", self.base)
    }

    fn key_url(&self, id: &str, suffix: &str) -> String {
        format!("{}/access-keys/{}{}", self.base, id, suffix)
    }

    fn metrics_url(&self) -> String {
        format!("{}/metrics/transfer", self.base)
    }
}

fn check_status(resp: Response, operation: &'static str) -> BackendResult<Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Err(BackendError::NotFound(resp.url().path().to_string()))
    } else {
        Err(BackendError::Status { operation, status: status.as_u16() })
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(
    resp: Response,
    operation: &'static str,
) -> BackendResult<T> {
    resp.json().await.map_err(|e| BackendError::Decode {
        operation,
        reason: e.to_string(),
    })
}

#[async_trait]
impl BackendClient for OutlineClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn list_credentials(&self) -> BackendResult<Vec<Credential>> {
        let resp = self
            .client
            .get(self.keys_url())
            .send()
            .await
            .map_err(BackendError::transport)?;
        let resp = check_status(resp, "list_credentials")?;
        let list: wire::AccessKeyList = decode(resp, "list_credentials").await?;
        Ok(list
            .access_keys
            .into_iter()
            .map(|key| key.into_credential(None))
            .collect())
    }

    async fn create_credential(&self) -> BackendResult<Credential> {
        let resp = self
            .client
            .post(self.keys_url())
            .send()
            .await
            .map_err(BackendError::transport)?;
        let resp = check_status(resp, "create_credential")?;
        let key: wire::AccessKey = decode(resp, "create_credential").await?;
        Ok(key.into_credential(None))
    }

    async fn rename_credential(&self, id: &str, label: &str) -> BackendResult<()> {
        let resp = self
            .client
            .put(self.key_url(id, "/name"))
            .json(&wire::Rename { name: label })
            .send()
            .await
            .map_err(BackendError::transport)?;
        check_status(resp, "rename_credential")?;
        Ok(())
    }

    async fn set_data_limit(&self, id: &str, bytes: u64) -> BackendResult<()> {
        let resp = self
            .client
            .put(self.key_url(id, "/data-limit"))
            .json(&wire::DataLimit { limit: wire::Bytes { bytes } })
            .send()
            .await
            .map_err(BackendError::transport)?;
        check_status(resp, "set_data_limit")?;
        Ok(())
    }

    async fn delete_credential(&self, id: &str) -> BackendResult<()> {
        let resp = self
            .client
            .delete(self.key_url(id, ""))
            .send()
            .await
            .map_err(BackendError::transport)?;
        check_status(resp, "delete_credential")?;
        Ok(())
    }

    async fn transfer_usage(&self) -> BackendResult<HashMap<String, u64>> {
        let resp = self
            .client
            .get(self.metrics_url())
            .send()
            .await
            .map_err(BackendError::transport)?;
        let resp = check_status(resp, "transfer_usage")?;
        let metrics: wire::TransferMetrics = decode(resp, "transfer_usage").await?;
        Ok(metrics.bytes_transferred_by_user_id)
    }
}

/// Creates [`OutlineClient`]s that share one connection pool.
#[derive(Debug, Clone)]
pub struct OutlineConnector {
    client: Client,
}

impl OutlineConnector {
    pub fn new(config: &BackendConfig, request_timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(request_timeout)
            .build()
            .map_err(BackendError::transport)?;
        Ok(Self { client })
    }
}

impl BackendConnector for OutlineConnector {
    fn connect(&self, address: &str) -> BackendResult<Arc<dyn BackendClient>> {
        Ok(Arc::new(OutlineClient::new(self.client.clone(), address)?))
    }
}

// ── Wire types ────────────────────────────────────────────────────

mod wire {
    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AccessKeyList {
        pub access_keys: Vec<AccessKey>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AccessKey {
        pub id: String,
        #[serde(default)]
        pub name: String,
        pub access_url: String,
    }

    impl AccessKey {
        pub fn into_credential(self, used_bytes: Option<u64>) -> Credential {
            Credential {
                id: self.id,
                label: self.name,
                access_url: self.access_url,
                used_bytes,
            }
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransferMetrics {
        #[serde(default)]
        pub bytes_transferred_by_user_id: HashMap<String, u64>,
    }

    #[derive(Debug, Serialize)]
    pub struct Rename<'a> {
        pub name: &'a str,
    }

    #[derive(Debug, Serialize)]
    pub struct DataLimit {
        pub limit: Bytes,
    }

    #[derive(Debug, Serialize)]
    pub struct Bytes {
        pub bytes: u64,
    }
}
