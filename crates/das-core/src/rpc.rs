//! Minimal DAS JSON-RPC client.

use crate::error::{Error, Result};
use crate::gateway::RetryPolicy;
use crate::types::{Asset, AssetPage};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Transport settings for [`DasClient`].
#[derive(Debug, Clone, Copy)]
pub struct RpcOptions {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RpcOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Client for a DAS-compatible JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct DasClient {
    client: Client,
    url: Url,
    retry: RetryPolicy,
}

impl DasClient {
    /// `endpoint` is the bare RPC URL; the API key is appended as `api-key`.
    pub fn new(endpoint: &str, api_key: &str, options: RpcOptions) -> Result<Self> {
        let mut url =
            Url::parse(endpoint).map_err(|e| Error::InvalidUrl(format!("{endpoint}: {e}")))?;
        if !api_key.is_empty() {
            url.query_pairs_mut().append_pair("api-key", api_key);
        }

        let client = Client::builder().timeout(options.timeout).build()?;

        Ok(Self {
            client,
            url,
            retry: options.retry,
        })
    }

    /// Endpoint with the API key masked, for logs.
    pub fn display_url(&self) -> String {
        let mut shown = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "api-key" { "***".to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        shown.set_query(None);
        if !pairs.is_empty() {
            shown.query_pairs_mut().extend_pairs(pairs);
        }
        shown.to_string()
    }

    /// Call `method` and return its `result`, retrying transient failures.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": "1",
            "method": method,
            "params": params,
        });

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("DAS {} attempt {}", method, attempt);

            match self.call_once(&payload).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.retry.attempts => {
                    let delay = self.retry.backoff * attempt;
                    warn!(
                        "DAS {} failed (attempt {}/{}): {}; retrying in {:?}",
                        method, attempt, self.retry.attempts, e, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once(&self, payload: &Value) -> Result<Value> {
        let response = self.client.post(self.url.clone()).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: self.display_url(),
            });
        }

        let envelope: RpcEnvelope = serde_json::from_slice(&response.bytes().await?)?;
        if let Some(err) = envelope.error {
            return Err(Error::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    async fn call_typed<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn get_asset(&self, id: &str) -> Result<Asset> {
        self.call_typed("getAsset", json!({ "id": id })).await
    }

    pub async fn get_assets_by_group(
        &self,
        group_key: &str,
        group_value: &str,
        page: u32,
        limit: u32,
    ) -> Result<AssetPage> {
        self.call_typed(
            "getAssetsByGroup",
            json!({
                "groupKey": group_key,
                "groupValue": group_value,
                "page": page,
                "limit": limit,
            }),
        )
        .await
    }

    pub async fn get_assets_by_creator(
        &self,
        creator_address: &str,
        only_verified: bool,
        page: u32,
        limit: u32,
    ) -> Result<AssetPage> {
        self.call_typed(
            "getAssetsByCreator",
            json!({
                "creatorAddress": creator_address,
                "onlyVerified": only_verified,
                "page": page,
                "limit": limit,
            }),
        )
        .await
    }

    pub async fn get_assets_by_authority(
        &self,
        authority_address: &str,
        page: u32,
        limit: u32,
    ) -> Result<AssetPage> {
        self.call_typed(
            "getAssetsByAuthority",
            json!({
                "authorityAddress": authority_address,
                "page": page,
                "limit": limit,
            }),
        )
        .await
    }
}

/// True for HTTP statuses worth another try against the same endpoint.
pub(crate) fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
