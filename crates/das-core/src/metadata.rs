//! Off-chain metadata fetching with gateway failover and a per-run cache.

use crate::error::{Error, Result};
use crate::gateway::{GatewaySet, RetryPolicy};
use crate::rpc::retryable_status;
use crate::types::OffchainMetadata;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// URI -> parsed document, or `None` when every gateway failed.
///
/// Lives for one process run; nothing is persisted.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: HashMap<String, Option<OffchainMetadata>>,
    hits: u64,
    misses: u64,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outer `None` means "never fetched"; inner `None` is the absence marker.
    pub fn get(&mut self, uri: &str) -> Option<Option<OffchainMetadata>> {
        match self.entries.get(uri) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, uri: impl Into<String>, entry: Option<OffchainMetadata>) {
        self.entries.insert(uri.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Outcome of one GET against one gateway.
enum Attempt {
    Done(OffchainMetadata),
    /// Try the same gateway again after the given pause.
    Retry(Duration, Error),
    /// Give up on this gateway.
    NextGateway(Error),
}

/// Fetches off-chain JSON through the gateway set, caching every outcome.
#[derive(Debug)]
pub struct MetadataFetcher {
    client: Client,
    gateways: GatewaySet,
    retry: RetryPolicy,
    cache: MetadataCache,
}

impl MetadataFetcher {
    pub fn new(gateways: GatewaySet, retry: RetryPolicy, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            gateways,
            retry,
            cache: MetadataCache::new(),
        })
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    #[cfg(test)]
    pub(crate) fn cache_insert_for_test(&mut self, uri: &str, entry: Option<OffchainMetadata>) {
        self.cache.insert(uri, entry);
    }

    /// Fetch and parse the document at `uri`.
    ///
    /// Returns `None` when every candidate failed; the failure is logged and
    /// remembered so the same URI is not retried in this run.
    pub async fn fetch(&mut self, uri: &str) -> Option<OffchainMetadata> {
        if let Some(cached) = self.cache.get(uri) {
            debug!("metadata cache hit for {}", uri);
            return cached;
        }

        let mut last_error: Option<Error> = None;
        for candidate in self.gateways.candidates(uri) {
            let mut attempt = 0;
            while attempt < self.retry.attempts.max(1) {
                match self.try_once(&candidate, attempt).await {
                    Attempt::Done(meta) => {
                        self.cache.insert(uri, Some(meta.clone()));
                        return Some(meta);
                    }
                    Attempt::Retry(delay, e) => {
                        debug!("metadata {} attempt {} failed: {}", candidate, attempt + 1, e);
                        last_error = Some(e);
                        if !delay.is_zero() {
                            sleep(delay).await;
                        }
                    }
                    Attempt::NextGateway(e) => {
                        debug!("metadata {} gave up on gateway: {}", candidate, e);
                        last_error = Some(e);
                        break;
                    }
                }
                attempt += 1;
            }
        }

        match last_error {
            Some(e) => warn!("Failed to fetch metadata from {}: {}", uri, e),
            None => warn!("No fetchable location for metadata {}", uri),
        }
        self.cache.insert(uri, None);
        None
    }

    async fn try_once(&self, url: &str, attempt: u32) -> Attempt {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Retry(Duration::ZERO, e.into()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Retry(
                self.retry.delay_for(attempt),
                Error::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                },
            );
        }
        if !status.is_success() {
            let err = Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            };
            return if retryable_status(status) {
                Attempt::Retry(Duration::ZERO, err)
            } else {
                Attempt::NextGateway(err)
            };
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return Attempt::Retry(Duration::ZERO, e.into()),
        };
        match serde_json::from_slice::<OffchainMetadata>(&body) {
            Ok(meta) => Attempt::Done(meta),
            Err(e) => Attempt::Retry(Duration::ZERO, e.into()),
        }
    }
}
