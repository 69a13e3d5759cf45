//! Image download with gateway failover.

use crate::error::{Error, Result};
use crate::gateway::GatewaySet;
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    gateways: GatewaySet,
    rate_limit_pause: Duration,
}

impl Downloader {
    pub fn new(gateways: GatewaySet, timeout: Duration, rate_limit_pause: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            gateways,
            rate_limit_pause,
        })
    }

    /// Download `url` to `out_path`, trying each gateway candidate once.
    ///
    /// Returns the number of bytes written. Data lands in `<out_path>.part`
    /// first and is renamed into place only once complete.
    pub async fn download(&self, url: &str, out_path: &Path) -> Result<u64> {
        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let candidates = self.gateways.candidates(url);
        if candidates.is_empty() {
            return Err(Error::InvalidUrl(url.to_string()));
        }

        let mut last_error: Option<Error> = None;
        for candidate in &candidates {
            match self.fetch_to(candidate, out_path).await {
                Ok(bytes) => {
                    debug!("downloaded {} bytes from {}", bytes, candidate);
                    return Ok(bytes);
                }
                Err(Error::Status { status: 429, .. }) => {
                    debug!("{} rate limited, pausing {:?}", candidate, self.rate_limit_pause);
                    sleep(self.rate_limit_pause).await;
                }
                Err(e) => {
                    warn!("download from {} failed: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::RateLimited(url.to_string())))
    }

    async fn fetch_to(&self, url: &str, out_path: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let part = part_path(out_path);
        let result = async {
            let mut file = fs::File::create(&part).await?;
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, Error>(written)
        }
        .await;

        let committed = match result {
            Ok(written) => fs::rename(&part, out_path)
                .await
                .map(|()| written)
                .map_err(Error::from),
            Err(e) => Err(e),
        };
        if committed.is_err() {
            let _ = fs::remove_file(&part).await;
        }
        committed
    }
}

fn part_path(out_path: &Path) -> PathBuf {
    let mut name = out_path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
