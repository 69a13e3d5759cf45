//! The harvest run: discover the collection, walk it, filter, download.

use crate::config::Config;
use anyhow::{Context, Result};
use das_core::{
    filename_for, plan, resolve_image_url, Asset, AssetStream, DasClient, Downloader,
    MetadataFetcher, PageWindow, Strategy, TraitFilter,
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub strategy: Option<String>,
    pub checked: u64,
    pub matched: u64,
    pub downloaded: u64,
    /// Matched but no image URL could be resolved.
    pub skipped: u64,
    pub failed: u64,
    pub metadata_cache_hits: u64,
    pub out_dir: PathBuf,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Checked {} assets: {} matched, {} downloaded, {} without image, {} failed, {} metadata cache hits",
            self.checked,
            self.matched,
            self.downloaded,
            self.skipped,
            self.failed,
            self.metadata_cache_hits
        )
    }
}

pub struct Harvester {
    client: DasClient,
    fetcher: MetadataFetcher,
    downloader: Downloader,
    filter: TraitFilter,
    window: PageWindow,
    sample_mint: String,
    out_dir: PathBuf,
    filename_prefix: String,
    request_delay: Duration,
}

impl Harvester {
    /// Build every client from a validated config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .rpc
            .api_key
            .as_deref()
            .context("Missing DAS API key")?;

        let client = DasClient::new(&config.rpc.url, api_key, config.rpc_options())
            .context("Failed to create DAS client")?;

        let fetcher = MetadataFetcher::new(
            config.gateway_set(),
            config.metadata_retry(),
            Duration::from_secs(config.gateways.metadata_timeout_secs),
        )
        .context("Failed to create metadata client")?;

        let downloader = Downloader::new(
            config.gateway_set(),
            Duration::from_secs(config.gateways.image_timeout_secs),
            Duration::from_millis(config.gateways.rate_limit_pause_ms),
        )
        .context("Failed to create image client")?;

        Ok(Self {
            client,
            fetcher,
            downloader,
            filter: config.trait_filter(),
            window: config.page_window(),
            sample_mint: config.collection.sample_mint.clone(),
            out_dir: PathBuf::from(&config.download.out_dir),
            filename_prefix: config.download.filename_prefix.clone(),
            request_delay: Duration::from_millis(config.download.request_delay_ms),
        })
    }

    pub fn client(&self) -> &DasClient {
        &self.client
    }

    /// Look up the sample mint and derive the enumeration fallback chain.
    pub async fn discover(&self) -> Result<Vec<Strategy>> {
        info!("Using DAS RPC: {}", self.client.display_url());
        info!("Finding collection for mint: {}", self.sample_mint);

        let sample = self
            .client
            .get_asset(&self.sample_mint)
            .await
            .with_context(|| format!("Failed to fetch sample asset {}", self.sample_mint))?;

        if sample.collection_id().is_none() {
            warn!("Sample asset has no collection grouping; falling back to authority/creator listing");
        }

        plan(&sample).context("Cannot enumerate the collection")
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let chain = self.discover().await?;

        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("Failed to create output dir {}", self.out_dir.display()))?;

        let mut stream = AssetStream::open(&self.client, &chain, self.window)
            .await
            .context("No enumeration strategy returned assets")?;

        let mut summary = RunSummary {
            strategy: stream.strategy().map(ToString::to_string),
            ..Default::default()
        };

        while let Some(asset) = stream.next_asset().await {
            self.process(&asset, &mut summary).await;
        }

        summary.metadata_cache_hits = self.fetcher.cache().hits();
        summary.out_dir = resolved(&self.out_dir);

        info!("{} ({} pages)", summary, stream.pages_read());
        Ok(summary)
    }

    async fn process(&mut self, asset: &Asset, summary: &mut RunSummary) {
        summary.checked += 1;
        info!("Checking {}", asset.id);

        if !self.filter.asset_matches(asset, &mut self.fetcher).await {
            return;
        }
        summary.matched += 1;

        let Some(image_url) = resolve_image_url(asset, &mut self.fetcher).await else {
            warn!("Skipping {}: no image URL", asset.id);
            summary.skipped += 1;
            return;
        };

        let out_path = self
            .out_dir
            .join(filename_for(asset, &image_url, &self.filename_prefix));
        info!("Downloading {} -> {}", asset.id, out_path.display());

        match self.downloader.download(&image_url, &out_path).await {
            Ok(bytes) => {
                debug!("{}: wrote {} bytes", asset.id, bytes);
                summary.downloaded += 1;
            }
            Err(e) => {
                error!("Failed to download {} from {}: {}", asset.id, image_url, e);
                summary.failed += 1;
            }
        }

        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }
    }
}

fn resolved(dir: &Path) -> PathBuf {
    std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}
