use anyhow::{Context, Result};
use das_core::{GatewaySet, PageWindow, RetryPolicy, RpcOptions, TraitFilter, DEFAULT_GATEWAYS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Value shipped in old copies of the script; never a real key.
const PLACEHOLDER_API_KEY: &str = "PASTE_YOUR_HELIUS_API_KEY_HERE";

/// Upper bound the DAS listing methods accept for `limit`.
const MAX_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub gateways: GatewayConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_rpc_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CollectionConfig {
    /// Any known member of the collection; used to discover how to list it.
    #[serde(default = "default_sample_mint")]
    pub sample_mint: String,
    /// Attribute names compared case-insensitively.
    #[serde(default = "default_trait_keys")]
    pub trait_keys: Vec<String>,
    #[serde(default = "default_trait_value")]
    pub trait_value: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PaginationConfig {
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_page_start")]
    pub page_start: u32,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Templates with `{cid}` and `{path}` placeholders, tried in order.
    #[serde(default = "default_gateway_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_attempts")]
    pub metadata_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_image_timeout_secs")]
    pub image_timeout_secs: u64,
    #[serde(default = "default_backoff_ms")]
    pub rate_limit_pause_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DownloadConfig {
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,
    /// Pause after each matched asset.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            api_key: None,
            timeout_secs: default_rpc_timeout_secs(),
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            sample_mint: default_sample_mint(),
            trait_keys: default_trait_keys(),
            trait_value: default_trait_value(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            page_start: default_page_start(),
            max_pages: None,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            urls: default_gateway_urls(),
            metadata_attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            image_timeout_secs: default_image_timeout_secs(),
            rate_limit_pause_ms: default_backoff_ms(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            filename_prefix: default_filename_prefix(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_rpc_url() -> String {
    "https://mainnet.helius-rpc.com/".to_string()
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_sample_mint() -> String {
    "B3qkk8psvGWhxuY9aZiVRVDhjoLjVi93Ki3he1xufQ8W".to_string()
}

fn default_trait_keys() -> Vec<String> {
    vec!["background".to_string(), "backgrounds".to_string()]
}

fn default_trait_value() -> String {
    "gorbage truck".to_string()
}

fn default_page_limit() -> u32 {
    100
}

fn default_page_start() -> u32 {
    1
}

fn default_gateway_urls() -> Vec<String> {
    DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect()
}

fn default_metadata_timeout_secs() -> u64 {
    20
}

fn default_image_timeout_secs() -> u64 {
    60
}

fn default_out_dir() -> String {
    "gorbage_truck_images".to_string()
}

fn default_filename_prefix() -> String {
    "gorbagio".to_string()
}

fn default_request_delay_ms() -> u64 {
    100
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line or through the environment.
///
/// Anything set here wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub rpc_url: Option<String>,
    pub page_limit: Option<u32>,
    pub page_start: Option<u32>,
    pub max_pages: Option<u32>,
    pub out_dir: Option<String>,
    pub sample_mint: Option<String>,
    pub trait_value: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(path);
        let content = fs::read_to_string(expanded_path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;

        Ok(config)
    }

    /// Defaults, or the given file when there is one.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(key) = overrides.api_key {
            self.rpc.api_key = Some(key);
        }
        if let Some(url) = overrides.rpc_url {
            self.rpc.url = url;
        }
        if let Some(limit) = overrides.page_limit {
            self.pagination.page_limit = limit;
        }
        if let Some(start) = overrides.page_start {
            self.pagination.page_start = start;
        }
        if let Some(max) = overrides.max_pages {
            self.pagination.max_pages = Some(max);
        }
        if let Some(dir) = overrides.out_dir {
            self.download.out_dir = dir;
        }
        if let Some(mint) = overrides.sample_mint {
            self.collection.sample_mint = mint;
        }
        if let Some(value) = overrides.trait_value {
            self.collection.trait_value = value;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn expand_paths(&mut self) -> Result<()> {
        self.download.out_dir = shellexpand::tilde(&self.download.out_dir).to_string();
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let api_key = self.rpc.api_key.as_deref().map(str::trim).unwrap_or_default();
        if api_key.is_empty() || api_key.contains(PLACEHOLDER_API_KEY) {
            anyhow::bail!("Set HELIUS_API_KEY (or rpc.api_key in the config file) to your DAS API key");
        }

        if !self.rpc.url.starts_with("http://") && !self.rpc.url.starts_with("https://") {
            anyhow::bail!("RPC URL must start with http:// or https://");
        }

        if self.collection.sample_mint.trim().is_empty() {
            anyhow::bail!("collection.sample_mint must not be empty");
        }
        if self.collection.trait_keys.iter().all(|k| k.trim().is_empty()) {
            anyhow::bail!("collection.trait_keys must name at least one attribute");
        }
        if self.collection.trait_value.trim().is_empty() {
            anyhow::bail!("collection.trait_value must not be empty");
        }

        if self.pagination.page_limit == 0 || self.pagination.page_limit > MAX_PAGE_LIMIT {
            anyhow::bail!(
                "Page limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT,
                self.pagination.page_limit
            );
        }
        if self.pagination.page_start == 0 {
            anyhow::bail!("Page start is 1-based, got 0");
        }
        if self.pagination.max_pages == Some(0) {
            anyhow::bail!("Max pages must be at least 1 when set");
        }

        if self.gateways.urls.is_empty() {
            anyhow::bail!("At least one IPFS gateway is required");
        }
        for url in &self.gateways.urls {
            if !url.contains("{cid}") {
                anyhow::bail!("Gateway template is missing {{cid}}: {}", url);
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("Gateway template must start with http:// or https://: {}", url);
            }
        }

        if self.download.out_dir.trim().is_empty() {
            anyhow::bail!("download.out_dir must not be empty");
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Unknown log level {:?}, expected one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    pub fn rpc_options(&self) -> RpcOptions {
        RpcOptions {
            timeout: Duration::from_secs(self.rpc.timeout_secs),
            retry: RetryPolicy {
                attempts: self.rpc.attempts,
                backoff: Duration::from_millis(self.rpc.backoff_ms),
            },
        }
    }

    pub fn metadata_retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.gateways.metadata_attempts,
            backoff: Duration::from_millis(self.gateways.backoff_ms),
        }
    }

    pub fn gateway_set(&self) -> GatewaySet {
        GatewaySet::new(self.gateways.urls.clone())
    }

    pub fn trait_filter(&self) -> TraitFilter {
        TraitFilter::new(
            self.collection
                .trait_keys
                .iter()
                .filter(|k| !k.trim().is_empty())
                .cloned(),
            self.collection.trait_value.clone(),
        )
    }

    pub fn page_window(&self) -> PageWindow {
        PageWindow {
            limit: self.pagination.page_limit,
            start: self.pagination.page_start,
            max_pages: self.pagination.max_pages,
        }
    }
}
