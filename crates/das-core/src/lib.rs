//! DAS collection enumeration and IPFS-aware fetching for das-harvest.
//!
//! This crate holds the pieces that talk to the outside world: a JSON-RPC
//! client for Digital Asset Standard indexers, the strategy chain used to
//! list a collection's members, IPFS gateway failover for off-chain
//! metadata and images, and the trait filter applied to each asset.

pub mod download;
pub mod enumerate;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod image;
pub mod metadata;
pub mod rpc;
pub mod types;

// Re-export commonly used types
pub use download::Downloader;
pub use enumerate::{plan, AssetStream, PageWindow, Pager, Strategy};
pub use error::{Error, Result};
pub use filter::TraitFilter;
pub use gateway::{GatewaySet, IpfsRef, RetryPolicy, DEFAULT_GATEWAYS};
pub use image::{filename_for, image_suffix, resolve_image_url};
pub use metadata::{MetadataCache, MetadataFetcher};
pub use rpc::{DasClient, RpcOptions};
pub use types::{Asset, AssetPage, Attribute, Content, OffchainMetadata};
