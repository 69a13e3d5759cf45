//! Collection enumeration: strategy planning, paging and fallback.
//!
//! A sample asset tells us how its collection can be listed. The preferred
//! route is the `collection` grouping; mints without one can still be
//! reached through their update authority or their first verified creator.
//! [`AssetStream`] walks those routes in order and commits to the first one
//! that produces assets.

use crate::error::{Error, Result};
use crate::rpc::DasClient;
use crate::types::{Asset, AssetPage};
use std::collections::VecDeque;
use std::fmt;
use tracing::{error, info, warn};

/// One way of listing a collection's members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Collection(String),
    Authority(String),
    /// Verified creator; unverified matches are excluded server-side.
    Creator(String),
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Collection(id) => write!(f, "collection {id}"),
            Strategy::Authority(addr) => write!(f, "authority {addr}"),
            Strategy::Creator(addr) => write!(f, "verified creator {addr}"),
        }
    }
}

impl Strategy {
    async fn fetch(&self, client: &DasClient, page: u32, limit: u32) -> Result<AssetPage> {
        match self {
            Strategy::Collection(id) => {
                client
                    .get_assets_by_group("collection", id, page, limit)
                    .await
            }
            Strategy::Authority(addr) => client.get_assets_by_authority(addr, page, limit).await,
            Strategy::Creator(addr) => {
                client
                    .get_assets_by_creator(addr, true, page, limit)
                    .await
            }
        }
    }
}

/// Ordered fallback chain derived from a sample asset.
///
/// Collection grouping first, then authority, then verified creator.
pub fn plan(sample: &Asset) -> Result<Vec<Strategy>> {
    let mut chain = Vec::with_capacity(3);
    if let Some(id) = sample.collection_id() {
        chain.push(Strategy::Collection(id.to_string()));
    }
    if let Some(addr) = sample.first_authority() {
        chain.push(Strategy::Authority(addr.to_string()));
    }
    if let Some(addr) = sample.first_verified_creator() {
        chain.push(Strategy::Creator(addr.to_string()));
    }

    if chain.is_empty() {
        return Err(Error::NoStrategy);
    }
    Ok(chain)
}

/// Page size, first page and page cap applied to every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u32,
    /// 1-based.
    pub start: u32,
    pub max_pages: Option<u32>,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            limit: 100,
            start: 1,
            max_pages: None,
        }
    }
}

/// Pulls successive pages for one strategy.
#[derive(Debug, Clone)]
pub struct Pager {
    strategy: Strategy,
    window: PageWindow,
    next_page: u32,
    pages_read: u32,
    exhausted: bool,
}

impl Pager {
    pub fn new(strategy: Strategy, window: PageWindow) -> Self {
        Self {
            strategy,
            window,
            next_page: window.start.max(1),
            pages_read: 0,
            exhausted: false,
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn pages_read(&self) -> u32 {
        self.pages_read
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
            || self
                .window
                .max_pages
                .is_some_and(|max| self.pages_read >= max)
    }

    /// Next non-empty page, or `None` once the listing is over.
    pub async fn next_page(&mut self, client: &DasClient) -> Result<Option<Vec<Asset>>> {
        if self.is_exhausted() {
            return Ok(None);
        }

        let page = self.next_page;
        let limit = self.window.limit;
        let result = self.strategy.fetch(client, page, limit).await?;

        self.pages_read += 1;
        match self.next_page.checked_add(1) {
            Some(next) => self.next_page = next,
            None => self.exhausted = true,
        }

        let count = result.items.len();
        info!("{} page {}: {} assets", self.strategy, page, count);

        if count == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        if (count as u64) < u64::from(limit) || (result.total > 0 && result.total < u64::from(limit)) {
            self.exhausted = true;
        }
        Ok(Some(result.items))
    }
}

/// Assets from the first strategy in a chain that yields any.
#[derive(Debug)]
pub struct AssetStream {
    client: DasClient,
    pager: Option<Pager>,
    buffer: VecDeque<Asset>,
    yielded: u64,
}

impl AssetStream {
    /// Try each strategy in order until one returns a non-empty first page.
    ///
    /// A strategy whose first page errors or is empty is skipped. If all
    /// are skipped, the last error is returned; with no error at all the
    /// stream is simply empty.
    pub async fn open(client: &DasClient, chain: &[Strategy], window: PageWindow) -> Result<Self> {
        let mut last_error: Option<Error> = None;

        for strategy in chain {
            let mut pager = Pager::new(strategy.clone(), window);
            match pager.next_page(client).await {
                Ok(Some(items)) => {
                    info!("Enumerating via {}", strategy);
                    return Ok(Self {
                        client: client.clone(),
                        pager: Some(pager),
                        buffer: items.into(),
                        yielded: 0,
                    });
                }
                Ok(None) => {
                    warn!("{} returned no assets, trying next strategy", strategy);
                }
                Err(e) => {
                    warn!("{} failed: {}; trying next strategy", strategy, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Self {
                client: client.clone(),
                pager: None,
                buffer: VecDeque::new(),
                yielded: 0,
            }),
        }
    }

    /// The strategy committed to, if any produced assets.
    pub fn strategy(&self) -> Option<&Strategy> {
        self.pager.as_ref().map(Pager::strategy)
    }

    pub fn pages_read(&self) -> u32 {
        self.pager.as_ref().map_or(0, Pager::pages_read)
    }

    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Next asset, fetching further pages as needed.
    ///
    /// A page that still fails after RPC retries ends the stream; what was
    /// already yielded stands.
    pub async fn next_asset(&mut self) -> Option<Asset> {
        loop {
            if let Some(asset) = self.buffer.pop_front() {
                self.yielded += 1;
                return Some(asset);
            }

            let pager = self.pager.as_mut()?;
            match pager.next_page(&self.client).await {
                Ok(Some(items)) => self.buffer.extend(items),
                Ok(None) => return None,
                Err(e) => {
                    error!("{} stopped after {} pages: {}", pager.strategy(), pager.pages_read(), e);
                    self.pager = None;
                    return None;
                }
            }
        }
    }
}
