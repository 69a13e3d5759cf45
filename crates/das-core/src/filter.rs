//! Trait filtering over on-chain and off-chain attributes.

use crate::gateway::is_fetchable;
use crate::metadata::MetadataFetcher;
use crate::types::{Asset, Attribute};
use tracing::debug;

/// Matches assets carrying `value` under any of `keys`.
///
/// Both sides compare case-insensitively; only string values can match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitFilter {
    keys: Vec<String>,
    value: String,
}

impl TraitFilter {
    pub fn new<I, S>(keys: I, value: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(|k| k.into().to_lowercase()).collect(),
            value: value.into().to_lowercase(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    fn key_matches(&self, trait_type: &str) -> bool {
        let trait_type = trait_type.to_lowercase();
        self.keys.iter().any(|k| *k == trait_type)
    }

    pub fn matches_attributes(&self, attributes: &[Attribute]) -> bool {
        attributes.iter().any(|attr| {
            self.key_matches(&attr.trait_type)
                && attr
                    .value_str()
                    .is_some_and(|v| v.to_lowercase() == self.value)
        })
    }

    /// On-chain attributes first; off-chain JSON only when those miss.
    pub async fn asset_matches(&self, asset: &Asset, fetcher: &mut MetadataFetcher) -> bool {
        if self.matches_attributes(&asset.content.metadata.attributes) {
            return true;
        }

        let Some(json_uri) = asset.content.json_uri.as_deref().filter(|u| is_fetchable(u)) else {
            return false;
        };

        debug!("{}: no on-chain match, checking {}", asset.id, json_uri);
        fetcher
            .fetch(json_uri)
            .await
            .is_some_and(|meta| self.matches_attributes(&meta.attributes))
    }
}
