//! Image URL resolution and output filename shaping.

use crate::gateway::{is_fetchable, is_http};
use crate::metadata::MetadataFetcher;
use crate::types::Asset;
use regex::Regex;
use reqwest::Url;
use std::sync::LazyLock;

static EDITION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\d+)").unwrap());
static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

const DEFAULT_SUFFIX: &str = ".png";

/// Find an image URL for `asset`.
///
/// Order: `links.image`, then the first HTTP(S) file, then the `image`
/// field of the off-chain JSON.
pub async fn resolve_image_url(asset: &Asset, fetcher: &mut MetadataFetcher) -> Option<String> {
    let content = &asset.content;

    if let Some(image) = content.links.image.as_deref().filter(|u| is_http(u)) {
        return Some(image.to_string());
    }

    if let Some(uri) = content
        .files
        .iter()
        .filter_map(|f| f.uri.as_deref())
        .find(|u| is_http(u))
    {
        return Some(uri.to_string());
    }

    let json_uri = content.json_uri.as_deref().filter(|u| is_fetchable(u))?;
    let meta = fetcher.fetch(json_uri).await?;
    meta.image_url().map(str::to_string)
}

/// Output filename like `gorbagio_3138.png`.
///
/// Uses the `#<number>` edition from the asset name when present,
/// otherwise a sanitised form of the name (or mint).
pub fn filename_for(asset: &Asset, image_url: &str, prefix: &str) -> String {
    let name = asset
        .name()
        .or_else(|| Some(asset.id.as_str()).filter(|id| !id.is_empty()))
        .unwrap_or("unknown");

    let base = match EDITION_RE.captures(name) {
        Some(caps) => format!("{}_{}", prefix, &caps[1]),
        None => {
            let cleaned = NON_WORD_RE.replace_all(name, "_");
            let trimmed = cleaned.trim_matches('_');
            if trimmed.is_empty() {
                "nft".to_string()
            } else {
                trimmed.to_string()
            }
        }
    };

    format!("{}{}", base, image_suffix(image_url))
}

/// Extension of the URL's last path segment, else its `ext` query
/// parameter, else `.png`.
pub fn image_suffix(image_url: &str) -> String {
    let (path, ext_param) = match Url::parse(image_url) {
        Ok(url) => {
            let ext = url
                .query_pairs()
                .find(|(k, _)| k == "ext")
                .map(|(_, v)| v.into_owned());
            (url.path().to_string(), ext)
        }
        Err(_) => {
            let path = image_url.split(['?', '#']).next().unwrap_or_default();
            (path.to_string(), None)
        }
    };

    let segment = path.rsplit('/').next().unwrap_or_default();
    if let Some(ext) = segment_extension(segment) {
        return format!(".{ext}");
    }

    match ext_param {
        Some(ext) if is_plain_extension(&ext) => format!(".{}", ext.trim_start_matches('.')),
        _ => DEFAULT_SUFFIX.to_string(),
    }
}

fn segment_extension(segment: &str) -> Option<&str> {
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || !is_plain_extension(ext) {
        return None;
    }
    Some(ext)
}

fn is_plain_extension(ext: &str) -> bool {
    let ext = ext.trim_start_matches('.');
    !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}
