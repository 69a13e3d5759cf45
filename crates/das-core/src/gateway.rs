//! IPFS gateway rewriting and the retry policy shared by remote fetches.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Public gateways tried, in order, after the original URL.
pub const DEFAULT_GATEWAYS: &[&str] = &[
    "https://cloudflare-ipfs.com/ipfs/{cid}{path}",
    "https://ipfs.io/ipfs/{cid}{path}",
    "https://gateway.pinata.cloud/ipfs/{cid}{path}",
    "https://gateway.pinit.io/ipfs/{cid}{path}",
];

/// How many times to hit one endpoint and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff for the given zero-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * (attempt + 1)
    }
}

/// Ordered gateway templates with `{cid}` and `{path}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySet {
    templates: Vec<String>,
}

impl Default for GatewaySet {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAYS.iter().map(|t| t.to_string()).collect())
    }
}

static PATH_CID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/ipfs/([A-Za-z0-9]+)(/[^?#]*)?").unwrap());
static SCHEME_CID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ipfs://(?:ipfs/)?([A-Za-z0-9]+)(/[^?#]*)?").unwrap());

/// Content identifier and sub-path of an IPFS-addressed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpfsRef {
    pub cid: String,
    /// Leading `/` included; empty when the URL points at the CID root.
    pub path: String,
}

impl IpfsRef {
    pub fn parse(url: &str) -> Option<Self> {
        let caps = SCHEME_CID_RE
            .captures(url)
            .or_else(|| PATH_CID_RE.captures(url))?;
        Some(Self {
            cid: caps[1].to_string(),
            path: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
        })
    }
}

pub fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// A URI we know how to fetch: plain HTTP(S) or `ipfs://`.
pub fn is_fetchable(url: &str) -> bool {
    is_http(url) || url.starts_with("ipfs://")
}

impl GatewaySet {
    pub fn new(templates: Vec<String>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// URLs to try for `url`: the original first when it is HTTP(S), then
    /// one rewrite per gateway. Duplicates are dropped, order is kept.
    pub fn candidates(&self, url: &str) -> Vec<String> {
        let mut urls = Vec::with_capacity(self.templates.len() + 1);
        if is_http(url) {
            urls.push(url.to_string());
        }

        let Some(ipfs) = IpfsRef::parse(url) else {
            return urls;
        };

        for template in &self.templates {
            let rewritten = template
                .replace("{cid}", &ipfs.cid)
                .replace("{path}", &ipfs.path);
            if !urls.contains(&rewritten) {
                urls.push(rewritten);
            }
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    #[test]
    fn original_comes_first_then_gateways() {
        let set = GatewaySet::default();
        let url = format!("https://nftstorage.link/ipfs/{CID}/42.png");
        let urls = set.candidates(&url);

        assert_eq!(urls.len(), 5);
        assert_eq!(urls[0], url);
        assert_eq!(urls[1], format!("https://cloudflare-ipfs.com/ipfs/{CID}/42.png"));
        assert_eq!(urls[4], format!("https://gateway.pinit.io/ipfs/{CID}/42.png"));
    }

    #[test]
    fn duplicate_of_original_is_dropped() {
        let set = GatewaySet::default();
        let url = format!("https://ipfs.io/ipfs/{CID}");
        let urls = set.candidates(&url);

        assert_eq!(urls.len(), 4);
        assert_eq!(urls.iter().filter(|u| **u == url).count(), 1);
        assert_eq!(urls[0], url);
    }

    #[test]
    fn non_ipfs_url_passes_through() {
        let set = GatewaySet::default();
        let urls = set.candidates("https://arweave.net/abc123");
        assert_eq!(urls, vec!["https://arweave.net/abc123".to_string()]);
    }

    #[test]
    fn ipfs_scheme_only_yields_rewrites() {
        let set = GatewaySet::new(vec!["https://gw.example/ipfs/{cid}{path}".into()]);
        let urls = set.candidates(&format!("ipfs://{CID}/meta/7.json"));
        assert_eq!(urls, vec![format!("https://gw.example/ipfs/{CID}/meta/7.json")]);

        let urls = set.candidates(&format!("ipfs://ipfs/{CID}"));
        assert_eq!(urls, vec![format!("https://gw.example/ipfs/{CID}")]);
    }

    #[test]
    fn query_string_is_not_part_of_the_path() {
        let r = IpfsRef::parse(&format!("https://x.io/ipfs/{CID}/1.png?ext=png")).unwrap();
        assert_eq!(r.cid, CID);
        assert_eq!(r.path, "/1.png");
    }

    #[test]
    fn fetchable_schemes() {
        assert!(is_fetchable("https://a"));
        assert!(is_fetchable("http://a"));
        assert!(is_fetchable("ipfs://Qm"));
        assert!(!is_fetchable("ar://abc"));
        assert!(!is_fetchable(""));
    }

    #[test]
    fn backoff_is_linear() {
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(300));
    }
}
