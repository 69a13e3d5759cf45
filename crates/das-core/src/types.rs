//! Wire types for DAS asset records and off-chain metadata documents.
//!
//! Indexers are loose about shape: fields go missing, arrive as `null`, or
//! carry attributes that are not objects at all. Everything here therefore
//! defaults instead of failing, so one odd record never aborts a listing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single asset as returned by `getAsset` and the listing methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    /// Mint address.
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    /// Group memberships; collection membership has `group_key == "collection"`.
    #[serde(default, deserialize_with = "nullable")]
    pub grouping: Vec<Grouping>,
    #[serde(default, deserialize_with = "nullable")]
    pub creators: Vec<Creator>,
    #[serde(default, deserialize_with = "nullable")]
    pub authorities: Vec<Authority>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: Content,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Grouping {
    #[serde(default, deserialize_with = "nullable")]
    pub group_key: String,
    #[serde(default)]
    pub group_value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Creator {
    #[serde(default, deserialize_with = "nullable")]
    pub address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub verified: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub share: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Authority {
    #[serde(default, deserialize_with = "nullable")]
    pub address: String,
    #[serde(default, deserialize_with = "nullable")]
    pub scopes: Vec<String>,
}

/// The `content` block of an asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    /// Off-chain metadata document location.
    #[serde(default)]
    pub json_uri: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub links: Links,
    #[serde(default, deserialize_with = "nullable")]
    pub files: Vec<File>,
    /// Metadata the indexer already pulled in.
    #[serde(default, deserialize_with = "nullable")]
    pub metadata: EmbeddedMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Links {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub animation_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct File {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub cdn_uri: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient_attributes")]
    pub attributes: Vec<Attribute>,
}

/// A `trait_type`/`value` pair.
///
/// `value` stays raw JSON: collections mix strings and numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attribute {
    pub trait_type: String,
    #[serde(default)]
    pub value: Value,
}

impl Attribute {
    pub fn new(trait_type: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }

    /// Parse one attribute entry, dropping anything without a string `trait_type`.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;
        let trait_type = obj.get("trait_type")?.as_str()?.to_string();
        let value = obj.get("value").cloned().unwrap_or(Value::Null);
        Some(Self { trait_type, value })
    }

    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// Off-chain JSON metadata document behind `content.json_uri`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OffchainMetadata {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<Value>,
    #[serde(default, deserialize_with = "lenient_attributes")]
    pub attributes: Vec<Attribute>,
}

impl OffchainMetadata {
    /// The `image` field, when it is a non-empty string.
    pub fn image_url(&self) -> Option<&str> {
        self.image
            .as_ref()
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// One page of a DAS listing method.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AssetPage {
    /// Number of items the indexer reports for this page.
    #[serde(default, deserialize_with = "nullable")]
    pub total: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub limit: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub page: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<Asset>,
}

impl Asset {
    /// Collection id from the `collection` grouping, if any.
    pub fn collection_id(&self) -> Option<&str> {
        self.grouping
            .iter()
            .find(|g| g.group_key == "collection")
            .and_then(|g| g.group_value.as_deref())
            .filter(|v| !v.is_empty())
    }

    pub fn first_verified_creator(&self) -> Option<&str> {
        self.creators
            .iter()
            .find(|c| c.verified && !c.address.is_empty())
            .map(|c| c.address.as_str())
    }

    pub fn first_authority(&self) -> Option<&str> {
        self.authorities
            .iter()
            .map(|a| a.address.as_str())
            .find(|a| !a.is_empty())
    }

    /// Display name from embedded metadata.
    pub fn name(&self) -> Option<&str> {
        self.content
            .metadata
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
    }
}

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Keep a string field only when it really is a string.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_attributes<'de, D>(deserializer: D) -> Result<Vec<Attribute>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Array(entries) => entries.iter().filter_map(Attribute::from_value).collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_asset() {
        let raw = json!({
            "interface": "ProgrammableNFT",
            "id": "B3qkk8psvGWhxuY9aZiVRVDhjoLjVi93Ki3he1xufQ8W",
            "content": {
                "$schema": "https://schema.metaplex.com/nft1.0.json",
                "json_uri": "https://example.com/ipfs/QmAbc/1.json",
                "files": [{"uri": "https://example.com/1.png", "mime": "image/png"}],
                "metadata": {
                    "name": "Gorbagio #1",
                    "symbol": "GORB",
                    "attributes": [{"trait_type": "Background", "value": "Gorbage Truck"}]
                },
                "links": {"image": "https://example.com/1.png"}
            },
            "authorities": [{"address": "Auth111", "scopes": ["full"]}],
            "grouping": [{"group_key": "collection", "group_value": "Coll111"}],
            "creators": [{"address": "Crea111", "share": 100, "verified": true}]
        });

        let asset: Asset = serde_json::from_value(raw).unwrap();
        assert_eq!(asset.collection_id(), Some("Coll111"));
        assert_eq!(asset.first_authority(), Some("Auth111"));
        assert_eq!(asset.first_verified_creator(), Some("Crea111"));
        assert_eq!(asset.name(), Some("Gorbagio #1"));
        assert_eq!(asset.content.metadata.attributes.len(), 1);
        assert_eq!(
            asset.content.metadata.attributes[0].value_str(),
            Some("Gorbage Truck")
        );
    }

    #[test]
    fn nulls_and_missing_fields_default() {
        let raw = json!({
            "id": "mint",
            "grouping": null,
            "creators": null,
            "content": {"metadata": null, "links": null, "files": null}
        });
        let asset: Asset = serde_json::from_value(raw).unwrap();
        assert!(asset.grouping.is_empty());
        assert!(asset.collection_id().is_none());
        assert!(asset.content.files.is_empty());
        assert!(asset.name().is_none());
    }

    #[test]
    fn scalar_nulls_default_without_failing_the_page() {
        let raw = json!({
            "total": null,
            "limit": 100,
            "page": 1,
            "items": [
                {"id": "Good"},
                {
                    "id": "Odd",
                    "grouping": [{"group_key": null, "group_value": null}],
                    "creators": [{"address": "C", "verified": true, "share": null}],
                    "authorities": [{"address": null, "scopes": null}]
                },
                {"id": null, "creators": [{"address": null, "verified": null, "share": 5}]}
            ]
        });
        let page: AssetPage = serde_json::from_value(raw).unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.items.len(), 3);

        let odd = &page.items[1];
        assert_eq!(odd.creators[0].share, 0);
        assert_eq!(odd.first_verified_creator(), Some("C"));
        assert!(odd.collection_id().is_none());
        assert!(odd.first_authority().is_none());

        let anonymous = &page.items[2];
        assert_eq!(anonymous.id, "");
        assert!(!anonymous.creators[0].verified);
    }

    #[test]
    fn non_string_name_keeps_the_attributes() {
        let raw = json!({
            "name": 7,
            "attributes": [{"trait_type": "Background", "value": "Gorbage Truck"}]
        });
        let meta: OffchainMetadata = serde_json::from_value(raw).unwrap();
        assert!(meta.name.is_none());
        assert_eq!(meta.attributes[0].value_str(), Some("Gorbage Truck"));

        let asset: Asset = serde_json::from_value(json!({
            "id": "m",
            "content": {"metadata": {"name": ["x"], "symbol": null}}
        }))
        .unwrap();
        assert!(asset.name().is_none());
    }

    #[test]
    fn malformed_attributes_are_dropped() {
        let raw = json!({
            "name": "x",
            "attributes": [
                "not an object",
                {"value": "no trait type"},
                {"trait_type": 7, "value": "numeric trait type"},
                {"trait_type": "Eyes", "value": 3},
                {"trait_type": "Background", "value": "Gorbage Truck"}
            ]
        });
        let meta: OffchainMetadata = serde_json::from_value(raw).unwrap();
        assert_eq!(meta.attributes.len(), 2);
        assert_eq!(meta.attributes[0].value, json!(3));
        assert!(meta.attributes[0].value_str().is_none());
    }

    #[test]
    fn attributes_that_are_not_a_list_are_ignored() {
        let meta: OffchainMetadata =
            serde_json::from_value(json!({"attributes": {"Background": "x"}})).unwrap();
        assert!(meta.attributes.is_empty());
    }

    #[test]
    fn unverified_creators_are_skipped() {
        let asset = Asset {
            creators: vec![
                Creator {
                    address: "Unverified".into(),
                    verified: false,
                    share: 50,
                },
                Creator {
                    address: "Verified".into(),
                    verified: true,
                    share: 50,
                },
            ],
            ..Default::default()
        };
        assert_eq!(asset.first_verified_creator(), Some("Verified"));
    }

    #[test]
    fn offchain_image_must_be_a_string() {
        let meta: OffchainMetadata =
            serde_json::from_value(json!({"image": {"uri": "x"}})).unwrap();
        assert!(meta.image_url().is_none());
        let meta: OffchainMetadata =
            serde_json::from_value(json!({"image": "ipfs://QmAbc/1.png"})).unwrap();
        assert_eq!(meta.image_url(), Some("ipfs://QmAbc/1.png"));
    }
}
