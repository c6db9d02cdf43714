//! Consolidated metadata catalog.
//!
//! One `.zmetadata` document describes the whole hierarchy:
//!
//! ```json
//! {
//!   "zarr_consolidated_format": 1,
//!   "metadata": {
//!     ".zgroup": {"zarr_format": 2},
//!     "raw/.zarray": {"shape": [100, 4], "chunks": [10, 4], ...},
//!     "raw/.zattrs": {"units": "uV"}
//!   },
//!   "refs": {"raw/0.0": ["_consolidated_0.dat", 0, 160]}
//! }
//! ```
//!
//! Every entry is parsed into a typed descriptor when the catalog is built,
//! so later lookups never fail and never touch the network.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};
use zarr_codec::ArrayMetadata;

use crate::attrs::{attributes_from_json, AttrValue, Attributes};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::fetch::{FetchRequest, ObjectFetcher};
use crate::path;

pub const ZGROUP: &str = ".zgroup";
pub const ZARRAY: &str = ".zarray";
pub const ZATTRS: &str = ".zattrs";

const METADATA_SUFFIXES: [&str; 3] = [ZGROUP, ZARRAY, ZATTRS];

/// Group descriptor (`.zgroup`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    pub zarr_format: u8,
}

/// Location of a chunk packed into a larger file: `[file, offset, length]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, u64, u64)", into = "(String, u64, u64)")]
pub struct ChunkRef {
    pub file: String,
    pub offset: u64,
    pub length: u64,
}

impl From<(String, u64, u64)> for ChunkRef {
    fn from((file, offset, length): (String, u64, u64)) -> Self {
        Self { file, offset, length }
    }
}

impl From<ChunkRef> for (String, u64, u64) {
    fn from(r: ChunkRef) -> Self {
        (r.file, r.offset, r.length)
    }
}

/// Parsed consolidated metadata plus the parent-to-children index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    format: u64,
    /// Every entry as JSON-like values, keyed by its full key.
    raw: BTreeMap<String, AttrValue>,
    groups: BTreeMap<String, GroupMetadata>,
    arrays: BTreeMap<String, ArrayMetadata>,
    attributes: BTreeMap<String, Attributes>,
    children: HashMap<String, Vec<String>>,
    refs: HashMap<String, ChunkRef>,
}

fn parse_error(path: &str, message: impl ToString, raw: impl Into<String>) -> StoreError {
    StoreError::CatalogParse {
        path: path.to_string(),
        message: message.to_string(),
        raw: raw.into(),
    }
}

impl Catalog {
    /// Fetch and parse the consolidated metadata document.
    ///
    /// The fetch is always cache-busted so a store republished at the same
    /// URL is seen immediately.
    #[instrument(skip(fetcher, config), fields(key = %config.metadata_key))]
    pub async fn create(fetcher: &dyn ObjectFetcher, config: &StoreConfig) -> Result<Self> {
        let key = config.metadata_key.as_str();
        let url = fetcher.describe(key);
        let request = FetchRequest::whole(key).with_cache_bust(true);

        let bytes = match fetcher.fetch(&request).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                return Err(StoreError::OpenFailed {
                    url,
                    message: "consolidated metadata not found".to_string(),
                })
            }
            Err(e) => {
                return Err(StoreError::OpenFailed {
                    url,
                    message: e.to_string(),
                })
            }
        };

        let catalog = Self::from_json(key, &bytes)?;
        info!(
            url = %url,
            entries = catalog.raw.len(),
            arrays = catalog.arrays.len(),
            groups = catalog.groups.len(),
            refs = catalog.refs.len(),
            "Loaded consolidated metadata"
        );
        Ok(catalog)
    }

    /// Parse a consolidated metadata document. `source` names it in errors.
    pub fn from_json(source: &str, bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let doc: Value = serde_json::from_str(&text).map_err(|e| parse_error(source, e, &*text))?;

        let format = doc
            .get("zarr_consolidated_format")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        if format != 1 {
            return Err(parse_error(
                source,
                format!("unsupported zarr_consolidated_format {format}"),
                &*text,
            ));
        }

        let Some(metadata) = doc.get("metadata").and_then(Value::as_object) else {
            return Err(parse_error(source, "missing \"metadata\" object", &*text));
        };

        let mut catalog = Self {
            format,
            ..Default::default()
        };
        for (key, value) in metadata {
            catalog.insert_entry(path::normalize(key), value.clone())?;
        }

        if let Some(refs) = doc.get("refs") {
            let Some(refs) = refs.as_object() else {
                return Err(parse_error("refs", "expected an object", refs.to_string()));
            };
            for (key, value) in refs {
                let chunk_ref: ChunkRef = serde_json::from_value(value.clone())
                    .map_err(|e| parse_error(&format!("refs/{key}"), e, value.to_string()))?;
                catalog.refs.insert(path::normalize(key).to_string(), chunk_ref);
            }
        }

        catalog.build_children_index();
        Ok(catalog)
    }

    fn insert_entry(&mut self, key: &str, value: Value) -> Result<()> {
        // some writers store each entry as a JSON-encoded string
        let value = match value {
            Value::String(text) if text.trim_start().starts_with('{') => {
                serde_json::from_str(&text).map_err(|e| parse_error(key, e, text.as_str()))?
            }
            other => other,
        };

        let node = path::parent_of(key).to_string();
        match path::name_of(key) {
            ZARRAY => {
                let meta: ArrayMetadata = serde_json::from_value(value.clone())
                    .map_err(|e| parse_error(key, e, value.to_string()))?;
                meta.validate().map_err(|e| parse_error(key, e, value.to_string()))?;
                self.arrays.insert(node, meta);
            }
            ZGROUP => {
                let meta: GroupMetadata = serde_json::from_value(value.clone())
                    .map_err(|e| parse_error(key, e, value.to_string()))?;
                self.groups.insert(node, meta);
            }
            ZATTRS => {
                let attrs = attributes_from_json(value.clone())
                    .ok_or_else(|| parse_error(key, "attributes must be an object", value.to_string()))?;
                self.attributes.insert(node, attrs);
            }
            _ => debug!(key = %key, "Keeping unrecognized catalog entry"),
        }
        self.raw.insert(key.to_string(), AttrValue::from(value));
        Ok(())
    }

    fn build_children_index(&mut self) {
        for key in self.raw.keys() {
            if key == ZATTRS || key == ZGROUP {
                continue;
            }
            let parts: Vec<&str> = key.split('/').collect();
            if parts.len() <= 1 {
                continue;
            }
            let last = parts[parts.len() - 1];
            if !METADATA_SUFFIXES.contains(&last) {
                continue;
            }
            let node = parts[..parts.len() - 1].join("/");
            let parent = parts[..parts.len() - 2].join("/");
            let siblings = self.children.entry(parent).or_default();
            if !siblings.contains(&node) {
                siblings.push(node);
            }
        }
    }

    /// Consolidated format version of the document.
    pub fn format(&self) -> u64 {
        self.format
    }

    /// Zarr format of the root group, if there is one.
    pub fn zarr_format(&self) -> Option<u8> {
        self.groups.get("").map(|g| g.zarr_format)
    }

    /// Raw entry for a full key such as `a/b/.zattrs`.
    pub fn lookup(&self, key: &str) -> Option<&AttrValue> {
        self.raw.get(path::normalize(key))
    }

    /// Entry for the metadata document `suffix` of node `path`.
    pub fn lookup_node(&self, path: &str, suffix: &str) -> Option<&AttrValue> {
        self.raw.get(&path::metadata_key(path, suffix))
    }

    /// A dot-prefixed key absent from the catalog does not exist in the store.
    pub fn is_confirmed_missing(&self, key: &str) -> bool {
        path::is_hidden(key) && self.lookup(key).is_none()
    }

    pub fn group(&self, path: &str) -> Option<&GroupMetadata> {
        self.groups.get(path::normalize(path))
    }

    pub fn group_exists(&self, path: &str) -> bool {
        self.group(path).is_some()
    }

    pub fn array(&self, path: &str) -> Option<&ArrayMetadata> {
        self.arrays.get(path::normalize(path))
    }

    pub fn attributes(&self, path: &str) -> Option<&Attributes> {
        self.attributes.get(path::normalize(path))
    }

    /// Normalized paths of the nodes directly below `path`.
    pub fn children(&self, path: &str) -> &[String] {
        self.children
            .get(path::normalize(path))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Packed location of a chunk, if the store was bundled.
    pub fn chunk_ref(&self, key: &str) -> Option<&ChunkRef> {
        self.refs.get(path::normalize(key))
    }

    pub fn has_refs(&self) -> bool {
        !self.refs.is_empty()
    }

    /// Paths of every array in the store.
    pub fn array_paths(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "zarr_consolidated_format": 1,
            "metadata": {
                ".zgroup": {"zarr_format": 2},
                ".zattrs": {"title": "demo"},
                "a/.zgroup": {"zarr_format": 2},
                "a/.zattrs": {"offset": "___NaN___"},
                "a/x/.zarray": {
                    "shape": [10], "chunks": [5], "dtype": "<f4",
                    "compressor": null, "filters": null, "fill_value": 0, "order": "C"
                },
                "a/x/.zattrs": {"_SCALAR": false},
                "b/.zarray": {
                    "shape": [2, 2], "chunks": [2, 2], "dtype": "|u1",
                    "compressor": null, "filters": null, "fill_value": null, "order": "C"
                }
            },
            "refs": {
                "b/0.0": ["_consolidated_0.dat", 16, 4]
            }
        })
    }

    fn catalog() -> Catalog {
        Catalog::from_json(".zmetadata", doc().to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_typed_lookups() {
        let c = catalog();
        assert_eq!(c.zarr_format(), Some(2));
        assert!(c.group_exists("/"));
        assert!(c.group_exists("/a"));
        assert!(!c.group_exists("/b"));
        assert_eq!(c.array("/a/x").unwrap().shape, vec![10]);
        assert!(c.attributes("a").unwrap()["offset"].as_f64().unwrap().is_nan());
        assert_eq!(c.lookup("/.zattrs").unwrap().get("title").unwrap().as_str(), Some("demo"));
    }

    #[test]
    fn test_children_index() {
        let c = catalog();
        assert_eq!(c.children("/"), &["a".to_string(), "b".to_string()]);
        assert_eq!(c.children("a"), &["a/x".to_string()]);
        assert!(c.children("a/x").is_empty());
    }

    #[test]
    fn test_hidden_keys_absent_are_missing() {
        let c = catalog();
        assert!(c.is_confirmed_missing("b/.zattrs"));
        assert!(!c.is_confirmed_missing("a/.zattrs"));
        assert!(!c.is_confirmed_missing("b/0.0"));
    }

    #[test]
    fn test_refs() {
        let c = catalog();
        assert_eq!(
            c.chunk_ref("/b/0.0"),
            Some(&ChunkRef {
                file: "_consolidated_0.dat".to_string(),
                offset: 16,
                length: 4
            })
        );
        assert!(c.chunk_ref("b/0.1").is_none());
    }

    #[test]
    fn test_malformed_entry_names_path_and_raw_text() {
        let mut d = doc();
        d["metadata"]["a/x/.zarray"] = json!("{\"shape\": [10,");
        let err = Catalog::from_json(".zmetadata", d.to_string().as_bytes()).unwrap_err();
        match err {
            StoreError::CatalogParse { path, raw, .. } => {
                assert_eq!(path, "a/x/.zarray");
                assert_eq!(raw, "{\"shape\": [10,");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_invalid_array_descriptor_is_parse_error() {
        let mut d = doc();
        d["metadata"]["b/.zarray"]["chunks"] = json!([2]);
        assert!(matches!(
            Catalog::from_json(".zmetadata", d.to_string().as_bytes()),
            Err(StoreError::CatalogParse { path, .. }) if path == "b/.zarray"
        ));
    }

    #[test]
    fn test_malformed_document() {
        let err = Catalog::from_json(".zmetadata", b"{not json").unwrap_err();
        assert!(matches!(err, StoreError::CatalogParse { raw, .. } if raw == "{not json"));
    }
}
