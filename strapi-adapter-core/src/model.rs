//! Wire-level shapes of the CMS REST API.
//!
//! These are plain serde types. Entries keep any keys besides `id` and
//! `attributes` in [`Entry::extra`] so a round trip through the adapter never
//! loses data the CMS sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{id, attributes}`: the CMS's single-record envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entry {
    pub fn new(id: i64, attributes: Map<String, Value>) -> Self {
        Self {
            id,
            attributes,
            extra: Map::new(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Pagination block of a collection response. Fields the CMS leaves out
/// (`pagination[withCount]=false` drops `pageCount` and `total`) read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageMetadata {
    pub page: u32,
    pub page_size: u32,
    pub page_count: u32,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    #[serde(default)]
    pub pagination: PageMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `{data: Entry[], meta: {pagination}}`: one page of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPage {
    pub data: Vec<Entry>,
    pub meta: CollectionMeta,
}

/// Every page of a collection merged in page order.
///
/// `meta` is the metadata of the first page as returned by the CMS.
/// `missing_pages` lists page numbers in `2..=pageCount` that were not
/// retrieved; it is empty for a complete result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullCollection {
    pub data: Vec<Entry>,
    pub meta: CollectionMeta,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_pages: Vec<u32>,
}

impl FullCollection {
    pub fn is_complete(&self) -> bool {
        self.missing_pages.is_empty()
    }
}
