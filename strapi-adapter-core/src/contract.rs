//! # contract: the seams between the adapter core and its collaborators
//!
//! This module defines the two traits the core is written against:
//!
//! - [`Transport`]: one logical request against the CMS (GET, plus the
//!   optional writes POST, PUT and DELETE). Authentication, base URLs,
//!   caching, timeouts and retries all belong to the implementor. The core never
//!   constructs or stores credentials.
//! - [`PageFetcher`]: fetch one page of a collection. [`crate::StrapiContext`]
//!   implements it on top of a [`Transport`]; the full-collection aggregation in
//!   [`crate::paginate`] only ever talks to this trait.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall` (`MockTransport`, `MockPageFetcher`),
//! exported for downstream crates through the `test-export-mocks` feature.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde_json::Value;

use crate::error::{StandardResult, StrapiError};
use crate::model::CollectionPage;
use crate::query::QuerySpec;

/// Tag attached to every read so caching transports can drop everything at once.
pub const FULL_REVALIDATION_TAG: &str = "atlas::full-revalidation";

/// Per-request hints passed through to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Cache tags (collection name plus [`FULL_REVALIDATION_TAG`] for reads).
    pub tags: Vec<String>,
}

impl RequestOptions {
    pub fn for_collection(collection: &str) -> Self {
        Self {
            tags: vec![collection.to_string(), FULL_REVALIDATION_TAG.to_string()],
        }
    }
}

/// One logical request per call. `url` is relative to the transport's base URL
/// and already contains the query string. `Ok(Value::Null)` means the request
/// succeeded without a payload.
///
/// Only `get` is required. Read-only transports keep the default write
/// methods, which fail with a 405 transport error.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, options: &RequestOptions) -> StandardResult<Value>;

    /// `body` is sent as JSON.
    async fn post(
        &self,
        url: &str,
        _body: &Value,
        _options: &RequestOptions,
    ) -> StandardResult<Value> {
        Err(unsupported("POST", url))
    }

    async fn put(
        &self,
        url: &str,
        _body: &Value,
        _options: &RequestOptions,
    ) -> StandardResult<Value> {
        Err(unsupported("PUT", url))
    }

    async fn delete(&self, url: &str, _options: &RequestOptions) -> StandardResult<Value> {
        Err(unsupported("DELETE", url))
    }
}

fn unsupported(method: &str, url: &str) -> StrapiError {
    StrapiError::transport(format!("{method} {url} is not supported by this transport"), 405)
}

/// Fetch one page of `collection`. `Ok(None)` means the transport succeeded but
/// returned no payload.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        collection: &str,
        page: u32,
        page_size: u32,
        query: &QuerySpec,
    ) -> StandardResult<Option<CollectionPage>>;
}
