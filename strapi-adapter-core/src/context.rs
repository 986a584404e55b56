//! # context: the public entry point of the adapter
//!
//! [`StrapiContext`] ties the pieces together: it turns collection names into
//! endpoint paths, builds query strings with [`QueryBuilder`], sends reads and
//! writes through the injected [`Transport`] and classifies answers with
//! [`ResponseCoercer`]. It also implements [`PageFetcher`], which is what
//! [`PaginatedFetcher`] drives for full-collection reads.
//!
//! ## Example
//! ```no_run
//! use strapi_adapter_core::{AdapterConfig, ReqwestTransport, StrapiContext};
//!
//! # async fn demo() -> strapi_adapter_core::StandardResult<()> {
//! let config = AdapterConfig::new("https://cms.example.com");
//! let transport = ReqwestTransport::new(config.api_location.clone());
//! let ctx = StrapiContext::new(config, transport)?;
//! let articles = ctx.get_full_collection("articles", "populate=*").await?;
//! println!("{} articles", articles.data.len());
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::coerce::ResponseCoercer;
use crate::config::AdapterConfig;
use crate::contract::{PageFetcher, RequestOptions, Transport};
use crate::error::{StandardResult, StrapiError};
use crate::model::{CollectionPage, Entry, FullCollection};
use crate::normalize::ResponseNormalizer;
use crate::paginate::PaginatedFetcher;
use crate::query::{QueryBuilder, QuerySpec, RawQuery};

pub const NO_ENTRY_FOR_SLUG: &str = "No entry found for slug";

pub struct StrapiContext<T: Transport> {
    config: AdapterConfig,
    transport: T,
    queries: QueryBuilder,
    coercer: ResponseCoercer,
    normalizer: ResponseNormalizer,
    pages: PaginatedFetcher,
    duplicate_slashes: Regex,
}

impl<T: Transport> StrapiContext<T> {
    pub fn new(config: AdapterConfig, transport: T) -> StandardResult<Self> {
        config.validate()?;
        config.trace_loaded();
        let duplicate_slashes = Regex::new(r"([^:]/)/+")
            .map_err(|e| StrapiError::Config(format!("endpoint pattern: {e}")))?;
        Ok(Self {
            pages: PaginatedFetcher::from_config(&config),
            config,
            transport,
            queries: QueryBuilder::new(),
            coercer: ResponseCoercer::new(),
            normalizer: ResponseNormalizer::new(),
            duplicate_slashes,
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// `articles` -> `api/articles`, with duplicate slashes collapsed and no leading slash.
    pub fn api_endpoint(&self, collection: &str) -> String {
        let joined = format!("{}/{}", self.config.api_endpoint, collection);
        self.duplicate_slashes
            .replace_all(&joined, "$1")
            .trim_start_matches('/')
            .to_string()
    }

    /// Flattens a raw payload (or any part of one) into plain records.
    pub fn normalize(&self, value: &Value) -> Value {
        self.normalizer.normalize(value)
    }

    /// One page of `collection`. Explicit `page` and `page_size` win over any
    /// pagination in `query`.
    pub async fn get_collection<'q>(
        &self,
        collection: &str,
        page: u32,
        page_size: u32,
        query: impl Into<RawQuery<'q>>,
    ) -> StandardResult<CollectionPage> {
        let spec = to_spec(query.into())?;
        match self.fetch_page(collection, page, page_size, &spec).await? {
            Some(page) => Ok(page),
            None => {
                error!(collection, page, "No data returned from Strapi");
                Err(StrapiError::EmptyPayload)
            }
        }
    }

    /// Every page of `collection`, merged in page order.
    pub async fn get_full_collection<'q>(
        &self,
        collection: &str,
        query: impl Into<RawQuery<'q>>,
    ) -> StandardResult<FullCollection> {
        let spec = to_spec(query.into())?;
        self.pages.fetch_full_collection(self, collection, &spec).await
    }

    pub async fn get_entry<'q>(
        &self,
        collection: &str,
        id: impl Display,
        query: impl Into<RawQuery<'q>>,
    ) -> StandardResult<Entry> {
        let id = id.to_string();
        let url = self.entry_url(collection, Some(&id), query.into())?;

        let raw = self.get(collection, &url).await?;
        self.coercer
            .coerce(raw, collection, Some(&id), false)?
            .into_entry(collection, Some(&id))
    }

    /// The first entry whose `slug` equals `slug`, or [`StrapiError::NotFound`].
    pub async fn get_entry_by_slug<'q>(
        &self,
        collection: &str,
        slug: &str,
        query: impl Into<RawQuery<'q>>,
    ) -> StandardResult<Entry> {
        let spec = to_spec(query.into())?;
        let by_slug = QuerySpec::new().filter(&["slug", "$eq"], slug);
        let spec = self.queries.merge(&spec, &by_slug);
        let url = self.collection_url(collection, 1, 1, &spec)?;

        let raw = self.get(collection, &url).await?;
        let entry = self
            .coercer
            .coerce(raw, collection, Some(slug), true)?
            .into_single(collection, Some(slug))?;

        entry.ok_or_else(|| {
            debug!(collection, slug, "No entry found for slug");
            StrapiError::NotFound {
                message: NO_ENTRY_FOR_SLUG.to_string(),
            }
        })
    }

    /// A single type such as `homepage`.
    pub async fn get_single<'q>(
        &self,
        single: &str,
        query: impl Into<RawQuery<'q>>,
    ) -> StandardResult<Entry> {
        let url = self.entry_url(single, None, query.into())?;

        let raw = self.get(single, &url).await?;
        self.coercer
            .coerce(raw, single, None, false)?
            .into_entry(single, None)
    }

    /// Creates an entry in `collection`. `data` holds the attributes and is
    /// sent as `{"data": data}`.
    pub async fn create<'q>(
        &self,
        collection: &str,
        data: Value,
        query: impl Into<RawQuery<'q>>,
    ) -> StandardResult<Entry> {
        let url = self.entry_url(collection, None, query.into())?;
        let body = json!({ "data": data });
        let raw = logged(
            self.transport
                .post(&url, &body, &RequestOptions::for_collection(collection))
                .await,
            collection,
            &url,
        )?;
        self.coercer
            .coerce(raw, collection, None, false)?
            .into_entry(collection, None)
    }

    /// Updates entry `id` of `collection` with a PUT of `{"data": data}`.
    pub async fn update<'q>(
        &self,
        collection: &str,
        id: impl Display,
        data: Value,
        query: impl Into<RawQuery<'q>>,
    ) -> StandardResult<Entry> {
        let id = id.to_string();
        let url = self.entry_url(collection, Some(&id), query.into())?;
        self.put(collection, Some(&id), &url, data).await
    }

    /// Updates a single type, which has no id.
    pub async fn update_single<'q>(
        &self,
        single: &str,
        data: Value,
        query: impl Into<RawQuery<'q>>,
    ) -> StandardResult<Entry> {
        let url = self.entry_url(single, None, query.into())?;
        self.put(single, None, &url, data).await
    }

    /// Deletes entry `id` and returns it as the CMS reports it.
    pub async fn delete(&self, collection: &str, id: impl Display) -> StandardResult<Entry> {
        let id = id.to_string();
        let url = format!("{}/{}", self.api_endpoint(collection), id);
        let raw = logged(
            self.transport
                .delete(&url, &RequestOptions::for_collection(collection))
                .await,
            collection,
            &url,
        )?;
        self.coercer
            .coerce(raw, collection, Some(&id), false)?
            .into_entry(collection, Some(&id))
    }

    async fn put(
        &self,
        collection: &str,
        id: Option<&str>,
        url: &str,
        data: Value,
    ) -> StandardResult<Entry> {
        let body = json!({ "data": data });
        let raw = logged(
            self.transport
                .put(url, &body, &RequestOptions::for_collection(collection))
                .await,
            collection,
            url,
        )?;
        self.coercer
            .coerce(raw, collection, id, false)?
            .into_entry(collection, id)
    }

    /// `{endpoint}[/{id}][?query]`
    fn entry_url(
        &self,
        collection: &str,
        id: Option<&str>,
        query: RawQuery<'_>,
    ) -> StandardResult<String> {
        let spec = to_spec(query)?;
        let mut url = self.api_endpoint(collection);
        if let Some(id) = id {
            url.push('/');
            url.push_str(id);
        }
        url.push_str(&self.queries.sanitize(&spec, true)?);
        Ok(url)
    }

    fn collection_url(
        &self,
        collection: &str,
        page: u32,
        page_size: u32,
        query: &QuerySpec,
    ) -> StandardResult<String> {
        let rest = self.queries.sanitize(&query.without_pagination(), false)?;
        let mut url = format!(
            "{}?pagination[page]={page}&pagination[pageSize]={page_size}",
            self.api_endpoint(collection)
        );
        if !rest.is_empty() {
            url.push('&');
            url.push_str(&rest);
        }
        Ok(url)
    }

    async fn get(&self, collection: &str, url: &str) -> StandardResult<Value> {
        logged(
            self.transport
                .get(url, &RequestOptions::for_collection(collection))
                .await,
            collection,
            url,
        )
    }
}

#[async_trait]
impl<T: Transport> PageFetcher for StrapiContext<T> {
    async fn fetch_page(
        &self,
        collection: &str,
        page: u32,
        page_size: u32,
        query: &QuerySpec,
    ) -> StandardResult<Option<CollectionPage>> {
        let url = self.collection_url(collection, page, page_size, query)?;
        let raw = self.get(collection, &url).await?;
        if raw.is_null() {
            return Ok(None);
        }
        self.coercer
            .coerce(raw, collection, None, false)?
            .into_page(collection)
            .map(Some)
    }
}

fn logged(result: StandardResult<Value>, collection: &str, url: &str) -> StandardResult<Value> {
    result.map_err(|e| {
        error!(collection, url, error = %e, "Request to Strapi failed");
        e
    })
}

fn to_spec(query: RawQuery<'_>) -> StandardResult<QuerySpec> {
    query.to_spec().map_err(|e| {
        error!(error = %e, "Error parsing query parameters");
        StrapiError::from(e)
    })
}
