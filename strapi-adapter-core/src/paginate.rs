//! # paginate: full-collection retrieval
//!
//! [`PaginatedFetcher::fetch_full_collection`] fetches page 1 to learn
//! `pageCount`, fans out over pages `2..=pageCount` and merges every page back
//! in ascending page order. Entries are tagged with their page number before the
//! merge, so the result does not depend on which request finished first.
//!
//! A failed first page aborts the call before any other page is requested.
//! Failures on later pages are governed by [`PartialPagePolicy`]: with `Drop`
//! they are logged and left out (their numbers are reported in
//! [`FullCollection::missing_pages`]), with `Fail` the call returns
//! [`StrapiError::PartialAggregation`].

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::config::{AdapterConfig, PartialPagePolicy};
use crate::contract::PageFetcher;
use crate::error::{StandardResult, StrapiError};
use crate::model::{CollectionPage, Entry, FullCollection};
use crate::query::{QueryBuilder, QuerySpec};

type PageOutcome = (u32, StandardResult<Option<CollectionPage>>);

#[derive(Debug, Clone)]
pub struct PaginatedFetcher {
    default_page_size: u32,
    concurrency: Option<usize>,
    policy: PartialPagePolicy,
    queries: QueryBuilder,
}

impl PaginatedFetcher {
    pub fn new(default_page_size: u32) -> Self {
        Self {
            default_page_size,
            concurrency: None,
            policy: PartialPagePolicy::Drop,
            queries: QueryBuilder::new(),
        }
    }

    pub fn from_config(config: &AdapterConfig) -> Self {
        Self::new(config.default_page_size)
            .with_concurrency(config.page_concurrency)
            .with_policy(config.partial_page_policy)
    }

    /// `None` issues every remaining page at once.
    pub fn with_concurrency(mut self, limit: Option<usize>) -> Self {
        self.concurrency = limit.map(|n| n.max(1));
        self
    }

    pub fn with_policy(mut self, policy: PartialPagePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The query used for page 1: the default page size, overridden by the
    /// caller's pagination, with the page forced to 1.
    pub fn initial_query(&self, query: &QuerySpec) -> QuerySpec {
        let defaults = QuerySpec::new().page(1).page_size(self.default_page_size);
        let merged = self.queries.merge(&defaults, query);
        self.queries.merge(&merged, &QuerySpec::new().page(1))
    }

    pub async fn fetch_full_collection<P>(
        &self,
        source: &P,
        collection: &str,
        query: &QuerySpec,
    ) -> StandardResult<FullCollection>
    where
        P: PageFetcher + ?Sized,
    {
        let initial = self.initial_query(query);
        let page_size = initial.pagination().page_size.unwrap_or(self.default_page_size);

        let first = match source.fetch_page(collection, 1, page_size, &initial).await {
            Ok(Some(page)) => page,
            Ok(None) => {
                error!(collection, page = 1, "No data returned for the first page");
                return Err(StrapiError::EmptyPayload);
            }
            Err(e) => {
                error!(collection, page = 1, error = %e, "Failed to fetch the first page");
                return Err(e);
            }
        };

        // A missing `pageCount` reads as 0 and is treated as a single page.
        let page_count = first.meta.pagination.page_count;
        if page_count <= 1 {
            debug!(collection, entries = first.data.len(), "Collection fits on one page");
            return Ok(FullCollection {
                data: first.data,
                meta: first.meta,
                missing_pages: Vec::new(),
            });
        }

        let remaining: Vec<u32> = (2..=page_count).collect();
        info!(
            collection,
            page_count,
            page_size,
            concurrency = ?self.concurrency,
            "Fetching remaining pages"
        );

        let outcomes = self
            .fetch_remaining(source, collection, page_size, &initial, remaining.clone())
            .await;

        let CollectionPage { data, meta } = first;
        let mut tagged: Vec<(u32, Entry)> = data.into_iter().map(|entry| (1, entry)).collect();
        let mut retrieved = Vec::with_capacity(outcomes.len());
        let query_string = initial.to_query_string();

        for (page, outcome) in outcomes {
            match outcome {
                Ok(Some(page_data)) => {
                    retrieved.push(page);
                    tagged.extend(page_data.data.into_iter().map(|entry| (page, entry)));
                }
                Ok(None) => {
                    error!(collection, page, query = %query_string, "No data returned from Strapi, dropping page");
                }
                Err(e) => {
                    error!(collection, page, query = %query_string, error = %e, "Failed to fetch page, dropping it");
                }
            }
        }

        let missing_pages: Vec<u32> = remaining
            .into_iter()
            .filter(|page| !retrieved.contains(page))
            .collect();

        if !missing_pages.is_empty() {
            match self.policy {
                PartialPagePolicy::Fail => {
                    return Err(StrapiError::PartialAggregation {
                        collection: collection.to_string(),
                        missing_pages,
                    });
                }
                PartialPagePolicy::Drop => {
                    warn!(collection, ?missing_pages, "Returning an incomplete collection");
                }
            }
        }

        tagged.sort_by_key(|(page, _)| *page);
        let data: Vec<Entry> = tagged.into_iter().map(|(_, entry)| entry).collect();
        debug!(collection, entries = data.len(), "Merged collection pages");

        Ok(FullCollection {
            data,
            meta,
            missing_pages,
        })
    }

    async fn fetch_remaining<P>(
        &self,
        source: &P,
        collection: &str,
        page_size: u32,
        query: &QuerySpec,
        pages: Vec<u32>,
    ) -> Vec<PageOutcome>
    where
        P: PageFetcher + ?Sized,
    {
        let fetch = |page: u32| async move {
            (page, source.fetch_page(collection, page, page_size, query).await)
        };

        match self.concurrency {
            None => join_all(pages.into_iter().map(fetch)).await,
            Some(limit) => {
                stream::iter(pages)
                    .map(fetch)
                    .buffer_unordered(limit)
                    .collect()
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockPageFetcher;
    use crate::model::{CollectionMeta, PageMetadata};
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn page(number: u32, page_count: u32, ids: &[i64]) -> CollectionPage {
        CollectionPage {
            data: ids
                .iter()
                .map(|id| {
                    let mut attributes = Map::new();
                    attributes.insert("page".into(), json!(number));
                    Entry::new(*id, attributes)
                })
                .collect(),
            meta: CollectionMeta {
                pagination: PageMetadata {
                    page: number,
                    page_size: 2,
                    page_count,
                    total: u64::from(page_count) * 2,
                },
                extra: Map::new(),
            },
        }
    }

    fn ids(collection: &FullCollection) -> Vec<i64> {
        collection.data.iter().map(|e| e.id).collect()
    }

    /// Serves fixed pages with a per-page delay and records request concurrency.
    #[derive(Default)]
    struct DelayedPages {
        pages: HashMap<u32, (u64, StandardResult<Option<CollectionPage>>)>,
        requested: Mutex<Vec<u32>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl DelayedPages {
        fn with(mut self, number: u32, delay_ms: u64, result: StandardResult<Option<CollectionPage>>) -> Self {
            self.pages.insert(number, (delay_ms, result));
            self
        }
    }

    #[async_trait]
    impl PageFetcher for DelayedPages {
        async fn fetch_page(
            &self,
            _collection: &str,
            page: u32,
            _page_size: u32,
            _query: &QuerySpec,
        ) -> StandardResult<Option<CollectionPage>> {
            self.requested.lock().unwrap().push(page);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let (delay, result) = self
                .pages
                .get(&page)
                .cloned()
                .unwrap_or((0, Err(StrapiError::transport("unknown page", 404))));
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn single_page_collection_is_returned_unchanged() {
        let mut source = MockPageFetcher::new();
        source
            .expect_fetch_page()
            .withf(|collection, page, size, _| collection == "articles" && *page == 1 && *size == 25)
            .times(1)
            .returning(|_, _, _, _| Ok(Some(page(1, 1, &[1, 2]))));

        let result = PaginatedFetcher::new(25)
            .fetch_full_collection(&source, "articles", &QuerySpec::new())
            .await
            .unwrap();

        assert_eq!(ids(&result), vec![1, 2]);
        assert_eq!(result.meta.pagination.page_count, 1);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn first_page_without_page_count_is_a_single_page() {
        let mut source = MockPageFetcher::new();
        source
            .expect_fetch_page()
            .times(1)
            .returning(|_, _, _, _| {
                let mut first = page(1, 0, &[1, 2]);
                first.meta.pagination = PageMetadata::default();
                Ok(Some(first))
            });

        let result = PaginatedFetcher::new(25)
            .fetch_full_collection(&source, "articles", &QuerySpec::new())
            .await
            .unwrap();

        assert_eq!(ids(&result), vec![1, 2]);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn first_page_failure_aborts_without_further_requests() {
        let mut source = MockPageFetcher::new();
        source
            .expect_fetch_page()
            .times(1)
            .returning(|_, _, _, _| Err(StrapiError::transport("boom", 502)));

        let err = PaginatedFetcher::new(25)
            .fetch_full_collection(&source, "articles", &QuerySpec::new())
            .await
            .unwrap_err();

        assert_eq!(err, StrapiError::transport("boom", 502));
    }

    #[tokio::test]
    async fn empty_first_page_is_an_empty_payload_error() {
        let mut source = MockPageFetcher::new();
        source
            .expect_fetch_page()
            .times(1)
            .returning(|_, _, _, _| Ok(None));

        let err = PaginatedFetcher::new(25)
            .fetch_full_collection(&source, "articles", &QuerySpec::new())
            .await
            .unwrap_err();

        assert_eq!(err, StrapiError::EmptyPayload);
    }

    #[tokio::test]
    async fn merged_order_follows_pages_not_completion_order() {
        let source = DelayedPages::default()
            .with(1, 0, Ok(Some(page(1, 3, &[1, 2]))))
            .with(2, 60, Ok(Some(page(2, 3, &[3, 4]))))
            .with(3, 0, Ok(Some(page(3, 3, &[5, 6]))));

        let result = PaginatedFetcher::new(2)
            .fetch_full_collection(&source, "articles", &QuerySpec::new())
            .await
            .unwrap();

        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(result.meta.pagination.page, 1);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn failed_later_page_is_dropped_and_reported() {
        let source = DelayedPages::default()
            .with(1, 0, Ok(Some(page(1, 3, &[1, 2]))))
            .with(2, 0, Err(StrapiError::transport("timeout", 504)))
            .with(3, 0, Ok(Some(page(3, 3, &[5, 6]))));

        let result = PaginatedFetcher::new(2)
            .fetch_full_collection(&source, "articles", &QuerySpec::new())
            .await
            .unwrap();

        assert_eq!(ids(&result), vec![1, 2, 5, 6]);
        assert_eq!(result.missing_pages, vec![2]);
    }

    #[tokio::test]
    async fn fail_policy_surfaces_missing_pages() {
        let source = DelayedPages::default()
            .with(1, 0, Ok(Some(page(1, 4, &[1]))))
            .with(2, 0, Ok(None))
            .with(3, 0, Ok(Some(page(3, 4, &[3]))))
            .with(4, 0, Err(StrapiError::transport("gone", 500)));

        let err = PaginatedFetcher::new(1)
            .with_policy(PartialPagePolicy::Fail)
            .fetch_full_collection(&source, "articles", &QuerySpec::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StrapiError::PartialAggregation {
                collection: "articles".into(),
                missing_pages: vec![2, 4],
            }
        );
    }

    #[tokio::test]
    async fn bounded_concurrency_limits_requests_in_flight() {
        let mut source = DelayedPages::default().with(1, 0, Ok(Some(page(1, 7, &[1]))));
        for n in 2..=7 {
            source = source.with(n, 20, Ok(Some(page(n, 7, &[i64::from(n)]))));
        }

        let result = PaginatedFetcher::new(1)
            .with_concurrency(Some(2))
            .fetch_full_collection(&source, "articles", &QuerySpec::new())
            .await
            .unwrap();

        assert_eq!(ids(&result), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(source.requested.lock().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn unbounded_fan_out_requests_all_pages_at_once() {
        let mut source = DelayedPages::default().with(1, 0, Ok(Some(page(1, 5, &[1]))));
        for n in 2..=5 {
            source = source.with(n, 20, Ok(Some(page(n, 5, &[i64::from(n)]))));
        }

        PaginatedFetcher::new(1)
            .fetch_full_collection(&source, "articles", &QuerySpec::new())
            .await
            .unwrap();

        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn initial_query_honours_caller_page_size_and_forces_page_one() {
        let fetcher = PaginatedFetcher::new(25);
        let query = QuerySpec::new().page(4).page_size(100).populate("*");
        let initial = fetcher.initial_query(&query);
        assert_eq!(initial.pagination().page, Some(1));
        assert_eq!(initial.pagination().page_size, Some(100));
        assert_eq!(initial.get("populate"), Some(&json!("*")));

        let defaults = fetcher.initial_query(&QuerySpec::new());
        assert_eq!(defaults.pagination().page_size, Some(25));
    }
}
