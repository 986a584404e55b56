#![doc = "strapi-adapter-core: data-access layer for the Strapi REST API."]

//! This crate contains the query building, pagination, response coercion and
//! normalization logic shared by every consumer of the adapter. It performs no
//! I/O of its own except through a [`contract::Transport`]; [`transport`]
//! provides the default `reqwest` implementation.
//!
//! # Usage
//! Build an [`AdapterConfig`], pick a transport and create a [`StrapiContext`].
//! Every operation returns a [`StandardResult`].

pub mod coerce;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod model;
pub mod normalize;
pub mod paginate;
pub mod query;
pub mod transport;

pub use coerce::{CoercedResponse, ResponseCoercer};
pub use config::{AdapterConfig, PartialPagePolicy, WarningConfig};
pub use context::StrapiContext;
pub use contract::{PageFetcher, RequestOptions, Transport};
pub use error::{ErrorBody, StandardResult, StrapiError};
pub use model::{CollectionMeta, CollectionPage, Entry, FullCollection, PageMetadata};
pub use normalize::ResponseNormalizer;
pub use paginate::PaginatedFetcher;
pub use query::{QueryBuilder, QuerySpec, RawQuery};
pub use transport::ReqwestTransport;
