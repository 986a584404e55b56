//! # coerce: classify raw payloads as single entries or collections
//!
//! The CMS answers every GET with `{data, meta?}`. Whether `data` is one entry or
//! a page of entries is decided once, here, and recorded in [`CoercedResponse`].
//! Everything downstream matches on the variant instead of probing keys again.
//!
//! Classification failures never escape as panics: they come back as
//! [`StrapiError::ShapeMismatch`] carrying the collection name and, when known,
//! the id being resolved.

use serde_json::Value;
use tracing::error;

use crate::error::{StandardResult, StrapiError};
use crate::model::{CollectionPage, Entry};

/// Outcome of [`ResponseCoercer::coerce`].
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedResponse {
    /// `data` held a single entry; this is that entry.
    Entry(Value),
    /// A collection response, returned unchanged (`data` and `meta`).
    Collection(Value),
    /// A collection narrowed to one item. `None` when the collection was empty.
    Single(Option<Value>),
}

impl CoercedResponse {
    pub fn into_page(self, collection: &str) -> StandardResult<CollectionPage> {
        match self {
            CoercedResponse::Collection(payload) => serde_json::from_value(payload)
                .map_err(|e| StrapiError::shape_mismatch(collection, None, e.to_string())),
            other => Err(StrapiError::shape_mismatch(
                collection,
                None,
                format!("expected a collection response, got {}", other.kind()),
            )),
        }
    }

    pub fn into_entry(self, collection: &str, id: Option<&str>) -> StandardResult<Entry> {
        match self {
            CoercedResponse::Entry(entry) | CoercedResponse::Single(Some(entry)) => {
                parse_entry(entry, collection, id)
            }
            other => Err(StrapiError::shape_mismatch(
                collection,
                id,
                format!("expected a single entry, got {}", other.kind()),
            )),
        }
    }

    pub fn into_single(self, collection: &str, id: Option<&str>) -> StandardResult<Option<Entry>> {
        match self {
            CoercedResponse::Single(None) => Ok(None),
            other => other.into_entry(collection, id).map(Some),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            CoercedResponse::Entry(_) => "a single entry",
            CoercedResponse::Collection(_) => "a collection",
            CoercedResponse::Single(Some(_)) => "an extracted entry",
            CoercedResponse::Single(None) => "an empty collection",
        }
    }
}

fn parse_entry(entry: Value, collection: &str, id: Option<&str>) -> StandardResult<Entry> {
    serde_json::from_value(entry).map_err(|e| StrapiError::shape_mismatch(collection, id, e.to_string()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseCoercer;

impl ResponseCoercer {
    pub fn new() -> Self {
        ResponseCoercer
    }

    /// Classifies `raw`. A payload whose `data` carries `attributes` is a single
    /// entry, anything else with a `data` array or object is a collection. With
    /// `extract_single`, a collection is narrowed to its first element.
    pub fn coerce(
        &self,
        raw: Value,
        collection: &str,
        id: Option<&str>,
        extract_single: bool,
    ) -> StandardResult<CoercedResponse> {
        if is_falsy(&raw) {
            error!(collection, id, "No data returned from Strapi");
            return Err(StrapiError::EmptyPayload);
        }

        let is_entry = match raw.get("data") {
            Some(Value::Object(data)) => data.contains_key("attributes"),
            Some(Value::Array(_)) => false,
            Some(other) => {
                return Err(mismatch(
                    collection,
                    id,
                    format!("`data` must be an object or an array, got {}", type_name(other)),
                ))
            }
            None => {
                return Err(mismatch(
                    collection,
                    id,
                    format!("payload has no `data` key (payload is {})", type_name(&raw)),
                ))
            }
        };

        if is_entry {
            let data = take_data(raw);
            return Ok(CoercedResponse::Entry(data));
        }

        if !extract_single {
            return Ok(CoercedResponse::Collection(raw));
        }

        match take_data(raw) {
            Value::Array(items) => Ok(CoercedResponse::Single(items.into_iter().next())),
            data => Ok(CoercedResponse::Single(Some(data))),
        }
    }
}

fn mismatch(collection: &str, id: Option<&str>, reason: String) -> StrapiError {
    let err = StrapiError::shape_mismatch(collection, id, reason);
    error!(collection, id, error = %err, "Failed to classify Strapi response");
    err
}

fn take_data(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coercer() -> ResponseCoercer {
        ResponseCoercer::new()
    }

    #[test]
    fn empty_payload_is_an_error() {
        let err = coercer()
            .coerce(Value::Null, "articles", None, false)
            .unwrap_err();
        assert_eq!(err, StrapiError::EmptyPayload);
        assert_eq!(err.body().message, "No data returned from Strapi");
        assert_eq!(err.code(), 500);
    }

    #[test]
    fn data_with_attributes_is_a_single_entry() {
        let raw = json!({"data": {"id": 1, "attributes": {"title": "A"}}, "meta": {}});
        let coerced = coercer().coerce(raw, "articles", Some("1"), false).unwrap();
        assert_eq!(
            coerced,
            CoercedResponse::Entry(json!({"id": 1, "attributes": {"title": "A"}}))
        );
    }

    #[test]
    fn collection_is_returned_unchanged() {
        let raw = json!({
            "data": [{"id": 1, "attributes": {}}],
            "meta": {"pagination": {"page": 1, "pageSize": 25, "pageCount": 1, "total": 1}}
        });
        let coerced = coercer().coerce(raw.clone(), "articles", None, false).unwrap();
        assert_eq!(coerced, CoercedResponse::Collection(raw));
    }

    #[test]
    fn extract_single_takes_first_item_or_none() {
        let raw = json!({"data": [{"id": 5, "attributes": {"slug": "a"}}, {"id": 6, "attributes": {}}]});
        let coerced = coercer().coerce(raw, "articles", Some("a"), true).unwrap();
        assert_eq!(
            coerced,
            CoercedResponse::Single(Some(json!({"id": 5, "attributes": {"slug": "a"}})))
        );

        let empty = coercer()
            .coerce(json!({"data": []}), "articles", Some("a"), true)
            .unwrap();
        assert_eq!(empty, CoercedResponse::Single(None));
    }

    #[test]
    fn extract_single_on_non_array_data_returns_data_itself() {
        let raw = json!({"data": {"id": 9}});
        let coerced = coercer().coerce(raw, "pages", None, true).unwrap();
        assert_eq!(coerced, CoercedResponse::Single(Some(json!({"id": 9}))));
    }

    #[test]
    fn malformed_payloads_become_shape_mismatch_with_context() {
        let err = coercer()
            .coerce(json!({"data": "oops"}), "articles", Some("42"), false)
            .unwrap_err();
        match err {
            StrapiError::ShapeMismatch { collection, id, .. } => {
                assert_eq!(collection, "articles");
                assert_eq!(id.as_deref(), Some("42"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = coercer()
            .coerce(json!({"meta": {}}), "articles", None, false)
            .unwrap_err();
        assert!(matches!(err, StrapiError::ShapeMismatch { id: None, .. }));
    }

    #[test]
    fn typed_conversions_report_the_wrong_variant() {
        let entry = CoercedResponse::Entry(json!({"id": 1, "attributes": {}}));
        assert!(matches!(
            entry.into_page("articles"),
            Err(StrapiError::ShapeMismatch { .. })
        ));

        let single = CoercedResponse::Single(None);
        assert_eq!(single.into_single("articles", Some("x")).unwrap(), None);
    }
}
