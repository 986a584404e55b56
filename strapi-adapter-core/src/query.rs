//! # query: bracket-notation query strings for the Strapi REST API
//!
//! [`QuerySpec`] is the canonical, in-memory form of a request's query parameters
//! (`filters`, `sort`, `fields`, `populate`, `pagination`, `_q`, ...). It can be
//! built fluently, parsed from a query string, or lifted from a JSON object.
//!
//! [`QueryBuilder`] owns the two operations the rest of the crate relies on:
//! - [`QueryBuilder::sanitize`]: turn a spec (or an existing string) into a query
//!   string that is safe to concatenate into a larger query.
//! - [`QueryBuilder::merge`]: deep-merge two specs, with `pagination` fields merged
//!   independently.
//!
//! Nested keys are written the way the CMS expects them: `filters[slug][$eq]=foo`,
//! arrays with explicit indices (`sort[0]=title`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;

pub const PAGINATION: &str = "pagination";
pub const PAGE: &str = "page";
pub const PAGE_SIZE: &str = "pageSize";
pub const SEARCH: &str = "_q";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A query value that is not a JSON object cannot be expressed as key/value pairs.
    #[error("query parameters must be an object, got: {0}")]
    NotAnObject(String),

    #[error("malformed query key: {0}")]
    MalformedKey(String),
}

/// Page selection as found under the `pagination` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Canonical query parameters. Top-level `page` / `pageSize` never survive
/// construction: they are folded into `pagination`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySpec(Map<String, Value>);

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Object(map) => Ok(Self::canonical(map)),
            Value::Null => Ok(Self::default()),
            other => Err(QueryError::NotAnObject(other.to_string())),
        }
    }

    /// Parses `a[b][0]=x&c=y` (with or without a leading `?`) into nested values.
    /// Values are kept as strings, exactly as the CMS would receive them.
    pub fn parse(query: &str) -> Result<Self, QueryError> {
        let query = query.trim_start_matches(['?', '&']);
        let mut root = Map::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let segments = split_key(&key)?;
            insert_path(&mut root, &segments, Value::String(value.into_owned()))?;
        }
        let root = root
            .into_iter()
            .map(|(k, v)| (k, arrayify(v)))
            .collect::<Map<_, _>>();
        Ok(Self::canonical(root))
    }

    fn canonical(mut map: Map<String, Value>) -> Self {
        let page = map.remove(PAGE);
        let page_size = map.remove(PAGE_SIZE);
        if !map.contains_key(PAGINATION) {
            let mut pagination = Map::new();
            if let Some(page) = page.filter(|v| !v.is_null()) {
                pagination.insert(PAGE.into(), page);
            }
            if let Some(size) = page_size.filter(|v| !v.is_null()) {
                pagination.insert(PAGE_SIZE.into(), size);
            }
            if !pagination.is_empty() {
                map.insert(PAGINATION.into(), Value::Object(pagination));
            }
        }
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn pagination(&self) -> Pagination {
        let section = self.0.get(PAGINATION);
        let read = |key: &str| section.and_then(|p| p.get(key)).and_then(as_u32);
        Pagination {
            page: read(PAGE),
            page_size: read(PAGE_SIZE),
        }
    }

    /// Drops `pagination[page]` and `pagination[pageSize]`. Other pagination
    /// keys such as `withCount` stay.
    pub fn without_pagination(&self) -> Self {
        let mut map = self.0.clone();
        if let Some(Value::Object(pagination)) = map.get_mut(PAGINATION) {
            pagination.remove(PAGE);
            pagination.remove(PAGE_SIZE);
        }
        if matches!(map.get(PAGINATION), Some(Value::Object(p)) if p.is_empty()) {
            map.remove(PAGINATION);
        }
        Self(map)
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        if key == PAGE || key == PAGE_SIZE {
            return self.set_path(&[PAGINATION, key.as_str()], value);
        }
        self.0.insert(key, value);
        self
    }

    /// `filter(&["slug", "$eq"], "foo")` yields `filters[slug][$eq]=foo`.
    pub fn filter(self, path: &[&str], value: impl Into<Value>) -> Self {
        let mut full = Vec::with_capacity(path.len() + 1);
        full.push("filters");
        full.extend_from_slice(path);
        self.set_path(&full, value.into())
    }

    pub fn sort<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set("sort", string_array(fields))
    }

    pub fn fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set("fields", string_array(fields))
    }

    pub fn populate(self, populate: impl Into<Value>) -> Self {
        self.set("populate", populate)
    }

    pub fn search(self, text: impl Into<String>) -> Self {
        self.set(SEARCH, Value::String(text.into()))
    }

    pub fn page(self, page: u32) -> Self {
        self.set_path(&[PAGINATION, PAGE], Value::from(page))
    }

    pub fn page_size(self, page_size: u32) -> Self {
        self.set_path(&[PAGINATION, PAGE_SIZE], Value::from(page_size))
    }

    fn set_path(mut self, path: &[&str], value: Value) -> Self {
        insert_at(&mut self.0, path, value);
        self
    }

    /// Serializes to `key[sub]=value` pairs joined by `&`, without any prefix.
    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::new();
        for (key, value) in &self.0 {
            serialize_into(encode(key), value, &mut pairs);
        }
        pairs.join("&")
    }
}

/// Anything [`QueryBuilder::sanitize`] accepts.
#[derive(Debug, Clone, Copy)]
pub enum RawQuery<'a> {
    Text(&'a str),
    Spec(&'a QuerySpec),
    Value(&'a Value),
}

impl RawQuery<'_> {
    pub fn to_spec(self) -> Result<QuerySpec, QueryError> {
        match self {
            RawQuery::Text(text) => QuerySpec::parse(text),
            RawQuery::Spec(spec) => Ok(spec.clone()),
            RawQuery::Value(value) => QuerySpec::from_value(value.clone()),
        }
    }
}

impl<'a> From<&'a str> for RawQuery<'a> {
    fn from(s: &'a str) -> Self {
        RawQuery::Text(s)
    }
}

impl<'a> From<&'a String> for RawQuery<'a> {
    fn from(s: &'a String) -> Self {
        RawQuery::Text(s.as_str())
    }
}

impl<'a> From<&'a QuerySpec> for RawQuery<'a> {
    fn from(spec: &'a QuerySpec) -> Self {
        RawQuery::Spec(spec)
    }
}

impl<'a> From<&'a Value> for RawQuery<'a> {
    fn from(value: &'a Value) -> Self {
        RawQuery::Value(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder
    }

    /// Produces a query string that can be appended to a URL or concatenated with
    /// another query string. A leading `?`/`&` is stripped, accidental `&?`
    /// sequences are collapsed, and `?` is prepended only when requested and the
    /// result is non-empty.
    pub fn sanitize<'a>(
        &self,
        query: impl Into<RawQuery<'a>>,
        add_prefix: bool,
    ) -> Result<String, QueryError> {
        let query = match query.into() {
            RawQuery::Text(text) => text.to_string(),
            RawQuery::Spec(spec) => spec.to_query_string(),
            RawQuery::Value(value) => match QuerySpec::from_value(value.clone()) {
                Ok(spec) => spec.to_query_string(),
                Err(e) => {
                    error!(error = %e, query = %value, "Error parsing query parameters object");
                    return Err(e);
                }
            },
        };

        let trimmed = query.trim_start_matches(['?', '&']);
        if trimmed.is_empty() {
            return Ok(String::new());
        }
        let prefix = if add_prefix { "?" } else { "" };
        Ok(format!("{prefix}{trimmed}").replace("&?", "&"))
    }

    /// Deep-merges `extra` over `base`. Objects merge key by key, arrays and
    /// scalars from `extra` replace those in `base`. Under `pagination`, an
    /// explicit `null` in `extra` counts as absent.
    pub fn merge(&self, base: &QuerySpec, extra: &QuerySpec) -> QuerySpec {
        let mut merged = base.0.clone();
        for (key, value) in &extra.0 {
            if key == PAGINATION {
                merge_pagination(&mut merged, value);
                continue;
            }
            match merged.get_mut(key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        QuerySpec(merged)
    }
}

fn insert_at(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = map;
    for segment in parents {
        let slot = cursor
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(next) => cursor = next,
            _ => return,
        }
    }
    cursor.insert(last.to_string(), value);
}

fn merge_pagination(target: &mut Map<String, Value>, extra: &Value) {
    let Value::Object(extra) = extra else {
        return;
    };
    let entry = target
        .entry(PAGINATION.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(section) = entry {
        for (field, value) in extra {
            if !value.is_null() {
                section.insert(field.clone(), value.clone());
            }
        }
        if section.is_empty() {
            target.remove(PAGINATION);
        }
    }
}

fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        into.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

fn serialize_into(prefix: String, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                serialize_into(format!("{prefix}[{}]", encode(key)), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                serialize_into(format!("{prefix}[{index}]"), child, out);
            }
        }
        Value::String(s) => out.push(format!("{prefix}={}", encode(s))),
        Value::Number(n) => out.push(format!("{prefix}={n}")),
        Value::Bool(b) => out.push(format!("{prefix}={b}")),
        Value::Null => out.push(format!("{prefix}=")),
    }
}

// `$` is left readable so operators stay recognisable (`$eq`, `$containsi`).
fn encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace("%24", "$")
}

fn split_key(key: &str) -> Result<Vec<String>, QueryError> {
    let Some(open) = key.find('[') else {
        return Ok(vec![key.to_string()]);
    };
    if open == 0 {
        return Err(QueryError::MalformedKey(key.to_string()));
    }
    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.find(']').map(|close| (&r[..close], &r[close + 1..])));
        match inner {
            Some((segment, tail)) => {
                segments.push(segment.to_string());
                rest = tail;
            }
            None => return Err(QueryError::MalformedKey(key.to_string())),
        }
    }
    Ok(segments)
}

fn insert_path(
    root: &mut Map<String, Value>,
    segments: &[String],
    value: Value,
) -> Result<(), QueryError> {
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };
    let mut cursor = root;
    for segment in parents {
        let key = next_key(cursor, segment);
        let slot = cursor
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(next) => cursor = next,
            _ => return Err(QueryError::MalformedKey(segments.join("]["))),
        }
    }
    let key = next_key(cursor, last);
    cursor.insert(key, value);
    Ok(())
}

// `a[]=x` appends: the empty segment becomes the next free index.
fn next_key(map: &Map<String, Value>, segment: &str) -> String {
    if segment.is_empty() {
        map.len().to_string()
    } else {
        segment.to_string()
    }
}

fn arrayify(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut indices: Vec<usize> = map.keys().filter_map(|k| k.parse().ok()).collect();
            indices.sort_unstable();
            let is_sequence = !map.is_empty()
                && indices.len() == map.len()
                && indices.iter().enumerate().all(|(pos, i)| pos == *i);
            if is_sequence {
                let mut items: Vec<(usize, Value)> = map
                    .into_iter()
                    .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, arrayify(v))))
                    .collect();
                items.sort_by_key(|(i, _)| *i);
                Value::Array(items.into_iter().map(|(_, v)| v).collect())
            } else {
                Value::Object(map.into_iter().map(|(k, v)| (k, arrayify(v))).collect())
            }
        }
        other => other,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_array<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Array(items.into_iter().map(|s| Value::String(s.into())).collect())
}
