//! # normalize: flatten the CMS entry/relation envelope into plain records
//!
//! `{id, attributes: {...}}` becomes `{id, ...}`, and relation wrappers
//! `{data: Entry | Entry[] | null}` are replaced by their normalized contents.
//!
//! Each value is classified once into a [`Shape`]. The precedence is fixed:
//! list, relation wrapper, entry, plain object, scalar. The traversal uses an
//! explicit work stack instead of recursion, so deeply nested payloads cannot
//! exhaust the call stack. Results are assembled positionally, which keeps array
//! order and object keys identical to the input.
//!
//! There is no cycle detection. `serde_json::Value` is an owned tree, so a
//! cycle cannot be expressed in the input in the first place.

use serde_json::{Map, Value};

/// The closed set of shapes the normalizer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape<'a> {
    List(&'a [Value]),
    /// The wrapped value: `null`, an entry or an array of entries.
    Relation(&'a Value),
    Entry {
        id: &'a Value,
        attributes: &'a Value,
        siblings: &'a Map<String, Value>,
    },
    Object(&'a Map<String, Value>),
    Scalar(&'a Value),
}

impl<'a> Shape<'a> {
    pub fn of(value: &'a Value) -> Shape<'a> {
        match value {
            Value::Array(items) => Shape::List(items),
            Value::Object(map) => {
                if let Some(data) = map.get("data").filter(|d| is_relation_target(d)) {
                    return Shape::Relation(data);
                }
                match (map.get("id"), map.get("attributes")) {
                    (Some(id), Some(attributes)) => Shape::Entry {
                        id,
                        attributes,
                        siblings: map,
                    },
                    _ => Shape::Object(map),
                }
            }
            scalar => Shape::Scalar(scalar),
        }
    }
}

pub fn is_entry(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| m.contains_key("id") && m.contains_key("attributes"))
}

fn is_relation_target(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Array(items) => items.iter().all(is_entry),
        other => is_entry(other),
    }
}

enum Task<'a> {
    Visit(&'a Value),
    CollectList(usize),
    CollectObject(Vec<String>),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn new() -> Self {
        ResponseNormalizer
    }

    /// Normalizes a CMS payload. If the top-level value has a truthy `data` key
    /// normalization starts there, so both raw responses and already-unwrapped
    /// values can be passed in.
    pub fn normalize(&self, input: &Value) -> Value {
        let start = match input.get("data") {
            Some(data) if !data.is_null() => data,
            _ => input,
        };
        self.normalize_value(start)
    }

    /// Applies the flattening rules to `value` itself, without the top-level
    /// `data` unwrapping of [`ResponseNormalizer::normalize`].
    pub fn normalize_value(&self, value: &Value) -> Value {
        let mut tasks = vec![Task::Visit(value)];
        let mut done: Vec<Value> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(value) => match Shape::of(value) {
                    Shape::List(items) => {
                        tasks.push(Task::CollectList(items.len()));
                        tasks.extend(items.iter().rev().map(Task::Visit));
                    }
                    Shape::Relation(data) => tasks.push(Task::Visit(data)),
                    Shape::Entry {
                        id,
                        attributes,
                        siblings,
                    } => {
                        let fields = flatten_entry(id, attributes, siblings);
                        schedule_object(&mut tasks, fields);
                    }
                    Shape::Object(map) => {
                        let fields = map.iter().map(|(k, v)| (k.clone(), v)).collect();
                        schedule_object(&mut tasks, fields);
                    }
                    Shape::Scalar(scalar) => done.push(scalar.clone()),
                },
                Task::CollectList(len) => {
                    let items = done.split_off(done.len() - len);
                    done.push(Value::Array(items));
                }
                Task::CollectObject(keys) => {
                    let values = done.split_off(done.len() - keys.len());
                    done.push(Value::Object(keys.into_iter().zip(values).collect()));
                }
            }
        }

        done.pop().unwrap_or(Value::Null)
    }
}

fn schedule_object<'a>(tasks: &mut Vec<Task<'a>>, fields: Vec<(String, &'a Value)>) {
    let (keys, values): (Vec<String>, Vec<&'a Value>) = fields.into_iter().unzip();
    tasks.push(Task::CollectObject(keys));
    tasks.extend(values.into_iter().rev().map(Task::Visit));
}

// `{id, ...attributes, ...siblings}`: later keys win, first position is kept.
fn flatten_entry<'a>(
    id: &'a Value,
    attributes: &'a Value,
    siblings: &'a Map<String, Value>,
) -> Vec<(String, &'a Value)> {
    let mut fields: Vec<(String, &'a Value)> = vec![("id".to_string(), id)];
    let mut upsert = |key: &str, value: &'a Value| {
        match fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => fields.push((key.to_string(), value)),
        }
    };
    if let Value::Object(attributes) = attributes {
        for (key, value) in attributes {
            upsert(key, value);
        }
    }
    for (key, value) in siblings {
        if key != "id" && key != "attributes" {
            upsert(key, value);
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize(value: Value) -> Value {
        ResponseNormalizer::new().normalize(&value)
    }

    #[test]
    fn flattens_a_single_entry() {
        assert_eq!(
            normalize(json!({"id": 1, "attributes": {"title": "A"}})),
            json!({"id": 1, "title": "A"})
        );
    }

    #[test]
    fn unwraps_a_single_relation() {
        assert_eq!(
            normalize(json!({"author": {"data": {"id": 2, "attributes": {"name": "B"}}}})),
            json!({"author": {"id": 2, "name": "B"}})
        );
    }

    #[test]
    fn unwraps_a_list_relation_preserving_order() {
        assert_eq!(
            normalize(json!({"tags": {"data": [
                {"id": 3, "attributes": {"x": 1}},
                {"id": 4, "attributes": {"x": 2}}
            ]}})),
            json!({"tags": [{"id": 3, "x": 1}, {"id": 4, "x": 2}]})
        );
    }

    #[test]
    fn empty_relations_collapse() {
        assert_eq!(
            normalize(json!({"cover": {"data": null}, "tags": {"data": []}})),
            json!({"cover": null, "tags": []})
        );
    }

    #[test]
    fn starts_from_top_level_data() {
        let response = json!({
            "data": [{"id": 1, "attributes": {"title": "A"}}],
            "meta": {"pagination": {"page": 1}}
        });
        assert_eq!(normalize(response), json!([{"id": 1, "title": "A"}]));
    }

    #[test]
    fn sibling_keys_are_carried_and_override_attributes() {
        let value = json!({
            "id": 1,
            "attributes": {"title": "A", "locale": "de"},
            "locale": "en"
        });
        assert_eq!(
            normalize(value),
            json!({"id": 1, "title": "A", "locale": "en"})
        );
    }

    #[test]
    fn data_key_that_is_not_an_entry_is_a_plain_object() {
        let value = json!({"block": {"data": {"title": "inline"}}});
        assert_eq!(normalize(value.clone()), value);
    }

    #[test]
    fn mixed_list_under_data_is_not_a_relation() {
        let value = json!({"data": [{"id": 1, "attributes": {}}, 5]});
        assert_eq!(
            ResponseNormalizer::new().normalize_value(&value),
            json!({"data": [{"id": 1}, 5]})
        );
    }

    #[test]
    fn nested_components_and_relations_inside_attributes() {
        let value = json!({
            "id": 10,
            "attributes": {
                "seo": {"metaTitle": "T", "image": {"data": {"id": 11, "attributes": {"url": "/a.png"}}}},
                "blocks": [
                    {"__component": "shared.quote", "body": "q"},
                    {"__component": "shared.media", "file": {"data": null}}
                ]
            }
        });
        assert_eq!(
            normalize(value),
            json!({
                "id": 10,
                "seo": {"metaTitle": "T", "image": {"id": 11, "url": "/a.png"}},
                "blocks": [
                    {"__component": "shared.quote", "body": "q"},
                    {"__component": "shared.media", "file": null}
                ]
            })
        );
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(normalize(json!(3)), json!(3));
        assert_eq!(normalize(json!("x")), json!("x"));
        assert_eq!(normalize(Value::Null), Value::Null);
    }

    #[test]
    fn deep_nesting_does_not_overflow_the_stack() {
        let mut value = json!({"id": 0, "attributes": {"leaf": true}});
        for depth in 1..20_000i64 {
            let mut relation = Map::new();
            relation.insert("data".into(), value);
            let mut attributes = Map::new();
            attributes.insert("child".into(), Value::Object(relation));
            let mut entry = Map::new();
            entry.insert("id".into(), Value::from(depth));
            entry.insert("attributes".into(), Value::Object(attributes));
            value = Value::Object(entry);
        }
        let normalized = ResponseNormalizer::new().normalize_value(&value);
        assert_eq!(normalized["id"], json!(19_999));
        assert_eq!(normalized["child"]["id"], json!(19_998));
        // serde_json's Drop is recursive; leak to keep the test about normalization.
        std::mem::forget(normalized);
        std::mem::forget(value);
    }

    #[test]
    fn classifies_shapes_in_precedence_order() {
        let list = json!([1]);
        assert!(matches!(Shape::of(&list), Shape::List(_)));
        let relation = json!({"data": {"id": 1, "attributes": {}}, "id": 2, "attributes": {}});
        assert!(matches!(Shape::of(&relation), Shape::Relation(_)));
        let entry = json!({"id": 1, "attributes": {}});
        assert!(matches!(Shape::of(&entry), Shape::Entry { .. }));
        let object = json!({"id": 1});
        assert!(matches!(Shape::of(&object), Shape::Object(_)));
        assert!(matches!(Shape::of(&json!(true)), Shape::Scalar(_)));
    }
}
