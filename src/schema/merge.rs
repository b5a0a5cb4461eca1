//! Fragment merging and null stripping for external documents.

use serde_json::{Map, Value};

/// Merge `fragment` into `target`.
///
/// Objects merge key by key, recursively. Arrays present on both sides are
/// concatenated, `target` elements first. Any other collision is won by the
/// fragment, so applying fragments in mapping order layers later mappings over
/// earlier ones.
pub fn deep_merge(target: &mut Map<String, Value>, fragment: Map<String, Value>) {
    for (key, incoming) in fragment {
        let merged = match (target.remove(&key), incoming) {
            (Some(Value::Object(mut existing)), Value::Object(incoming)) => {
                deep_merge(&mut existing, incoming);
                Value::Object(existing)
            }
            (Some(Value::Array(mut existing)), Value::Array(incoming)) => {
                existing.extend(incoming);
                Value::Array(existing)
            }
            (_, incoming) => incoming,
        };
        target.insert(key, merged);
    }
}

/// Drop every `null` value, descending into nested objects.
///
/// Arrays are kept as they are; the directory only rejects explicit nulls for
/// unset fields.
pub fn strip_nulls(document: Map<String, Value>) -> Map<String, Value> {
    document
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::Object(nested) => Some((key, Value::Object(strip_nulls(nested)))),
            other => Some((key, other)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_later_fragment_wins() {
        let mut doc = Map::new();
        deep_merge(&mut doc, object(json!({"name": "A", "title": "Engineer"})));
        deep_merge(&mut doc, object(json!({"name": "B"})));
        assert_eq!(Value::Object(doc), json!({"name": "B", "title": "Engineer"}));
    }

    #[test]
    fn test_nested_objects_merge() {
        let mut doc = object(json!({"name": {"givenName": "Jane", "familyName": "Doe"}}));
        deep_merge(
            &mut doc,
            object(json!({"name": {"familyName": "Smith"}, "orgUnitPath": "/"})),
        );
        assert_eq!(
            Value::Object(doc),
            json!({
                "name": {"givenName": "Jane", "familyName": "Smith"},
                "orgUnitPath": "/"
            })
        );
    }

    #[test]
    fn test_arrays_concatenate() {
        let mut doc = object(json!({"emails": [{"address": "a@example.com"}]}));
        deep_merge(&mut doc, object(json!({"emails": [{"address": "b@example.com"}]})));
        assert_eq!(
            doc["emails"],
            json!([{"address": "a@example.com"}, {"address": "b@example.com"}])
        );
    }

    #[test]
    fn test_type_change_replaces() {
        let mut doc = object(json!({"phones": [1, 2], "name": {"givenName": "J"}}));
        deep_merge(&mut doc, object(json!({"phones": "none", "name": "Jane"})));
        assert_eq!(Value::Object(doc), json!({"phones": "none", "name": "Jane"}));
    }

    #[test]
    fn test_strip_nulls_recurses_objects_only() {
        let doc = object(json!({
            "primaryEmail": null,
            "nickName": "Bob",
            "name": {"givenName": null, "familyName": "Builder"},
            "aliases": [null, "bob"]
        }));
        assert_eq!(
            Value::Object(strip_nulls(doc)),
            json!({
                "nickName": "Bob",
                "name": {"familyName": "Builder"},
                "aliases": [null, "bob"]
            })
        );
    }

    proptest! {
        #[test]
        fn prop_scalar_merge_is_last_write_wins(
            first in proptest::collection::btree_map("[a-d]", any::<i64>(), 0..4),
            second in proptest::collection::btree_map("[a-d]", any::<i64>(), 0..4),
        ) {
            let mut doc: Map<String, Value> =
                first.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let fragment: Map<String, Value> =
                second.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            deep_merge(&mut doc, fragment);

            for (key, value) in &doc {
                let expected = second.get(key).or_else(|| first.get(key)).unwrap();
                prop_assert_eq!(value, &json!(expected));
            }
            prop_assert_eq!(doc.len(), first.keys().chain(second.keys()).collect::<std::collections::BTreeSet<_>>().len());
        }
    }
}
