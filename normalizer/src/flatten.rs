//! Deterministic flattening of JSON documents into columnar field maps.
//!
//! Nested object keys are joined with the configured separator and array
//! elements are addressed by index, so `{"a": {"b": 1}, "c": [true, false]}`
//! becomes `{a__b: 1, c__0: true, c__1: false}`. Scalar leaves keep their
//! JSON type. The output map is ordered (BTreeMap), which makes the
//! serialized document byte-identical for byte-identical input.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub fn flatten(root: &Map<String, Value>, separator: &str) -> BTreeMap<String, Value> {
    let mut columns = BTreeMap::new();
    for (key, value) in root {
        walk(key.clone(), value, separator, &mut columns);
    }
    columns
}

fn walk(prefix: String, value: &Value, separator: &str, columns: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(object) => {
            for (key, child) in object {
                walk(format!("{prefix}{separator}{key}"), child, separator, columns);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(format!("{prefix}{separator}{index}"), child, separator, columns);
            }
        }
        // Empty containers fall through the arms above and contribute no
        // columns. Colliding flattened names resolve last-writer-wins in
        // document order.
        leaf => {
            columns.insert(prefix, leaf.clone());
        }
    }
}
