//! Human-readable snapshot form.
//!
//! A JSON object whose field names are the keys' text form and whose field
//! values are the mapped values.

use crate::error::{CodecError, Result, WireError};
use crate::kind::{KeyKind, ValueKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub fn entries_to_json<K: KeyKind, V: ValueKind>(entries: &BTreeMap<K, V>) -> Value {
    let object: Map<String, Value> = entries
        .iter()
        .map(|(key, value)| (key.to_field_name(), value.to_json()))
        .collect();
    Value::Object(object)
}

pub fn entries_to_string<K: KeyKind, V: ValueKind>(entries: &BTreeMap<K, V>) -> String {
    entries_to_json(entries).to_string()
}

pub fn entries_from_json<K: KeyKind, V: ValueKind>(value: &Value) -> Result<BTreeMap<K, V>> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid("expected a JSON object".to_string()))?;

    let mut entries = BTreeMap::new();
    for (name, field) in object {
        let key = K::from_field_name(name)
            .ok_or_else(|| invalid(format!("field {:?} is not a {} key", name, K::NAME)))?;
        let value = V::from_json(field)
            .ok_or_else(|| invalid(format!("field {:?} is not a {} value", name, V::NAME)))?;
        entries.insert(key, value);
    }
    Ok(entries)
}

pub fn entries_from_str<K: KeyKind, V: ValueKind>(text: &str) -> Result<BTreeMap<K, V>> {
    let value: Value = serde_json::from_str(text)?;
    entries_from_json(&value)
}

fn invalid(reason: String) -> CodecError {
    CodecError::CorruptSnapshot(WireError::InvalidText(reason))
}
