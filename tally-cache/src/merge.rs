//! Append merge for collection-valued entries.
//!
//! Two shapes are collections: a bare JSON array, and a list response
//! object carrying a `records` array. Appending concatenates the
//! collections; with a unique key, a later record replaces an earlier one
//! with the same key while keeping the earlier record's position.

use serde_json::Value;
use std::collections::HashMap;

/// Append `incoming` onto `existing`.
///
/// Returns `None` when the two values are not compatible collections; the
/// caller decides what to do instead.
pub fn append_merge(existing: &Value, incoming: Value, unique_by: Option<&str>) -> Option<Value> {
    match (existing, incoming) {
        (Value::Array(old), Value::Array(new)) => {
            let combined = old.iter().cloned().chain(new).collect();
            Some(Value::Array(dedup_records(combined, unique_by)))
        }
        (Value::Object(old), Value::Object(mut new)) => {
            let old_records = old.get("records")?.as_array()?;
            let new_records = match new.remove("records")? {
                Value::Array(records) => records,
                _ => return None,
            };
            let combined = old_records.iter().cloned().chain(new_records).collect();
            // Everything but the records comes from the newer response.
            new.insert(
                "records".to_string(),
                Value::Array(dedup_records(combined, unique_by)),
            );
            Some(Value::Object(new))
        }
        _ => None,
    }
}

/// De-duplicate a single collection value in place of an append.
///
/// Used when an append lands on an empty slot. Non-collections pass through.
pub fn dedup_collection(value: Value, unique_by: Option<&str>) -> Value {
    if unique_by.is_none() {
        return value;
    }
    match value {
        Value::Array(items) => Value::Array(dedup_records(items, unique_by)),
        Value::Object(mut map) => {
            if let Some(Value::Array(records)) = map.remove("records") {
                map.insert(
                    "records".to_string(),
                    Value::Array(dedup_records(records, unique_by)),
                );
            }
            Value::Object(map)
        }
        other => other,
    }
}

/// First-seen position, last-written value. Records without the key are kept as-is.
pub fn dedup_records(records: Vec<Value>, unique_by: Option<&str>) -> Vec<Value> {
    let Some(field) = unique_by else {
        return records;
    };

    let mut out: Vec<Value> = Vec::with_capacity(records.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        match record.get(field).map(key_of) {
            Some(key) => match positions.get(&key) {
                Some(&idx) => out[idx] = record,
                None => {
                    positions.insert(key, out.len());
                    out.push(record);
                }
            },
            None => out.push(record),
        }
    }
    out
}

fn key_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
