//! Fuzz test for append merging in the cache store
//!
//! Feeds arbitrary JSON pairs through `append_merge` looking for panics
//! and duplicate keys surviving a keyed merge.
//!
//! Run with: cargo +nightly fuzz run append_merge_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use std::collections::HashSet;
use tally_cache::append_merge;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    // Two documents separated by a NUL byte.
    let Some((left, right)) = input.split_once('\0') else {
        return;
    };
    let (Ok(existing), Ok(incoming)) = (
        serde_json::from_str::<Value>(left),
        serde_json::from_str::<Value>(right),
    ) else {
        return;
    };

    let _ = append_merge(&existing, incoming.clone(), None);

    let Some(merged) = append_merge(&existing, incoming, Some("id")) else {
        return;
    };
    let records = match &merged {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("records") {
            Some(Value::Array(items)) => items,
            _ => panic!("merged list response lost its records"),
        },
        _ => panic!("merge produced a scalar"),
    };

    let mut seen = HashSet::new();
    for key in records.iter().filter_map(|r| r.get("id")) {
        assert!(seen.insert(key.to_string()), "duplicate id {} after merge", key);
    }
});
