//! Resolved id labels.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// A resolved identity label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdLabelEntry {
    pub id: String,
    pub label: String,
    /// The full record the label came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl IdLabelEntry {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Labels grouped by id type.
pub type LabelMap = BTreeMap<String, Vec<IdLabelEntry>>;

/// Union `additions` into `base`. Ids already present in `base` keep their entry.
pub fn union_into(base: &mut LabelMap, additions: LabelMap) {
    for (id_type, entries) in additions {
        let slot = base.entry(id_type).or_default();
        let mut known: HashSet<String> = slot.iter().map(|e| e.id.clone()).collect();
        for entry in entries {
            if known.insert(entry.id.clone()) {
                slot.push(entry);
            }
        }
    }
}

/// Ids of `id_type` present in `labels`.
pub fn known_ids<'a>(labels: &'a LabelMap, id_type: &str) -> HashSet<&'a str> {
    labels
        .get(id_type)
        .map(|entries| entries.iter().map(|e| e.id.as_str()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_keeps_existing_entries() {
        let mut base = LabelMap::new();
        base.insert("users".to_string(), vec![IdLabelEntry::new("1", "Ada")]);

        let mut additions = LabelMap::new();
        additions.insert(
            "users".to_string(),
            vec![IdLabelEntry::new("1", "Changed"), IdLabelEntry::new("2", "Grace")],
        );
        additions.insert("teams".to_string(), vec![IdLabelEntry::new("t", "Core")]);

        union_into(&mut base, additions);
        assert_eq!(
            base["users"],
            vec![IdLabelEntry::new("1", "Ada"), IdLabelEntry::new("2", "Grace")]
        );
        assert_eq!(base["teams"].len(), 1);
    }

    #[test]
    fn test_known_ids() {
        let mut labels = LabelMap::new();
        labels.insert("users".to_string(), vec![IdLabelEntry::new("1", "Ada")]);
        assert!(known_ids(&labels, "users").contains("1"));
        assert!(known_ids(&labels, "teams").is_empty());
    }
}
