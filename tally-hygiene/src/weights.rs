//! Per-category weights.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Caller-supplied weights keyed by category key.
///
/// Categories missing from the map take the engine's default weight.
/// A category whose effective weight is not positive is never dispatched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightMap(BTreeMap<String, f64>);

impl WeightMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, weight: f64) -> Self {
        self.set(key, weight);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, weight: f64) {
        self.0.insert(key.into(), weight);
    }

    /// Explicit weight, if one was given.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn effective(&self, key: &str, default_weight: f64) -> f64 {
        self.get(key).unwrap_or(default_weight)
    }

    /// Whether the category should be dispatched at all.
    pub fn is_active(&self, key: &str, default_weight: f64) -> bool {
        let weight = self.effective(key, default_weight);
        weight.is_finite() && weight > 0.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for WeightMap {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, w)| (k.into(), w)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::DEFAULT_CATEGORY_WEIGHT;

    #[test]
    fn test_default_applies_when_unspecified() {
        let weights = WeightMap::new().with("IDLE", 30.0);
        assert_eq!(weights.effective("IDLE", DEFAULT_CATEGORY_WEIGHT), 30.0);
        assert_eq!(
            weights.effective("NO_ASSIGNEE", DEFAULT_CATEGORY_WEIGHT),
            DEFAULT_CATEGORY_WEIGHT
        );
    }

    #[test]
    fn test_non_positive_weights_are_inactive() {
        let weights: WeightMap = [("IDLE", 0.0), ("NO_DUE_DATE", -5.0), ("NO_ASSIGNEE", f64::NAN)]
            .into_iter()
            .collect();
        assert!(!weights.is_active("IDLE", DEFAULT_CATEGORY_WEIGHT));
        assert!(!weights.is_active("NO_DUE_DATE", DEFAULT_CATEGORY_WEIGHT));
        assert!(!weights.is_active("NO_ASSIGNEE", DEFAULT_CATEGORY_WEIGHT));
        assert!(weights.is_active("POOR_DESCRIPTION", DEFAULT_CATEGORY_WEIGHT));
    }

    #[test]
    fn test_deserializes_from_plain_map() {
        let weights: WeightMap = serde_json::from_str(r#"{"IDLE": 20, "custom-1": 5.5}"#).unwrap();
        assert_eq!(weights.get("IDLE"), Some(20.0));
        assert_eq!(weights.get("custom-1"), Some(5.5));
    }
}
