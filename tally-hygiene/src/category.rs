//! Hygiene categories: the built-in sets and tenant-defined custom ones.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Built-in categories for issue trackers.
pub const ISSUE_CATEGORIES: &[&str] = &[
    "IDLE",
    "POOR_DESCRIPTION",
    "NO_DUE_DATE",
    "NO_ASSIGNEE",
    "NO_COMPONENTS",
    "MISSED_RESPONSE_TIME",
    "MISSED_RESOLUTION_TIME",
    "INACTIVE_ASSIGNEES",
];

/// Built-in categories for support desks.
pub const SUPPORT_CATEGORIES: &[&str] = &[
    "IDLE",
    "POOR_DESCRIPTION",
    "NO_CONTACT",
    "MISSED_RESOLUTION_TIME",
];

/// One named bucket of problem tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HygieneCategory {
    /// Display label, also the scorecard key.
    pub label: String,
    /// Stable id; only custom categories have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Filter fragment merged into the base `filter` (custom only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Map<String, Value>>,
}

impl HygieneCategory {
    pub fn builtin(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: None,
            filter: None,
            missing_fields: None,
        }
    }

    /// A tenant-defined category. Spaces in `name` become underscores.
    pub fn custom(id: impl Into<String>, name: &str, filter: Map<String, Value>) -> Self {
        Self {
            label: name.replace(' ', "_"),
            id: Some(id.into()),
            filter: Some(filter),
            missing_fields: None,
        }
    }

    pub fn with_missing_fields(mut self, missing_fields: Map<String, Value>) -> Self {
        self.missing_fields = Some(missing_fields);
        self
    }

    pub fn is_custom(&self) -> bool {
        self.id.is_some()
    }

    /// Key for weights and request ids: the id if custom, else the label.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.label)
    }

    /// Parse one entry of an integration config's `custom_hygienes` list.
    pub fn from_config_entry(entry: &Value) -> Option<Self> {
        let id = match entry.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let name = entry.get("name").and_then(Value::as_str).unwrap_or_default();
        let filter = entry
            .get("filter")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut category = Self::custom(id, name, filter);
        if let Some(missing) = entry.get("missing_fields").and_then(Value::as_object) {
            category = category.with_missing_fields(missing.clone());
        }
        Some(category)
    }
}

/// Built-in categories from a list of labels.
pub fn builtin_categories(labels: &[&str]) -> Vec<HygieneCategory> {
    labels.iter().map(|l| HygieneCategory::builtin(*l)).collect()
}

/// Custom categories out of integration config records, keeping only
/// `wanted` ids. Order follows the records.
pub fn custom_from_configs(records: &[Value], wanted: &[String]) -> Vec<HygieneCategory> {
    records
        .iter()
        .filter_map(|record| record.get("custom_hygienes").and_then(Value::as_array))
        .flatten()
        .filter_map(HygieneCategory::from_config_entry)
        .filter(|category| wanted.iter().any(|id| Some(id.as_str()) == category.id.as_deref()))
        .collect()
}
