//! How to look up labels for one id type.

use serde_json::{json, Value};
use tally_core::{RequestDescriptor, ResourceName};

/// Where labels for an id type live and how to read them.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLookup {
    pub resource: ResourceName,
    /// Key under `filter` that carries the requested ids.
    pub id_filter_key: String,
    /// Record field holding the id.
    pub id_field: String,
    /// Record field holding the label.
    pub label_field: String,
}

impl LabelLookup {
    /// Defaults: ids under `filter.ids`, records keyed by `id`, labelled by `name`.
    pub fn new(resource: impl Into<ResourceName>) -> Self {
        Self {
            resource: resource.into(),
            id_filter_key: "ids".to_string(),
            id_field: "id".to_string(),
            label_field: "name".to_string(),
        }
    }

    pub fn id_filter_key(mut self, key: impl Into<String>) -> Self {
        self.id_filter_key = key.into();
        self
    }

    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn label_field(mut self, field: impl Into<String>) -> Self {
        self.label_field = field.into();
        self
    }

    /// One list request for every id still missing for `id_type`.
    pub fn request(&self, id_type: &str, ids: &[String]) -> RequestDescriptor {
        let mut filter = serde_json::Map::new();
        filter.insert(self.id_filter_key.clone(), json!(ids));
        RequestDescriptor::list(
            self.resource.clone(),
            format!("labels_{}", id_type),
            json!({ "filter": Value::Object(filter) }),
        )
    }

    /// Id of a record, normalised to a string.
    pub fn record_id(&self, record: &Value) -> Option<String> {
        match record.get(&self.id_field)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Label of a record, falling back to its id.
    pub fn record_label(&self, record: &Value, id: &str) -> String {
        match record.get(&self.label_field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => id.to_string(),
            Some(other) => other.to_string(),
        }
    }
}
