//! Long-lived label maps, one per open form.

use crate::entry::{union_into, LabelMap};
use dashmap::DashMap;

/// Per-form id-label cache.
///
/// Entries are only ever added. A form's whole map is dropped on
/// [`clear`](Self::clear), typically when the form unmounts.
#[derive(Debug, Default)]
pub struct FormLabelCache {
    forms: DashMap<String, LabelMap>,
}

impl FormLabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a form's labels; empty if the form has none.
    pub fn get(&self, form_id: &str) -> LabelMap {
        self.forms
            .get(form_id)
            .map(|labels| labels.clone())
            .unwrap_or_default()
    }

    /// Union `labels` into the form's map.
    pub fn merge(&self, form_id: &str, labels: LabelMap) {
        let mut slot = self.forms.entry(form_id.to_string()).or_default();
        union_into(&mut slot, labels);
    }

    /// Drop a form's labels. Returns whether the form had any.
    pub fn clear(&self, form_id: &str) -> bool {
        let removed = self.forms.remove(form_id).is_some();
        if removed {
            tracing::debug!(form_id, "Cleared form label cache");
        }
        removed
    }

    pub fn contains(&self, form_id: &str) -> bool {
        self.forms.contains_key(form_id)
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}
