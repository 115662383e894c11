//! Batched id-to-label resolution.

use crate::entry::{known_ids, union_into, IdLabelEntry, LabelMap};
use crate::form_cache::FormLabelCache;
use crate::lookup::LabelLookup;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tally_core::{RequestDescriptor, TallyResult, PLACEHOLDER_ID_MARKERS};
use tally_dispatch::{Coordinator, DispatchOptions};

/// Output of one resolution pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    /// Previous labels plus everything newly resolved.
    pub merged: LabelMap,
    /// False when every requested id was already known.
    pub did_network_fetch: bool,
}

/// Resolves ids to labels with one lookup per id type, skipping known ids.
pub struct IdBatcher {
    coordinator: Arc<Coordinator>,
    lookups: HashMap<String, LabelLookup>,
    forms: FormLabelCache,
}

impl IdBatcher {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            lookups: HashMap::new(),
            forms: FormLabelCache::new(),
        }
    }

    /// Register how ids of `id_type` are looked up.
    pub fn with_lookup(mut self, id_type: impl Into<String>, lookup: LabelLookup) -> Self {
        self.lookups.insert(id_type.into(), lookup);
        self
    }

    pub fn forms(&self) -> &FormLabelCache {
        &self.forms
    }

    /// Resolve `id_sets` against `previous`, fetching only unknown ids.
    pub async fn resolve(
        &self,
        id_sets: &BTreeMap<String, Vec<String>>,
        previous: &LabelMap,
    ) -> TallyResult<Resolution> {
        let remaining = self.remaining_ids(id_sets, previous);
        if remaining.is_empty() {
            tracing::debug!("All requested ids already labelled");
            return Ok(Resolution {
                merged: previous.clone(),
                did_network_fetch: false,
            });
        }

        let mut requests: Vec<(RequestDescriptor, DispatchOptions)> = Vec::new();
        let mut pending: Vec<(&str, &LabelLookup, RequestDescriptor)> = Vec::new();
        for (id_type, ids) in &remaining {
            let Some(lookup) = self.lookups.get(*id_type) else {
                continue;
            };
            let request = lookup.request(id_type, ids);
            let options = DispatchOptions::new()
                .force_load(true)
                .append(Some(lookup.id_field.as_str()));
            pending.push((*id_type, lookup, request.clone()));
            requests.push((request, options));
        }

        tracing::info!(
            types = requests.len(),
            ids = remaining.values().map(Vec::len).sum::<usize>(),
            "Fetching labels"
        );
        let outcomes = self.coordinator.dispatch_each(requests).await?;

        let mut additions = LabelMap::new();
        for (id_type, lookup, request) in pending {
            let wanted = &remaining[id_type];
            match outcomes.list(request.request_id.as_str()) {
                Some(list) => {
                    let by_id: HashMap<String, &serde_json::Value> = list
                        .records
                        .iter()
                        .filter_map(|record| lookup.record_id(record).map(|id| (id, record)))
                        .collect();
                    let resolved: Vec<IdLabelEntry> = wanted
                        .iter()
                        .filter_map(|id| {
                            let record = by_id.get(id)?;
                            Some(
                                IdLabelEntry::new(id.clone(), lookup.record_label(record, id))
                                    .with_extra((*record).clone()),
                            )
                        })
                        .collect();
                    if resolved.len() < wanted.len() {
                        tracing::debug!(
                            id_type,
                            requested = wanted.len(),
                            resolved = resolved.len(),
                            "Dropping ids with no matching record"
                        );
                    }
                    additions.insert(id_type.to_string(), resolved);
                }
                None => {
                    tracing::warn!(
                        id_type,
                        error = ?outcomes.error(request.request_id.as_str()),
                        "Label lookup failed, keeping previous labels"
                    );
                }
            }
        }

        let mut merged = previous.clone();
        union_into(&mut merged, additions);
        Ok(Resolution {
            merged,
            did_network_fetch: true,
        })
    }

    /// Resolve for a form under take-latest, merging into the form's cache.
    ///
    /// A newer call for the same form makes this one return `Superseded`
    /// without touching the form cache.
    pub async fn resolve_for_form(
        &self,
        form_id: &str,
        id_sets: &BTreeMap<String, Vec<String>>,
    ) -> TallyResult<Resolution> {
        let triggers = self.coordinator.triggers();
        let ticket = triggers.begin(&format!("labels_{}", form_id));

        let previous = self.forms.get(form_id);
        let resolution = self.resolve(id_sets, &previous).await?;
        triggers.ensure_current(&ticket)?;

        if resolution.did_network_fetch {
            self.forms.merge(form_id, resolution.merged.clone());
        }
        Ok(resolution)
    }

    /// Drop a form's labels, e.g. when the form closes.
    pub fn clear_form(&self, form_id: &str) -> bool {
        self.forms.clear(form_id)
    }

    /// Per type: requested ids not yet known, de-duplicated, order kept.
    /// Placeholders and types without a lookup are left out.
    fn remaining_ids<'a>(
        &self,
        id_sets: &'a BTreeMap<String, Vec<String>>,
        previous: &LabelMap,
    ) -> BTreeMap<&'a str, Vec<String>> {
        let mut remaining = BTreeMap::new();
        for (id_type, ids) in id_sets {
            let known = known_ids(previous, id_type);
            let mut seen = HashSet::new();
            let missing: Vec<String> = ids
                .iter()
                .filter(|id| !is_placeholder(id))
                .filter(|id| !known.contains(id.as_str()))
                .filter(|id| seen.insert(id.as_str()))
                .cloned()
                .collect();
            if missing.is_empty() {
                continue;
            }
            if !self.lookups.contains_key(id_type) {
                tracing::warn!(id_type = %id_type, "No label lookup registered, skipping");
                continue;
            }
            remaining.insert(id_type.as_str(), missing);
        }
        remaining
    }
}

impl std::fmt::Debug for IdBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdBatcher")
            .field("lookups", &self.lookups.keys().collect::<Vec<_>>())
            .field("forms", &self.forms.len())
            .finish()
    }
}

/// Template values such as `custom|field` or `${trigger.x}` are not ids.
pub fn is_placeholder(id: &str) -> bool {
    PLACEHOLDER_ID_MARKERS.iter().any(|marker| id.contains(marker))
}
