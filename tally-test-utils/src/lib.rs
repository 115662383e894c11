//! Tally Test Utilities
//!
//! Centralized test infrastructure for the tally workspace:
//! - Scripted mock resources with call recording, delays and gates
//! - Proptest generators for percentages, id sets and keyed records
//! - Fixtures for common coordinator and report setups
//! - Test tracing initialisation

// Re-export core types for convenience
pub use tally_cache::{CacheStore, ManualClock, MergeMode, WriteOptions};
pub use tally_core::{
    CacheKey, ListResponse, Method, RequestDescriptor, ResourceData, ResourceError, TallyConfig,
    TallyError, TallyResult,
};
pub use tally_dispatch::{Coordinator, DispatchOptions, Outcomes, Resource, ResourceRegistry};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly subscriber once. Honours `RUST_LOG`, defaults to `warn`.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// GATE
// ============================================================================

/// A latch that holds scripted calls open until released.
#[derive(Debug, Default)]
pub struct Gate {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Release every current and future waiter.
    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_open() {
                return;
            }
            notified.await;
        }
    }
}

// ============================================================================
// SCRIPTED RESOURCE
// ============================================================================

type ListHandler = dyn Fn(&Value) -> TallyResult<ListResponse> + Send + Sync;

/// Mock resource whose `list` answers come from a closure.
///
/// Every filter it receives is recorded. An optional delay and gate run
/// before the handler.
pub struct ScriptedResource {
    name: String,
    handler: Box<ListHandler>,
    records_by_id: HashMap<String, Value>,
    delay: Option<Duration>,
    gate: Option<Arc<Gate>>,
    filters: Mutex<Vec<Value>>,
    calls: AtomicUsize,
}

impl ScriptedResource {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Value) -> TallyResult<ListResponse> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Box::new(handler),
            records_by_id: HashMap::new(),
            delay: None,
            gate: None,
            filters: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always returns the same records.
    pub fn with_records(name: impl Into<String>, records: Vec<Value>) -> Self {
        let response = ListResponse::from_records(records);
        Self::new(name, move |_| Ok(response.clone()))
    }

    /// Always fails with the given status.
    pub fn failing(name: impl Into<String>, status: u16) -> Self {
        let name = name.into();
        let resource = name.clone();
        Self::new(name, move |_| {
            Err(ResourceError::RequestFailed {
                resource: resource.clone(),
                status,
                message: "scripted failure".to_string(),
            }
            .into())
        })
    }

    /// Serve `get(id)` for this record.
    pub fn with_record(mut self, id: impl Into<String>, record: Value) -> Self {
        self.records_by_id.insert(id.into(), record);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Filters received so far, in call order.
    pub fn filters(&self) -> Vec<Value> {
        self.filters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn hold(&self) {
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Resource for ScriptedResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, filter: &Value) -> TallyResult<ListResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.filters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(filter.clone());
        self.hold().await;
        (self.handler)(filter)
    }

    async fn get(&self, id: &str) -> TallyResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hold().await;
        self.records_by_id.get(id).cloned().ok_or_else(|| {
            ResourceError::NotFound {
                resource: self.name.clone(),
                id: id.to_string(),
            }
            .into()
        })
    }
}

impl std::fmt::Debug for ScriptedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedResource")
            .field("name", &self.name)
            .field("calls", &self.call_count())
            .finish()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    /// A percentage in `[0, 100]`, biased towards band edges.
    pub fn arb_percent() -> impl Strategy<Value = f64> {
        prop_oneof![
            Just(0.0),
            prop::sample::select(vec![11.0, 21.0, 31.0, 41.0, 100.0]),
            0.0f64..=100.0,
        ]
    }

    /// Small numeric-string ids.
    pub fn arb_id() -> impl Strategy<Value = String> {
        (0u16..50).prop_map(|n| n.to_string())
    }

    /// Id lists grouped by a handful of type names.
    pub fn arb_id_sets() -> impl Strategy<Value = BTreeMap<String, Vec<String>>> {
        prop::collection::btree_map(
            prop::sample::select(vec!["users", "teams", "projects"]).prop_map(str::to_string),
            prop::collection::vec(arb_id(), 0..10),
            0..3,
        )
    }

    /// Records `{id, name}` with possibly repeated ids.
    pub fn arb_keyed_records() -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec(
            (arb_id(), "[a-z]{1,8}").prop_map(|(id, name)| json!({"id": id, "name": name})),
            0..20,
        )
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use serde_json::json;

    /// Coordinator with its own registry and a default-TTL cache.
    pub async fn coordinator(resources: Vec<Arc<dyn Resource>>) -> Arc<Coordinator> {
        let cache = Arc::new(CacheStore::default());
        coordinator_with_cache(resources, cache).await
    }

    pub async fn coordinator_with_cache(
        resources: Vec<Arc<dyn Resource>>,
        cache: Arc<CacheStore>,
    ) -> Arc<Coordinator> {
        let registry = Arc::new(ResourceRegistry::new());
        for resource in resources {
            registry.register(resource).await;
        }
        Arc::new(Coordinator::new(registry, cache))
    }

    /// Lookup resource: returns the records whose `id_field` is listed
    /// under `filter[id_filter_key]`.
    pub fn lookup_resource(
        name: &str,
        id_filter_key: &str,
        id_field: &str,
        records: Vec<Value>,
    ) -> ScriptedResource {
        let id_filter_key = id_filter_key.to_string();
        let id_field = id_field.to_string();
        ScriptedResource::new(name, move |filter| {
            let wanted: Vec<&Value> = filter
                .get("filter")
                .and_then(|f| f.get(&id_filter_key))
                .and_then(Value::as_array)
                .map(|ids| ids.iter().collect())
                .unwrap_or_default();
            let matched = records
                .iter()
                .filter(|r| r.get(&id_field).is_some_and(|id| wanted.contains(&id)))
                .cloned()
                .collect();
            Ok(ListResponse::from_records(matched))
        })
    }

    /// Report resource answering total-count queries.
    ///
    /// A filter narrowed by `category_key` to one category returns that
    /// category's count; anything else returns `total`.
    pub fn count_report(
        name: &str,
        category_key: &str,
        total: u64,
        counts: &[(&str, u64)],
    ) -> ScriptedResource {
        let category_key = category_key.to_string();
        let counts: HashMap<String, u64> =
            counts.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        ScriptedResource::new(name, move |request| {
            let category = request
                .get("filter")
                .and_then(|f| f.get(&category_key))
                .and_then(Value::as_array)
                .and_then(|cats| cats.first())
                .and_then(Value::as_str);
            let count = match category {
                Some(category) => counts.get(category).copied().unwrap_or(0),
                None => total,
            };
            Ok(ListResponse::new(vec![json!({"total_tickets": count})], count))
        })
    }
}
