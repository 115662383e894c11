//! Coordinator behaviour against scripted resources and a shared store.

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tally_dispatch::{DispatchListener, ErrorEvent, RequestEvent, ResponseEvent};
use tally_test_utils::{
    fixtures, init_test_tracing, CacheKey, CacheStore, DispatchOptions, Gate, ManualClock, Method,
    RequestDescriptor, ScriptedResource, TallyResult,
};

fn list(resource: &str, request_id: &str) -> RequestDescriptor {
    RequestDescriptor::list(resource, request_id, json!({}))
}

#[tokio::test]
async fn test_join_waits_for_slowest_request() {
    init_test_tracing();
    let gate = Gate::new();
    let fast = Arc::new(ScriptedResource::with_records("fast", vec![json!({"id": 1})]));
    let broken = Arc::new(ScriptedResource::failing("broken", 503));
    let slow = Arc::new(
        ScriptedResource::with_records("slow", vec![json!({"id": 3})]).with_gate(gate.clone()),
    );
    let coordinator =
        fixtures::coordinator(vec![fast.clone(), broken.clone(), slow.clone()]).await;

    let batch = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .dispatch(
                    vec![list("fast", "r1"), list("broken", "r2"), list("slow", "r3")],
                    &DispatchOptions::new(),
                )
                .await
        })
    };

    while slow.call_count() == 0 || fast.call_count() == 0 || broken.call_count() == 0 {
        tokio::task::yield_now().await;
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(!batch.is_finished(), "join returned before r3 completed");

    gate.open();
    let outcomes = batch.await.unwrap().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.list("r1").is_some());
    assert!(outcomes.list("r3").is_some());
    assert!(outcomes.error("r2").is_some());
    assert_eq!(outcomes.failed().len(), 1);
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let clock = Arc::new(ManualClock::default());
    let cache = Arc::new(CacheStore::with_clock(Duration::from_secs(60), clock.clone()));
    let users = Arc::new(ScriptedResource::with_records("users", vec![json!({"id": 1})]));
    let coordinator = fixtures::coordinator_with_cache(vec![users.clone()], cache.clone()).await;
    let short_ttl = DispatchOptions::new().ttl(Duration::from_secs(1));

    coordinator
        .dispatch(vec![list("users", "all")], &short_ttl)
        .await
        .unwrap();
    let cached = coordinator
        .dispatch(vec![list("users", "all")], &short_ttl)
        .await
        .unwrap();
    assert!(cached.get("all").unwrap().from_cache);
    assert_eq!(users.call_count(), 1);

    clock.advance(Duration::from_secs(2));
    let refreshed = coordinator
        .dispatch(vec![list("users", "all")], &short_ttl)
        .await
        .unwrap();
    assert!(!refreshed.get("all").unwrap().from_cache);
    assert_eq!(users.call_count(), 2);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.expirations, 1);
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let users = Arc::new(ScriptedResource::with_records("users", vec![json!({"id": 1})]));
    let coordinator = fixtures::coordinator(vec![users.clone()]).await;

    coordinator
        .dispatch(vec![list("users", "all")], &DispatchOptions::new())
        .await
        .unwrap();
    assert!(coordinator
        .cache()
        .invalidate(&CacheKey::new("users", Method::List, "all")));
    coordinator
        .dispatch(vec![list("users", "all")], &DispatchOptions::new())
        .await
        .unwrap();

    assert_eq!(users.call_count(), 2);
}

#[tokio::test]
async fn test_cached_get_keeps_record_shape() {
    let record = json!({"id": "cfg-1", "records": [{"k": 1}]});
    let configs = Arc::new(
        ScriptedResource::with_records("configs", vec![]).with_record("cfg-1", record.clone()),
    );
    let coordinator = fixtures::coordinator(vec![configs.clone()]).await;
    let get = || vec![RequestDescriptor::get("configs", "r", "cfg-1")];

    let fetched = coordinator
        .dispatch(get(), &DispatchOptions::new())
        .await
        .unwrap();
    let cached = coordinator
        .dispatch(get(), &DispatchOptions::new())
        .await
        .unwrap();

    assert_eq!(configs.call_count(), 1);
    assert!(cached.get("r").unwrap().from_cache);
    assert_eq!(fetched.record("r"), Some(&record));
    assert_eq!(cached.record("r"), Some(&record));
    assert!(cached.list("r").is_none());
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    fn push(&self, event: String) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    fn events(&self) -> Vec<String> {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        events.sort();
        events
    }
}

#[async_trait]
impl DispatchListener for RecordingListener {
    async fn on_request(&self, event: RequestEvent) -> TallyResult<()> {
        self.push(format!("request:{}", event.request_id));
        Ok(())
    }

    async fn on_response(&self, event: ResponseEvent) -> TallyResult<()> {
        let source = if event.from_cache { "cache" } else { "network" };
        self.push(format!("response:{}:{}", event.request_id, source));
        Ok(())
    }

    async fn on_error(&self, event: ErrorEvent) -> TallyResult<()> {
        self.push(format!("error:{}", event.request_id));
        Ok(())
    }
}

#[tokio::test]
async fn test_listeners_see_every_request() {
    let users = Arc::new(ScriptedResource::with_records("users", vec![json!({"id": 1})]));
    let broken = Arc::new(ScriptedResource::failing("broken", 500));
    let coordinator = fixtures::coordinator(vec![users, broken]).await;
    let listener = Arc::new(RecordingListener::default());
    coordinator.add_listener(listener.clone()).await;

    coordinator
        .dispatch(vec![list("users", "a")], &DispatchOptions::new())
        .await
        .unwrap();
    coordinator
        .dispatch(
            vec![list("users", "a"), list("broken", "b")],
            &DispatchOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        listener.events(),
        vec![
            "error:b",
            "request:a",
            "request:b",
            "response:a:cache",
            "response:a:network",
        ]
    );
}

#[tokio::test]
async fn test_dispatch_latest_discards_stale_run() {
    let gate = Gate::new();
    let slow = Arc::new(
        ScriptedResource::with_records("reports", vec![json!({"id": 1})]).with_gate(gate.clone()),
    );
    let coordinator = fixtures::coordinator(vec![slow.clone()]).await;

    let stale = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .dispatch_latest(
                    "widget-1",
                    vec![list("reports", "first")],
                    &DispatchOptions::new(),
                )
                .await
        })
    };
    while slow.call_count() == 0 {
        tokio::task::yield_now().await;
    }

    gate.open();
    let fresh = coordinator
        .dispatch_latest(
            "widget-1",
            vec![list("reports", "second")],
            &DispatchOptions::new(),
        )
        .await
        .unwrap();
    assert!(fresh.list("second").is_some());

    let stale = stale.await.unwrap();
    assert!(stale.unwrap_err().is_superseded());
    // The stale run's cache write stands.
    assert!(coordinator
        .cache()
        .read(&CacheKey::new("reports", Method::List, "first"))
        .is_some());
}
